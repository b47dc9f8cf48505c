//! Single-slot debouncing
//!
//! Collapses a burst of activity into one settle signal fired `window` after
//! the last poke. Each poke cancels the armed timer and arms a fresh one.
//! The timer state is shared between the event listener and the timer task,
//! so every transition happens under one mutex and carries a generation
//! number: a timer that already woke up when it was superseded sees a stale
//! generation and stays silent.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Callback invoked once per settled burst
pub type SettleCallback = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct TimerState {
    generation: u64,
    armed: Option<JoinHandle<()>>,
    closed: bool,
}

struct Inner {
    window: Duration,
    state: Mutex<TimerState>,
    on_settled: SettleCallback,
    runtime: Handle,
}

/// Resettable one-shot timer
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    /// Create a debouncer whose timers run on `runtime`
    pub fn new(window: Duration, on_settled: SettleCallback, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                state: Mutex::new(TimerState::default()),
                on_settled,
                runtime,
            }),
        }
    }

    /// Record activity, (re)arming the timer
    pub fn poke(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }

        if let Some(previous) = state.armed.take() {
            previous.abort();
        }

        state.generation += 1;
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);

        state.armed = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.fire(generation);
        }));
    }

    /// Whether a settle signal is pending
    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().armed.is_some()
    }

    /// Cancel any pending signal and ignore future pokes
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        if let Some(armed) = state.armed.take() {
            armed.abort();
        }
    }

    /// Configured quiet period
    pub fn window(&self) -> Duration {
        self.inner.window
    }
}

impl Inner {
    fn fire(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.closed || state.generation != generation {
                return;
            }
            state.armed = None;
        }

        tracing::debug!("Debounce period elapsed, signalling settle");
        (self.on_settled)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_millis(500);

    fn counting_debouncer() -> (Debouncer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let debouncer = Debouncer::new(
            WINDOW,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Handle::current(),
        );
        (debouncer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_poke_fires_once_after_window() {
        let (debouncer, count) = counting_debouncer();

        debouncer.poke();
        assert!(debouncer.is_armed());

        sleep(WINDOW - Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_armed());

        sleep(WINDOW * 4).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_signal_after_last_poke() {
        let (debouncer, count) = counting_debouncer();

        for _ in 0..5 {
            debouncer.poke();
            sleep(Duration::from_millis(100)).await;
        }
        // Last poke at t=400ms, so the signal is due at t=900ms
        sleep(Duration::from_millis(399)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(WINDOW * 4).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_writes_100ms_apart() {
        let (debouncer, count) = counting_debouncer();

        debouncer.poke();
        sleep(Duration::from_millis(100)).await;
        debouncer.poke();

        sleep(WINDOW - Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_pokes_fire_separately() {
        let (debouncer, count) = counting_debouncer();

        for expected in 1..=3 {
            debouncer.poke();
            sleep(WINDOW + Duration::from_millis(1)).await;
            assert_eq!(count.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_signal() {
        let (debouncer, count) = counting_debouncer();

        debouncer.poke();
        sleep(Duration::from_millis(100)).await;
        debouncer.close();
        assert!(!debouncer.is_armed());

        sleep(WINDOW * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Pokes after close are ignored
        debouncer.poke();
        sleep(WINDOW * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_pokes_yield_one_signal() {
        let (debouncer, count) = counting_debouncer();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let d = debouncer.clone();
                tokio::spawn(async move { d.poke() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        sleep(WINDOW * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
