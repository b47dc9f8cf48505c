//! File change monitoring for Bookmarked
//!
//! This crate turns the noisy stream of OS file notifications for one file
//! into a clean "content settled" signal:
//! - Watches the containing directory (catches replace-on-write saves)
//! - Filters events to the target's base name
//! - Single-slot debouncing (one signal per quiet period)

pub mod debounce;
pub mod filter;

use debounce::{Debouncer, SettleCallback};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors that prevent monitoring from starting
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("change monitor must be started inside a tokio runtime")]
    NoRuntime,

    #[error("watch target {0} must be an absolute path to a file")]
    InvalidTarget(PathBuf),

    #[error("failed to create file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("failed to watch directory {path}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Absolute path of the monitored file, split for directory watching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    dir: PathBuf,
    file_name: OsString,
}

impl WatchTarget {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(MonitorError::InvalidTarget(path));
        }

        let (dir, file_name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
            _ => return Err(MonitorError::InvalidTarget(path)),
        };

        Ok(Self { path, dir, file_name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Start monitoring `target`, calling `on_settled` once per settled burst
///
/// Must be called from within a tokio runtime. The callback runs on a timer
/// task, not on the event listener, and should hand long work off rather than
/// block.
pub fn watch<F>(target: WatchTarget, window: Duration, on_settled: F) -> Result<MonitorHandle, MonitorError>
where
    F: Fn() + Send + Sync + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        // Receiver gone means the monitor is closing
        let _ = event_tx.send(res);
    })
    .map_err(MonitorError::Init)?;

    watcher
        .watch(target.dir(), RecursiveMode::NonRecursive)
        .map_err(|source| MonitorError::Register {
            path: target.dir().to_path_buf(),
            source,
        })?;

    let callback: SettleCallback = Arc::new(on_settled);
    let debouncer = Debouncer::new(window, callback, runtime.clone());
    let listener = runtime.spawn(listen(event_rx, target.file_name.clone(), debouncer.clone()));

    info!("Watching for changes to: {}", target.path().display());

    Ok(MonitorHandle {
        target,
        watcher: Some(watcher),
        debouncer,
        listener: Some(listener),
    })
}

/// Event delivery loop; runs until the notify watcher is dropped
async fn listen(
    mut events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    file_name: OsString,
    debouncer: Debouncer,
) {
    while let Some(res) = events.recv().await {
        match res {
            Ok(event) => {
                if filter::is_activity(&event, &file_name) {
                    debug!("Detected change: {:?}", event.kind);
                    debouncer.poke();
                }
            }
            Err(e) => warn!("Watcher error: {}", e),
        }
    }
    debug!("Watcher event stream closed");
}

/// Running monitor; dropping it has the same effect as [`MonitorHandle::close`]
pub struct MonitorHandle {
    target: WatchTarget,
    watcher: Option<RecommendedWatcher>,
    debouncer: Debouncer,
    listener: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Whether a settle signal is pending
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Cancel any pending signal and release the OS subscription
    pub fn close(mut self) {
        self.shutdown();
        info!("Stopped watching {}", self.target.path().display());
    }

    fn shutdown(&mut self) {
        self.debouncer.close();
        // Dropping the watcher ends the subscription and closes the channel
        drop(self.watcher.take());
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_millis(300);
    const SETTLE: Duration = Duration::from_millis(1500);

    fn setup() -> (TempDir, WatchTarget) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().canonicalize().unwrap().join("Bookmarks");
        std::fs::write(&path, b"{}").unwrap();
        let target = WatchTarget::new(path).unwrap();
        (dir, target)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_target_must_be_absolute() {
        assert!(matches!(
            WatchTarget::new("Bookmarks"),
            Err(MonitorError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_watch_requires_runtime() {
        let (_dir, target) = setup();
        let result = watch(target, WINDOW, || {});
        assert!(matches!(result, Err(MonitorError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_missing_directory_fails_registration() {
        let dir = TempDir::new().unwrap();
        let target = WatchTarget::new(dir.path().join("gone/Bookmarks")).unwrap();
        let result = watch(target, WINDOW, || {});
        assert!(matches!(result, Err(MonitorError::Register { .. })));
    }

    #[tokio::test]
    async fn test_two_writes_produce_one_signal() {
        let (_dir, target) = setup();
        let path = target.path().to_path_buf();
        let (count, on_settled) = counter();

        let handle = watch(target, WINDOW, on_settled).unwrap();

        std::fs::write(&path, b"{\"a\": 1}").unwrap();
        sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, b"{\"a\": 2}").unwrap();

        sleep(SETTLE).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.close();
    }

    #[tokio::test]
    async fn test_atomic_replace_is_detected() {
        let (_dir, target) = setup();
        let path = target.path().to_path_buf();
        let tmp = target.dir().join("Bookmarks.tmp");
        let (count, on_settled) = counter();

        let handle = watch(target, WINDOW, on_settled).unwrap();

        std::fs::write(&tmp, b"{\"replaced\": true}").unwrap();
        std::fs::rename(&tmp, &path).unwrap();

        sleep(SETTLE).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.close();
    }

    #[tokio::test]
    async fn test_unrelated_files_are_ignored() {
        let (_dir, target) = setup();
        let other = target.dir().join("History");
        let (count, on_settled) = counter();

        let handle = watch(target, WINDOW, on_settled).unwrap();

        std::fs::write(&other, b"noise").unwrap();
        sleep(SETTLE).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        handle.close();
    }

    #[tokio::test]
    async fn test_close_suppresses_pending_signal() {
        let (_dir, target) = setup();
        let path = target.path().to_path_buf();
        let (count, on_settled) = counter();

        let handle = watch(target, WINDOW, on_settled).unwrap();

        std::fs::write(&path, b"{\"a\": 1}").unwrap();
        sleep(Duration::from_millis(100)).await;
        handle.close();

        std::fs::write(&path, b"{\"a\": 2}").unwrap();
        sleep(SETTLE).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
