//! Sync orchestrator
//!
//! Wires the change monitor to the sync engine. The engine sits behind a
//! single async mutex; every cycle takes the owned guard into a blocking task
//! so git and disk work never runs on the event listener and always finishes,
//! even when nobody is waiting for it any more.

use bookmarked_core::{paths, read_normalized, resolve_watch_target, LocateError, ReadError, Settings, SettingsError, PAYLOAD_FILE};
use gitsync::{git2, InitError, RemoteConfig, SyncError, SyncResult, SyncSession, WorkingCopyStatus};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use watcher::{MonitorError, WatchTarget};

use crate::locks::LockError;

/// Failure before watch mode (or a one-shot sync) could start
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("failed to initialize working copy: {0}")]
    Init(#[from] InitError),

    #[error("failed to start watching: {0}")]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("setup task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SetupError {
    /// The watched file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SetupError::Locate(LocateError::NotFound(_)))
    }
}

/// Working copy could not be inspected
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("failed to read working copy: {0}")]
    Git(#[from] git2::Error),

    #[error("status task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure of one synchronization cycle
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("sync task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct Service {
    settings: Settings,
    target: PathBuf,
    engine: Arc<Mutex<SyncSession>>,
    /// A settle-triggered sync is waiting for the engine
    queued: AtomicBool,
    accepting: AtomicBool,
    watching: AtomicBool,
}

impl Service {
    /// Resolve the watch target and prepare the session at `workdir`
    ///
    /// Nothing is created on disk; a missing watch target fails here.
    pub fn new(settings: Settings, workdir: impl Into<PathBuf>) -> Result<Self, SetupError> {
        let target = resolve_watch_target(&settings)?;
        info!("Watching bookmarks file: {}", target.display());

        let remote = RemoteConfig {
            url: settings.remote_url(),
            token: settings.token.clone(),
            branch: settings.branch.clone(),
        };
        let session = SyncSession::new(workdir, PAYLOAD_FILE, remote);

        Ok(Self {
            settings,
            target,
            engine: Arc::new(Mutex::new(session)),
            queued: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            watching: AtomicBool::new(false),
        })
    }

    /// Service over the default working copy under the state directory
    pub fn from_settings(settings: Settings) -> Result<Self, SetupError> {
        let workdir = paths::repo_dir()?;
        Self::new(settings, workdir)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether the change monitor is installed
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Clone or open the working copy
    pub async fn initialize(&self) -> Result<(), SetupError> {
        let mut engine = Arc::clone(&self.engine).lock_owned().await;
        tokio::task::spawn_blocking(move || engine.initialize()).await??;
        Ok(())
    }

    /// Run one synchronization, waiting behind any cycle in flight
    pub async fn perform_one_sync(&self) -> Result<SyncResult, CycleError> {
        let engine = Arc::clone(&self.engine).lock_owned().await;
        self.sync_locked(engine).await
    }

    async fn sync_locked(&self, mut engine: OwnedMutexGuard<SyncSession>) -> Result<SyncResult, CycleError> {
        let target = self.target.clone();
        let template = self.settings.commit_message.clone();
        let started = Instant::now();

        info!("Syncing bookmarks...");
        let result = tokio::task::spawn_blocking(move || -> Result<SyncResult, CycleError> {
            let content = read_normalized(&target)?;
            Ok(engine.run_cycle(&content, &template)?)
        })
        .await?;

        let elapsed = started.elapsed();
        match &result {
            Ok(SyncResult::NoChange) => info!("Sync completed in {:?}: no changes", elapsed),
            Ok(SyncResult::Synced { revision }) => {
                info!("Sync completed in {:?}: pushed {}", elapsed, revision)
            }
            Err(e) => error!("Sync failed after {:?}: {}", elapsed, e),
        }
        result
    }

    /// Working copy summary, if it has been initialized
    pub async fn working_copy_status(&self) -> Result<WorkingCopyStatus, StatusError> {
        let engine = Arc::clone(&self.engine).lock_owned().await;
        Ok(tokio::task::spawn_blocking(move || engine.status()).await??)
    }

    /// Initial sync, then watch until `shutdown` resolves
    ///
    /// Cycle failures are logged and never end watch mode. On shutdown the
    /// monitor is closed and the call returns once any in-flight sync is done.
    pub async fn start_watching<S>(self: Arc<Self>, shutdown: S) -> Result<(), SetupError>
    where
        S: Future<Output = ()>,
    {
        self.initialize().await?;

        info!("Performing initial sync...");
        if self.perform_one_sync().await.is_err() {
            warn!("Initial sync failed, continuing to watch");
        }

        let watch_target = WatchTarget::new(self.target.clone())?;
        let service = Arc::clone(&self);
        let monitor = watcher::watch(watch_target, self.settings.debounce_window(), move || {
            service.on_settled()
        })?;
        self.watching.store(true, Ordering::SeqCst);

        info!("Bookmarked is running. Press Ctrl+C to stop.");
        shutdown.await;

        info!("Shutting down...");
        self.accepting.store(false, Ordering::SeqCst);
        monitor.close();
        self.watching.store(false, Ordering::SeqCst);

        let _idle = self.engine.lock().await;
        info!("Stopped");
        Ok(())
    }

    /// Settle callback: queue one sync unless one is already waiting
    fn on_settled(self: &Arc<Self>) {
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }
        if self.queued.swap(true, Ordering::SeqCst) {
            debug!("Sync already queued, coalescing change");
            return;
        }

        info!("Bookmarks file changed, syncing...");
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let engine = Arc::clone(&service.engine).lock_owned().await;
            // Changes from here on need a fresh cycle
            service.queued.store(false, Ordering::SeqCst);
            if !service.accepting.load(Ordering::SeqCst) {
                return;
            }
            // Outcome already logged by the cycle
            let _ = service.sync_locked(engine).await;
        });
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received interrupt"),
        _ = terminate => info!("Received terminate signal"),
    }
}
