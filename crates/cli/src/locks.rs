//! Daemon lock: one watch-mode process per working copy

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCK_FILE: &str = "daemon.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("bookmarked is already running (pid {pid})")]
    Held { pid: u32 },

    #[error("bookmarked is already starting (lock at {path} is held)")]
    Starting { path: PathBuf },

    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock {path}: {source}")]
    Flock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held exclusive lock; released (and the file removed) on drop
pub struct DaemonLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: String,
}

impl DaemonLock {
    /// Acquire the lock in `locks_dir`
    ///
    /// A lock file left behind by a dead process carries no `flock` and is
    /// simply taken over. While the `flock` is held the file is never removed,
    /// even if its recorded pid is gone or not yet written.
    pub fn acquire(locks_dir: &Path) -> Result<Self, LockError> {
        let path = locks_dir.join(LOCK_FILE);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(locks_dir).map_err(io_err)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        if !try_flock_exclusive(&file).map_err(|source| LockError::Flock {
            path: path.clone(),
            source,
        })? {
            // The holder may still be between flock and writing its pid
            return Err(match read_lock_content(&mut file) {
                Some(content) if is_process_alive(content.pid) => {
                    LockError::Held { pid: content.pid }
                }
                _ => LockError::Starting { path: path.clone() },
            });
        }

        // A previous owner may have unlinked the path after we opened it
        if !still_linked(&file, &path) {
            tracing::debug!("Lock file replaced while acquiring, retrying");
            drop(file);
            return Self::acquire(locks_dir);
        }

        write_lock_content(&mut file).map_err(io_err)?;
        tracing::debug!("Acquired daemon lock at {}", path.display());

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pid recorded in an existing lock file, if its owner is still alive
    pub fn holder(locks_dir: &Path) -> Option<u32> {
        let mut file = File::open(locks_dir.join(LOCK_FILE)).ok()?;
        let content = read_lock_content(&mut file)?;
        is_process_alive(content.pid).then_some(content.pid)
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> bool {
    true
}

fn write_lock_content(file: &mut File) -> std::io::Result<()> {
    let content = LockContent {
        pid: std::process::id(),
        started_at: chrono::Local::now().to_rfc3339(),
    };
    let serialized = serde_json::to_string(&content).map_err(std::io::Error::from)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()
}

fn read_lock_content(file: &mut File) -> Option<LockContent> {
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Try to take an exclusive `flock` without blocking
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(std::io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // Null signal: existence check only
    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
