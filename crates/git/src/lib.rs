//! Git mirroring for Bookmarked
//!
//! This crate provides:
//! - `SyncSession`: the local working copy (clone-if-absent, open-if-present)
//! - Pull (best-effort), write + commit (idempotent), push
//! - The tagged `SyncResult` / error taxonomy consumed by the orchestrator

pub mod error;
pub mod git_ops;
pub mod session;

// Re-exports
pub use git2;
pub use error::{InitError, PullError, PushError, SyncError, WriteError};
pub use git_ops::{commit_message, Identity};
pub use session::{
    CommitOutcome, Phase, PullOutcome, PushOutcome, RemoteConfig, SyncSession, WorkingCopyStatus,
};

/// Outcome of one successful synchronization cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    /// Content matched the last revision; nothing committed or pushed
    NoChange,
    /// A new revision was created and pushed
    Synced { revision: git2::Oid },
}
