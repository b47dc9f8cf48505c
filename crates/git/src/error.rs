//! Error taxonomy for the sync engine
//!
//! `InitError` is fatal at setup. `PullError` is a warning: the cycle carries
//! on with local state. `WriteError` and `PushError` abandon the current cycle
//! only.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open repository at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("failed to clone {url} ({hint}): {source}")]
    Clone {
        url: String,
        hint: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("failed to check out branch '{branch}': {source}")]
    Branch {
        branch: String,
        #[source]
        source: git2::Error,
    },
}

#[derive(Debug, Error)]
pub enum PullError {
    #[error("repository not initialized")]
    NotInitialized,

    #[error("pull failed ({hint}): {source}")]
    Failed {
        hint: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("local branch '{branch}' has diverged from origin and the merge has conflicts")]
    Diverged { branch: String },
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("repository not initialized")]
    NotInitialized,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to commit: {0}")]
    Git(#[from] git2::Error),
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("repository not initialized")]
    NotInitialized,

    #[error("push of {refname} rejected by remote: {reason}")]
    Rejected { refname: String, reason: String },

    #[error("push failed ({hint}): {source}")]
    Failed {
        hint: &'static str,
        #[source]
        source: git2::Error,
    },
}

/// Failure of one synchronization cycle
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Push(#[from] PushError),
}

impl PullError {
    pub(crate) fn from_git(source: git2::Error) -> Self {
        PullError::Failed {
            hint: crate::git_ops::classify(&source),
            source,
        }
    }
}

impl PushError {
    pub(crate) fn from_git(source: git2::Error) -> Self {
        PushError::Failed {
            hint: crate::git_ops::classify(&source),
            source,
        }
    }
}
