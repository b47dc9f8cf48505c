//! The sync session: one working copy, reused for every cycle
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> Ready -> (Pulling -> Writing -> Committing -> Pushing -> Ready)*
//! ```
//!
//! Every operation returns the session to `Ready`, whether it succeeded or
//! not. A session is not meant to be driven from two threads at once; callers
//! serialize access.

use crate::error::{InitError, PullError, PushError, SyncError, WriteError};
use crate::git_ops::{self, Identity};
use crate::SyncResult;
use git2::build::RepoBuilder;
use git2::{FetchOptions, IndexAddOption, Oid, Repository, StatusOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where and how to reach the remote
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub token: Option<String>,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Pulling,
    Writing,
    Committing,
    Pushing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Nothing new on the remote (or the remote branch does not exist yet)
    UpToDate,
    FastForwarded { to: Oid },
    Merged { commit: Oid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    NoChange,
    Committed(Oid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    UpToDate,
}

/// Snapshot of the working copy for status reporting
#[derive(Debug, Clone)]
pub struct WorkingCopyStatus {
    pub branch: String,
    pub head: Option<Oid>,
    pub head_summary: Option<String>,
    pub head_time: Option<i64>,
    /// Local commits not yet on the remote-tracking ref
    pub ahead: usize,
    /// Remote-tracking commits not yet merged locally
    pub behind: usize,
    pub dirty: bool,
}

pub struct SyncSession {
    workdir: PathBuf,
    payload: String,
    remote: RemoteConfig,
    identity: Identity,
    repo: Option<Repository>,
    phase: Phase,
}

impl SyncSession {
    /// Create an uninitialized session for `workdir`, tracking `payload`
    pub fn new(workdir: impl Into<PathBuf>, payload: impl Into<String>, remote: RemoteConfig) -> Self {
        Self {
            workdir: workdir.into(),
            payload: payload.into(),
            remote,
            identity: Identity::default(),
            repo: None,
            phase: Phase::Uninitialized,
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Path of the tracked payload file in the working copy
    pub fn payload_path(&self) -> PathBuf {
        self.workdir.join(&self.payload)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }

    /// Open the working copy, cloning the remote first if it is absent
    pub fn initialize(&mut self) -> Result<(), InitError> {
        let repo = if self.workdir.exists() {
            let repo = Repository::open(&self.workdir).map_err(|source| InitError::Open {
                path: self.workdir.clone(),
                source,
            })?;
            info!("Opened existing repository at {}", self.workdir.display());
            repo
        } else {
            self.clone_remote()?
        };

        git_ops::checkout_branch(&repo, &self.remote.branch).map_err(|source| InitError::Branch {
            branch: self.remote.branch.clone(),
            source,
        })?;

        self.repo = Some(repo);
        self.phase = Phase::Ready;
        Ok(())
    }

    fn clone_remote(&self) -> Result<Repository, InitError> {
        if let Some(parent) = self.workdir.parent() {
            std::fs::create_dir_all(parent).map_err(|source| InitError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        info!("Cloning repository: {}", self.remote.url);

        let mut options = FetchOptions::new();
        options.remote_callbacks(git_ops::remote_callbacks(self.remote.token.clone()));

        match RepoBuilder::new()
            .fetch_options(options)
            .clone(&self.remote.url, &self.workdir)
        {
            Ok(repo) => {
                info!("Repository cloned successfully");
                Ok(repo)
            }
            Err(source) => {
                // Do not leave a half-cloned directory to be "opened" next time
                if self.workdir.exists() {
                    let _ = std::fs::remove_dir_all(&self.workdir);
                }
                Err(InitError::Clone {
                    url: self.remote.url.clone(),
                    hint: git_ops::classify(&source),
                    source,
                })
            }
        }
    }

    /// Fetch and integrate the remote branch
    pub fn pull(&mut self) -> Result<PullOutcome, PullError> {
        self.phase = Phase::Pulling;
        let result = self.pull_inner();
        self.phase = Phase::Ready;
        result
    }

    fn pull_inner(&self) -> Result<PullOutcome, PullError> {
        let repo = self.repo.as_ref().ok_or(PullError::NotInitialized)?;
        let branch = &self.remote.branch;

        git_ops::fetch_branch(repo, branch, self.remote.token.clone()).map_err(PullError::from_git)?;

        let theirs = match git_ops::remote_tracking(repo, branch).map_err(PullError::from_git)? {
            Some(theirs) => theirs,
            None => {
                debug!("Remote has no branch '{}' yet", branch);
                return Ok(PullOutcome::UpToDate);
            }
        };

        let (analysis, _) = repo.merge_analysis(&[&theirs]).map_err(PullError::from_git)?;

        if analysis.is_up_to_date() {
            Ok(PullOutcome::UpToDate)
        } else if analysis.is_unborn() || analysis.is_fast_forward() {
            git_ops::fast_forward(repo, branch, theirs.id()).map_err(PullError::from_git)?;
            Ok(PullOutcome::FastForwarded { to: theirs.id() })
        } else {
            match git_ops::merge_commit(repo, branch, &theirs, &self.identity)
                .map_err(PullError::from_git)?
            {
                Some(commit) => Ok(PullOutcome::Merged { commit }),
                None => Err(PullError::Diverged {
                    branch: branch.clone(),
                }),
            }
        }
    }

    /// Write `content` to the payload file and commit if anything changed
    pub fn write_and_commit(&mut self, content: &[u8], template: &str) -> Result<CommitOutcome, WriteError> {
        self.phase = Phase::Writing;
        let result = self.write_and_commit_inner(content, template);
        self.phase = Phase::Ready;
        result
    }

    fn write_and_commit_inner(&mut self, content: &[u8], template: &str) -> Result<CommitOutcome, WriteError> {
        let path = self.payload_path();
        let repo = self.repo.as_ref().ok_or(WriteError::NotInitialized)?;

        std::fs::write(&path, content).map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;

        let mut options = StatusOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        if repo.statuses(Some(&mut options))?.is_empty() {
            return Ok(CommitOutcome::NoChange);
        }

        self.phase = Phase::Committing;

        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;

        let parent = match git_ops::head_oid(repo)? {
            Some(oid) => Some(repo.find_commit(oid)?),
            None => None,
        };

        // Status can report changes the tree does not record (e.g. mode-only noise)
        if let Some(parent) = &parent {
            if parent.tree_id() == tree.id() {
                return Ok(CommitOutcome::NoChange);
            }
        }

        let signature = self.identity.signature()?;
        let message = git_ops::commit_message(template, chrono::Local::now());
        let parents: Vec<_> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)?;
        info!("Created commit: {}", oid);
        Ok(CommitOutcome::Committed(oid))
    }

    /// Send the branch to the remote
    pub fn push(&mut self) -> Result<PushOutcome, PushError> {
        self.phase = Phase::Pushing;
        let result = self.push_inner();
        self.phase = Phase::Ready;
        result
    }

    fn push_inner(&self) -> Result<PushOutcome, PushError> {
        let repo = self.repo.as_ref().ok_or(PushError::NotInitialized)?;
        let branch = &self.remote.branch;

        let local = git_ops::head_oid(repo).map_err(PushError::from_git)?;
        let upstream = git_ops::remote_tracking(repo, branch)
            .map_err(PushError::from_git)?
            .map(|c| c.id());
        if local.is_none() || local == upstream {
            info!("Already up to date");
            return Ok(PushOutcome::UpToDate);
        }

        info!("Pushing to remote...");
        match git_ops::push_branch(repo, branch, self.remote.token.clone()).map_err(PushError::from_git)? {
            Ok(()) => {
                info!("Pushed successfully");
                Ok(PushOutcome::Pushed)
            }
            Err((refname, reason)) => Err(PushError::Rejected { refname, reason }),
        }
    }

    /// One full cycle: best-effort pull, write + commit, push if committed
    pub fn run_cycle(&mut self, content: &[u8], template: &str) -> Result<SyncResult, SyncError> {
        match self.pull() {
            Ok(PullOutcome::UpToDate) => debug!("Already up to date"),
            Ok(PullOutcome::FastForwarded { to }) => info!("Pulled successfully (now at {})", to),
            Ok(PullOutcome::Merged { commit }) => info!("Merged remote changes ({})", commit),
            // Stale base history beats dropping a local change
            Err(e) => warn!("Pull failed, continuing with local state: {}", e),
        }

        match self.write_and_commit(content, template)? {
            CommitOutcome::NoChange => {
                info!("No changes to commit");
                Ok(SyncResult::NoChange)
            }
            CommitOutcome::Committed(revision) => {
                self.push()?;
                Ok(SyncResult::Synced { revision })
            }
        }
    }

    /// Working copy summary: head, divergence from origin, uncommitted edits
    pub fn status(&self) -> Result<WorkingCopyStatus, git2::Error> {
        let repo = self
            .repo
            .as_ref()
            .ok_or_else(|| git2::Error::from_str("repository not initialized"))?;
        let branch = &self.remote.branch;

        let head = git_ops::head_oid(repo)?;
        let upstream = git_ops::remote_tracking(repo, branch)?.map(|c| c.id());

        let (ahead, behind) = match (head, upstream) {
            (Some(local), Some(remote)) => repo.graph_ahead_behind(local, remote)?,
            (Some(local), None) => {
                let mut walk = repo.revwalk()?;
                walk.push(local)?;
                (walk.count(), 0)
            }
            _ => (0, 0),
        };

        let (head_summary, head_time) = match head {
            Some(oid) => {
                let commit = repo.find_commit(oid)?;
                (commit.summary().map(str::to_string), Some(commit.time().seconds()))
            }
            None => (None, None),
        };

        let mut options = StatusOptions::new();
        options.include_untracked(true);
        let dirty = !repo.statuses(Some(&mut options))?.is_empty();

        Ok(WorkingCopyStatus {
            branch: branch.clone(),
            head,
            head_summary,
            head_time,
            ahead,
            behind,
            dirty,
        })
    }
}
