//! Git plumbing used by the sync session
//!
//! Thin wrappers over `git2` for the handful of operations a single-branch
//! mirror needs: authenticated fetch/push, fast-forward and three-way merge,
//! and branch checkout after clone.

use git2::build::CheckoutBuilder;
use git2::{
    AnnotatedCommit, Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, Oid, PushOptions,
    RemoteCallbacks, Repository, Signature,
};
use tracing::debug;

/// Credential callback invocations allowed before giving up
///
/// libgit2 keeps asking while the remote rejects credentials.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

pub const REMOTE_NAME: &str = "origin";

/// Author and committer identity for sync commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "Bookmarked".to_string(),
            email: "bookmarked@local".to_string(),
        }
    }
}

impl Identity {
    pub fn signature(&self) -> Result<Signature<'static>, git2::Error> {
        Signature::now(&self.name, &self.email)
    }
}

/// Callbacks that authenticate HTTPS with the token as the password
pub fn remote_callbacks<'a>(token: Option<String>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Http,
                "credentials rejected by remote",
            ));
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = &token {
                // Username is ignored by GitHub when the password is a token
                return Cred::userpass_plaintext("git", token);
            }
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        Err(git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Http,
            format!("no usable credentials for {}", url),
        ))
    });

    callbacks
}

/// Short human hint for a git failure
pub fn classify(e: &git2::Error) -> &'static str {
    match e.code() {
        ErrorCode::Auth => return "authentication failed, check the token",
        ErrorCode::NotFastForward => return "remote has changes not present locally",
        ErrorCode::Certificate => return "certificate verification failed",
        _ => {}
    }

    let message = e.message().to_ascii_lowercase();
    if message.contains("authentication") || message.contains("401") || message.contains("403") {
        "authentication failed, check the token"
    } else if message.contains("non-fast-forward") || message.contains("non-fastforwardable") {
        "remote has changes not present locally"
    } else if matches!(e.class(), ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh)
        || message.contains("timed out")
        || message.contains("could not resolve")
    {
        "network error, check the connection"
    } else if message.contains("not found") || message.contains("does not appear to be a git repository") {
        "remote repository not found"
    } else {
        "git error"
    }
}

/// Fetch `branch` from origin into its remote-tracking ref
pub fn fetch_branch(repo: &Repository, branch: &str, token: Option<String>) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote(REMOTE_NAME)?;
    let refspec = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", branch, REMOTE_NAME);

    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(token));

    remote.fetch(&[refspec.as_str()], Some(&mut options), None)?;
    debug!("Fetched {} from {}", branch, REMOTE_NAME);
    Ok(())
}

/// Remote-tracking commit for `branch`, if the remote has it
pub fn remote_tracking<'r>(
    repo: &'r Repository,
    branch: &str,
) -> Result<Option<AnnotatedCommit<'r>>, git2::Error> {
    let refname = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
    match repo.find_reference(&refname) {
        Ok(reference) => Ok(Some(repo.reference_to_annotated_commit(&reference)?)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Point `branch` at `target` and force the working tree to match
pub fn fast_forward(repo: &Repository, branch: &str, target: Oid) -> Result<(), git2::Error> {
    let refname = format!("refs/heads/{}", branch);
    match repo.find_reference(&refname) {
        Ok(mut reference) => {
            reference.set_target(target, "bookmarked: fast-forward")?;
        }
        Err(e) if e.code() == ErrorCode::NotFound => {
            repo.reference(&refname, target, true, "bookmarked: initial pull")?;
        }
        Err(e) => return Err(e),
    }

    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(())
}

/// Three-way merge of `theirs` into HEAD
///
/// Returns `Ok(None)` when the merge has conflicts; nothing is changed then.
pub fn merge_commit(
    repo: &Repository,
    branch: &str,
    theirs: &AnnotatedCommit<'_>,
    identity: &Identity,
) -> Result<Option<Oid>, git2::Error> {
    let ours = repo.head()?.peel_to_commit()?;
    let theirs = repo.find_commit(theirs.id())?;

    let mut index = repo.merge_commits(&ours, &theirs, None)?;
    if index.has_conflicts() {
        return Ok(None);
    }

    let tree = repo.find_tree(index.write_tree_to(repo)?)?;
    let signature = identity.signature()?;
    let message = format!("Merge remote-tracking branch '{}/{}'", REMOTE_NAME, branch);

    let oid = repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&ours, &theirs])?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(Some(oid))
}

/// Push `branch` to origin
///
/// Per-ref rejections are reported through the callback rather than as an
/// error, so they come back as `Err((refname, reason))` in the inner result.
pub fn push_branch(
    repo: &Repository,
    branch: &str,
    token: Option<String>,
) -> Result<Result<(), (String, String)>, git2::Error> {
    let push_url = {
        let origin = repo.find_remote(REMOTE_NAME)?;
        origin
            .pushurl()
            .or_else(|| origin.url())
            .map(str::to_string)
            .ok_or_else(|| git2::Error::from_str("origin has no url"))?
    };
    // Local-path transports don't consult `pushurl` on a named remote
    let mut remote = repo.remote_anonymous(&push_url)?;
    let local_ref = format!("refs/heads/{}", branch);
    let pushed = repo.refname_to_id(&local_ref)?;
    let refspec = format!("{0}:{0}", local_ref);
    let mut rejected: Option<(String, String)> = None;

    {
        let mut callbacks = remote_callbacks(token);
        callbacks.push_update_reference(|refname, status| {
            if let Some(reason) = status {
                rejected = Some((refname.to_string(), reason.to_string()));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut options))?;
    }

    if let Some(rejection) = rejected {
        return Ok(Err(rejection));
    }

    // Anonymous remotes leave remote-tracking refs alone
    let tracking = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
    repo.reference(&tracking, pushed, true, "bookmarked: push")?;
    debug!("Pushed {} to {}", branch, REMOTE_NAME);
    Ok(Ok(()))
}

/// Make HEAD track `branch`, creating it from origin when only the remote has it
///
/// With an empty remote HEAD is left unborn on `branch`; the first commit
/// creates it.
pub fn checkout_branch(repo: &Repository, branch: &str) -> Result<(), git2::Error> {
    let refname = format!("refs/heads/{}", branch);

    if let Ok(head) = repo.head() {
        if head.name() == Some(refname.as_str()) {
            return Ok(());
        }
    }

    if repo.find_reference(&refname).is_err() {
        if let Some(upstream) = remote_tracking(repo, branch)? {
            let commit = repo.find_commit(upstream.id())?;
            let mut local = repo.branch(branch, &commit, false)?;
            local.set_upstream(Some(&format!("{}/{}", REMOTE_NAME, branch)))?;
        }
    }

    repo.set_head(&refname)?;
    if repo.head().is_ok() {
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    }
    Ok(())
}

/// Oid HEAD points at, `None` while the branch is unborn
pub fn head_oid(repo: &Repository) -> Result<Option<Oid>, git2::Error> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Commit message: `"<template> - <RFC3339 timestamp>"`
pub fn commit_message<Tz>(template: &str, at: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{} - {}", template, at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}
