//! Isolated state directory, bookmarks file and local remote

use anyhow::Result;
use git2::Repository;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SAMPLE_BOOKMARKS: &str = r#"{"version": 1, "roots": {"bookmark_bar": {"children": [{"name": "Rust", "url": "https://www.rust-lang.org/"}]}}}"#;

/// Everything one CLI scenario touches, removed on drop
pub struct TestEnv {
    _temp: TempDir,
    root: PathBuf,
}

impl TestEnv {
    /// Empty bare remote on `main` plus a Chrome-like bookmarks file
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();

        let remote = Repository::init_bare(root.join("remote.git"))?;
        remote.set_head("refs/heads/main")?;

        std::fs::create_dir_all(root.join("chrome"))?;
        std::fs::write(root.join("chrome").join("Bookmarks"), SAMPLE_BOOKMARKS)?;

        Ok(Self { _temp: temp, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Value for `BOOKMARKED_HOME`
    pub fn home(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn config_path(&self) -> PathBuf {
        self.home().join("config.toml")
    }

    pub fn remote_path(&self) -> PathBuf {
        self.root.join("remote.git")
    }

    pub fn bookmarks_path(&self) -> PathBuf {
        self.root.join("chrome").join("Bookmarks")
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.home().join("repo")
    }

    /// Write a config pointing at the local remote and bookmarks file
    pub fn write_config(&self, extra: &str) -> Result<()> {
        std::fs::create_dir_all(self.home())?;
        let config = format!(
            "remote = {:?}\nbookmarks_path = {:?}\n{}",
            self.remote_path().to_string_lossy(),
            self.bookmarks_path().to_string_lossy(),
            extra
        );
        std::fs::write(self.config_path(), config)?;
        Ok(())
    }

    /// Number of commits on the remote's `main`
    pub fn remote_commits(&self) -> Result<usize> {
        let remote = Repository::open_bare(self.remote_path())?;
        let head = match remote.refname_to_id("refs/heads/main") {
            Ok(oid) => oid,
            Err(_) => return Ok(0),
        };
        let mut walk = remote.revwalk()?;
        walk.push(head)?;
        Ok(walk.count())
    }

    /// Summary line of the remote's latest commit
    pub fn remote_head_summary(&self) -> Result<Option<String>> {
        let remote = Repository::open_bare(self.remote_path())?;
        let commit = match remote.refname_to_id("refs/heads/main") {
            Ok(oid) => remote.find_commit(oid)?,
            Err(_) => return Ok(None),
        };
        Ok(commit.summary().map(str::to_string))
    }
}
