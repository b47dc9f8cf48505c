//! User settings
//!
//! Settings live in `<state dir>/config.toml` and can be overridden per key
//! with `BOOKMARKED_<KEY>` environment variables.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update bookmarks";
pub const DEFAULT_PROFILE: &str = "Default";

const MAX_DEBOUNCE_MS: u64 = 600_000;

/// Errors raised while locating, loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("config file not found at {0} (run 'bookmarked init' to create one)")]
    Missing(PathBuf),

    #[error("config file already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("'{0}' is required in the config file")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Effective settings after defaults and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remote repository: `owner/name` on GitHub, a git URL, or a local path
    pub remote: String,

    /// Access token for HTTPS remotes
    #[serde(default)]
    pub token: Option<String>,

    /// Branch to pull from and push to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Quiet period before a burst of file events triggers a sync (0 = default)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Commit message prefix; a timestamp is appended
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Log file (stdout when unset)
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Explicit bookmarks file, bypassing the Chrome profile lookup
    #[serde(default)]
    pub bookmarks_path: Option<PathBuf>,

    /// Chrome profile directory name
    #[serde(default = "default_profile")]
    pub profile: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Settings {
    /// Create settings for a remote with every other key at its default
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            token: None,
            branch: default_branch(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            commit_message: default_commit_message(),
            log_path: None,
            bookmarks_path: None,
            profile: default_profile(),
        }
    }

    /// Load settings from the default location
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&crate::paths::config_file()?)
    }

    /// Load settings from an explicit file, applying env overrides
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::Missing(path.to_path_buf()));
        }

        let raw = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(config::Environment::with_prefix("BOOKMARKED").try_parsing(true))
            .build()?;

        let mut settings: Settings = raw.try_deserialize()?;
        settings.apply_defaults();
        settings.validate()?;

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Replace blank values with their defaults
    ///
    /// The generated template ships every key, so empty strings and a zero
    /// debounce mean "unset".
    pub fn apply_defaults(&mut self) {
        self.remote = self.remote.trim().to_string();
        self.token = self.token.take().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self.log_path = self.log_path.take().filter(|p| !p.as_os_str().is_empty());
        self.bookmarks_path = self.bookmarks_path.take().filter(|p| !p.as_os_str().is_empty());

        if self.branch.trim().is_empty() {
            self.branch = default_branch();
        }
        if self.debounce_ms == 0 {
            self.debounce_ms = DEFAULT_DEBOUNCE_MS;
        }
        if self.commit_message.trim().is_empty() {
            self.commit_message = default_commit_message();
        }
        if self.profile.trim().is_empty() {
            self.profile = default_profile();
        }
    }

    /// Check required keys and value ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.remote.is_empty() {
            return Err(SettingsError::MissingField("remote"));
        }

        if self.requires_token() && self.token.is_none() {
            return Err(SettingsError::MissingField("token"));
        }

        if self.branch.chars().any(char::is_whitespace) {
            return Err(SettingsError::Invalid {
                field: "branch",
                reason: format!("'{}' contains whitespace", self.branch),
            });
        }

        if !(1..=MAX_DEBOUNCE_MS).contains(&self.debounce_ms) {
            return Err(SettingsError::Invalid {
                field: "debounce_ms",
                reason: format!("{} is outside 1-{}", self.debounce_ms, MAX_DEBOUNCE_MS),
            });
        }

        Ok(())
    }

    /// Resolved remote location handed to git
    ///
    /// `owner/name` expands to a GitHub HTTPS URL unless it names an existing
    /// local directory.
    pub fn remote_url(&self) -> String {
        let remote = self.remote.as_str();

        let is_url = remote.contains("://") || remote.starts_with("git@");
        let is_path = remote.starts_with('/')
            || remote.starts_with('.')
            || remote.starts_with('~')
            || Path::new(remote).exists();

        if is_url || is_path || !is_github_shorthand(remote) {
            return remote.to_string();
        }

        let name = remote.strip_suffix(".git").unwrap_or(remote);
        format!("https://github.com/{}.git", name)
    }

    /// Whether the remote authenticates with the token
    pub fn requires_token(&self) -> bool {
        let url = self.remote_url();
        url.starts_with("https://") || url.starts_with("http://")
    }

    /// Debounce window as a `Duration`
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Token with everything but the last four characters hidden
    pub fn masked_token(&self) -> String {
        match &self.token {
            None => "(not set)".to_string(),
            Some(token) => match token.char_indices().rev().nth(3) {
                Some((start, _)) if start > 0 => format!("****{}", &token[start..]),
                _ => "****".to_string(),
            },
        }
    }
}

fn is_github_shorthand(remote: &str) -> bool {
    let mut parts = remote.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => {
            let valid = |s: &str| {
                !s.is_empty()
                    && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            };
            valid(owner) && valid(name)
        }
        _ => false,
    }
}

/// Commented settings template written by `bookmarked init`
pub fn template() -> &'static str {
    r#"# Bookmarked configuration

# Repository to sync bookmarks to.
# GitHub shorthand ("username/bookmarks"), any git URL, or a local path.
remote = ""

# Personal access token with write access (required for HTTPS remotes).
# Create one at: https://github.com/settings/tokens
token = ""

# Branch to push to (default: main)
branch = "main"

# Quiet period in milliseconds before a change is synced (default: 500)
debounce_ms = 500

# Commit message prefix; a timestamp is appended (default: "Update bookmarks")
commit_message = "Update bookmarks"

# Log file (logs to stdout if empty)
log_path = ""

# Explicit bookmarks file (empty = Chrome's file for `profile`)
bookmarks_path = ""

# Chrome profile directory (default: Default)
profile = "Default"
"#
}

/// Write the settings template, refusing to overwrite an existing file
pub fn init_template(path: &Path) -> Result<(), SettingsError> {
    if path.exists() {
        return Err(SettingsError::AlreadyExists(path.to_path_buf()));
    }

    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(template().as_bytes()).map_err(io_err)?;
    Ok(())
}
