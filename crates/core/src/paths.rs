//! State directory layout
//!
//! ```text
//! ~/.bookmarked/          ($BOOKMARKED_HOME overrides)
//!   config.toml
//!   bookmarked.log        (default log file for installed services)
//!   locks/
//!     daemon.lock
//!   repo/                 (working copy of the remote)
//!     Bookmarks.json
//! ```

use crate::settings::SettingsError;
use std::path::PathBuf;

/// Environment variable that relocates the whole state directory
pub const HOME_ENV: &str = "BOOKMARKED_HOME";

/// Root of all persisted state
pub fn state_dir() -> Result<PathBuf, SettingsError> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    dirs::home_dir()
        .map(|home| home.join(".bookmarked"))
        .ok_or(SettingsError::NoHomeDir)
}

/// Path of the TOML settings file
pub fn config_file() -> Result<PathBuf, SettingsError> {
    Ok(state_dir()?.join("config.toml"))
}

/// Root of the local working copy
pub fn repo_dir() -> Result<PathBuf, SettingsError> {
    Ok(state_dir()?.join("repo"))
}

/// Directory holding the daemon lock
pub fn locks_dir() -> Result<PathBuf, SettingsError> {
    Ok(state_dir()?.join("locks"))
}

/// Log file used by the OS service definitions
pub fn default_log_file() -> Result<PathBuf, SettingsError> {
    Ok(state_dir()?.join("bookmarked.log"))
}
