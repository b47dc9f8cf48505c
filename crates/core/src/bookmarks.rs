//! Chrome bookmarks file: location and canonical form

use crate::settings::Settings;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The watch target could not be determined
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("bookmarks file not found at {0}")]
    NotFound(PathBuf),

    #[error("could not determine the {0} directory")]
    NoBaseDir(&'static str),

    #[error("unsupported operating system: {0}")]
    Unsupported(&'static str),
}

/// The bookmarks file did not parse as JSON
#[derive(Debug, Error)]
#[error("malformed bookmarks content at line {line}, column {column}: {message}")]
pub struct MalformedContent {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl From<serde_json::Error> for MalformedContent {
    fn from(e: serde_json::Error) -> Self {
        Self {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

/// Resolve the absolute path of the file to watch
///
/// An explicit `bookmarks_path` wins over the platform lookup. The file must
/// exist.
pub fn resolve_watch_target(settings: &Settings) -> Result<PathBuf, LocateError> {
    let path = match &settings.bookmarks_path {
        Some(explicit) => explicit.clone(),
        None => chrome_bookmarks_path(&settings.profile)?,
    };

    if !path.is_file() {
        return Err(LocateError::NotFound(path));
    }

    // Canonical form keeps the parent directory stable for the watcher
    Ok(std::fs::canonicalize(&path).unwrap_or(path))
}

/// Platform location of Chrome's bookmarks file for a profile
pub fn chrome_bookmarks_path(profile: &str) -> Result<PathBuf, LocateError> {
    if cfg!(target_os = "windows") {
        let base = dirs::data_local_dir().ok_or(LocateError::NoBaseDir("local app data"))?;
        Ok(base.join("Google").join("Chrome").join("User Data").join(profile).join("Bookmarks"))
    } else if cfg!(target_os = "macos") {
        let base = dirs::config_dir().ok_or(LocateError::NoBaseDir("application support"))?;
        Ok(base.join("Google").join("Chrome").join(profile).join("Bookmarks"))
    } else if cfg!(target_os = "linux") {
        let base = dirs::config_dir().ok_or(LocateError::NoBaseDir("config"))?;
        Ok(base.join("google-chrome").join(profile).join("Bookmarks"))
    } else {
        Err(LocateError::Unsupported(std::env::consts::OS))
    }
}

/// Re-serialize JSON in canonical form
///
/// Object keys are sorted, indentation is two spaces and the output ends with
/// a newline, so equal content always yields identical bytes.
pub fn normalize(raw: &[u8]) -> Result<Vec<u8>, MalformedContent> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let mut out = serde_json::to_vec_pretty(&value)?;
    out.push(b'\n');
    Ok(out)
}

/// Errors from [`read_normalized`]
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Malformed(#[from] MalformedContent),
}

/// Read the watched file and return its canonical bytes
pub fn read_normalized(path: &Path) -> Result<Vec<u8>, ReadError> {
    let raw = std::fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(normalize(&raw)?)
}
