//! Shared building blocks for Bookmarked
//!
//! This crate provides:
//! - Settings loading and validation (`~/.bookmarked/config.toml`)
//! - State directory layout (config, working copy, logs, locks)
//! - Watch target resolution for the Chrome bookmarks file
//! - Content normalization (canonical JSON for diff-friendly history)

pub mod bookmarks;
pub mod paths;
pub mod settings;

// Re-exports
pub use bookmarks::{normalize, read_normalized, resolve_watch_target, LocateError, MalformedContent, ReadError};
pub use settings::{Settings, SettingsError};

/// Name of the tracked payload file inside the working copy
pub const PAYLOAD_FILE: &str = "Bookmarks.json";
