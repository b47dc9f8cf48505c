//! Command implementations

pub mod config;
pub mod init;
pub mod install;
pub mod start;
pub mod status;
pub mod sync;
