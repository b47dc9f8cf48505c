//! Bookmarked CLI library
//!
//! The orchestrator and its process-level plumbing, exposed for tests and
//! the `bookmarked` binary.

pub mod install;
pub mod locks;
pub mod logging;
pub mod service;

pub use locks::{DaemonLock, LockError};
pub use service::{shutdown_signal, CycleError, Service, SetupError, StatusError};
