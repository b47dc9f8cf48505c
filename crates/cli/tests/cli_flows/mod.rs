//! End-to-end command flows

pub mod config_flow;
pub mod sync_flow;
