//! Watch mode

use anyhow::{Context, Result};
use bookmarked_core::{paths, Settings};
use cli_lib::{shutdown_signal, DaemonLock, Service};
use std::sync::Arc;

pub async fn run() -> Result<()> {
    let settings = Settings::load().context("Failed to load config")?;

    let lock = DaemonLock::acquire(&paths::locks_dir()?)?;
    let service = Arc::new(Service::from_settings(settings)?);

    service.start_watching(shutdown_signal()).await?;

    drop(lock);
    Ok(())
}
