//! One-shot synchronization

use anyhow::{Context, Result};
use bookmarked_core::Settings;
use cli_lib::Service;
use gitsync::SyncResult;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

pub async fn run() -> Result<()> {
    let settings = Settings::load().context("Failed to load config")?;
    let service = Service::from_settings(settings)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message("Preparing working copy...");
    if let Err(e) = service.initialize().await {
        spinner.finish_and_clear();
        return Err(e.into());
    }

    spinner.set_message("Syncing bookmarks...");
    let result = service.perform_one_sync().await;
    spinner.finish_and_clear();

    match result.context("Sync failed")? {
        SyncResult::NoChange => println!("{} Bookmarks already up to date", "✓".green()),
        SyncResult::Synced { revision } => {
            let id = revision.to_string();
            let short = &id[..8];
            println!("{} Synced bookmarks ({})", "✓".green(), short.yellow());
        }
    }
    Ok(())
}
