//! Write the configuration template

use anyhow::{Context, Result};
use bookmarked_core::{paths, settings, SettingsError};
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    let config_path = paths::config_file()?;

    match settings::init_template(&config_path) {
        Ok(()) => {
            println!("{} Created {}", "✓".green(), config_path.display().to_string().cyan());
            println!();
            println!("Next steps:");
            println!("  1. Set 'remote' to your bookmarks repository (e.g. username/bookmarks)");
            println!("  2. Set 'token' to a personal access token with write access");
            println!("  3. Run 'bookmarked sync' to test, then 'bookmarked install'");
            Ok(())
        }
        Err(SettingsError::AlreadyExists(path)) => {
            anyhow::bail!("Config file already exists at {}", path.display())
        }
        Err(e) => Err(e).context("Failed to write config template"),
    }
}
