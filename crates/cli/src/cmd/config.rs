//! Show the effective configuration

use anyhow::{Context, Result};
use bookmarked_core::{paths, resolve_watch_target, Settings};
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    let config_path = paths::config_file()?;
    let mut settings = Settings::load().context("Failed to load config")?;

    println!("{}", "Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    let masked = settings.masked_token();
    settings.token = Some(masked);
    let rendered = toml::to_string_pretty(&settings).context("Failed to render config")?;
    for line in rendered.lines() {
        match line.split_once(" = ") {
            Some((key, value)) => println!("  {} = {}", key.cyan(), value),
            None => println!("  {}", line),
        }
    }

    println!();
    println!("{}", "Resolved:".bold());
    println!("  remote url     {}", settings.remote_url());
    match resolve_watch_target(&settings) {
        Ok(path) => println!("  watching       {}", path.display()),
        Err(e) => println!("  watching       {} ({})", "unavailable".red(), e),
    }
    println!("  working copy   {}", paths::repo_dir()?.display());

    Ok(())
}
