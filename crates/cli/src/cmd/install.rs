//! Register / remove the background service

use anyhow::Result;
use cli_lib::install;
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    let installed = install::install()?;

    println!("{} Service installed successfully", "✓".green());
    if let Some(definition) = &installed.definition {
        println!("  Definition: {}", definition.display().to_string().cyan());
    }
    println!("  The service will start automatically when you log in");
    println!("  Logs: {}", installed.log_file.display());
    println!();
    println!("To start now, run: {}", installed.start_hint.cyan());
    println!("To check status, run: {}", "bookmarked status".cyan());
    Ok(())
}

pub async fn run_uninstall() -> Result<()> {
    install::uninstall()?;
    println!("{} Service uninstalled successfully", "✓".green());
    Ok(())
}
