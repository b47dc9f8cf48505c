//! Bookmarked CLI - bookmarked command

use anyhow::Result;
use bookmarked_core::Settings;
use clap::{Parser, Subcommand};

mod cmd;

/// Bookmarked - Sync Chrome bookmarks to a git repository automatically
#[derive(Parser)]
#[command(name = "bookmarked")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration template
    Init,
    /// Sync bookmarks once and exit
    Sync,
    /// Watch the bookmarks file and sync on every change
    Start,
    /// Register as a login-time background service
    Install,
    /// Remove the background service
    Uninstall,
    /// Show service and working copy status
    Status,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only watch mode logs to the configured file
    let log_path = match cli.command {
        Commands::Start => Settings::load().ok().and_then(|s| s.log_path),
        _ => None,
    };
    let _log_guard = cli_lib::logging::init(log_path.as_deref())?;

    match cli.command {
        Commands::Init => cmd::init::run().await,
        Commands::Sync => cmd::sync::run().await,
        Commands::Start => cmd::start::run().await,
        Commands::Install => cmd::install::run().await,
        Commands::Uninstall => cmd::install::run_uninstall().await,
        Commands::Status => cmd::status::run().await,
        Commands::Config => cmd::config::run().await,
    }
}
