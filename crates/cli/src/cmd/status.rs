//! Service and working copy status

use anyhow::Result;
use bookmarked_core::{paths, Settings, PAYLOAD_FILE};
use cli_lib::install::{self, ServiceState};
use cli_lib::DaemonLock;
use gitsync::{RemoteConfig, SyncSession};
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    println!("{}", "Bookmarked Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    print!("Service:       ");
    match install::status() {
        Ok(ServiceState::NotInstalled) => println!("{}", "Not installed".yellow()),
        Ok(ServiceState::Installed { running: true, details }) => {
            println!("{}", "Installed, running ✓".green());
            for line in details.lines().filter(|l| !l.trim().is_empty()).take(6) {
                println!("  {}", line.dimmed());
            }
        }
        Ok(ServiceState::Installed { running: false, .. }) => {
            println!("{}", "Installed, not running".yellow())
        }
        Err(e) => println!("{} ({})", "Unknown".yellow(), e),
    }

    print!("Watcher:       ");
    match DaemonLock::holder(&paths::locks_dir()?) {
        Some(pid) => println!("{} (pid {})", "Running ✓".green(), pid),
        None => println!("{}", "Not running".yellow()),
    }
    println!();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            println!("Config:        {} ({})", "Unavailable".red(), e);
            println!("  {}", "Tip: Run 'bookmarked init' to create one".dimmed());
            return Ok(());
        }
    };

    println!("Remote:        {}", settings.remote_url().cyan());
    println!("Branch:        {}", settings.branch);

    let repo_dir = paths::repo_dir()?;
    if !repo_dir.exists() {
        println!("Working copy:  {}", "Not created yet".dimmed());
        println!();
        println!("{}", "Tip: Run 'bookmarked sync' to clone and sync".dimmed());
        return Ok(());
    }

    let remote = RemoteConfig {
        url: settings.remote_url(),
        token: settings.token.clone(),
        branch: settings.branch.clone(),
    };
    let mut session = SyncSession::new(&repo_dir, PAYLOAD_FILE, remote);
    let status = tokio::task::spawn_blocking(move || {
        session.initialize()?;
        Ok::<_, anyhow::Error>(session.status()?)
    })
    .await??;

    println!("Working copy:  {}", repo_dir.display().to_string().cyan());
    match (status.head, status.head_summary) {
        (Some(head), summary) => {
            let id = head.to_string();
            let short = &id[..8];
            println!("  Last commit: {} {}", short.yellow(), summary.unwrap_or_default());
            if let Some(seconds) = status.head_time {
                if let Some(at) = chrono::DateTime::from_timestamp(seconds, 0) {
                    let local = at.with_timezone(&chrono::Local);
                    println!("  Committed:   {}", local.format("%Y-%m-%d %H:%M:%S").to_string().dimmed());
                }
            }
        }
        (None, _) => println!("  Last commit: {}", "None yet".dimmed()),
    }

    if status.ahead > 0 {
        println!("  {}", format!("{} commit(s) not yet pushed", status.ahead).yellow());
    }
    if status.behind > 0 {
        println!("  {} commit(s) on the remote not yet pulled", status.behind);
    }
    if status.dirty {
        println!("  {}", "Uncommitted changes present".yellow());
    }

    Ok(())
}
