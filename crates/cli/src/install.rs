//! Login-time service registration
//!
//! - Linux: systemd user unit
//! - macOS: LaunchAgent
//! - Windows: scheduled task run at logon

use anyhow::{Context, Result};
use bookmarked_core::paths;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const SYSTEMD_UNIT: &str = "bookmarked.service";
pub const LAUNCH_AGENT_LABEL: &str = "com.bookmarked.sync";
pub const SCHEDULED_TASK: &str = "Bookmarked";

/// What `install` registered
#[derive(Debug, Clone)]
pub struct Installed {
    /// Service definition written, if the platform uses one
    pub definition: Option<PathBuf>,
    pub log_file: PathBuf,
    /// How to start it right away
    pub start_hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    NotInstalled,
    Installed { running: bool, details: String },
}

/// systemd user unit running `<exe> start`, appending its output to `log_file`
pub fn systemd_unit(exe: &Path, log_file: &Path, state_dir: Option<&Path>) -> String {
    let environment = state_dir
        .map(|dir| format!("Environment={}={}\n", paths::HOME_ENV, dir.display()))
        .unwrap_or_default();

    format!(
        "[Unit]
Description=Bookmarked - Chrome Bookmark Sync Service
After=network.target

[Service]
Type=simple
ExecStart=\"{exe}\" start
{environment}StandardOutput=append:{log}
StandardError=append:{log}
Restart=on-failure
RestartSec=10

[Install]
WantedBy=default.target
",
        exe = exe.display(),
        log = log_file.display(),
        environment = environment,
    )
}

/// LaunchAgent plist running `<exe> start` at load, logging to `log_file`
pub fn launch_agent_plist(exe: &Path, log_file: &Path, state_dir: Option<&Path>) -> String {
    let environment = state_dir
        .map(|dir| {
            format!(
                "    <key>EnvironmentVariables</key>
    <dict>
        <key>{}</key>
        <string>{}</string>
    </dict>
",
                paths::HOME_ENV,
                xml_escape(&dir.display().to_string())
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>start</string>
    </array>
{environment}    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <false/>
    <key>StandardOutPath</key>
    <string>{log}</string>
    <key>StandardErrorPath</key>
    <string>{log}</string>
</dict>
</plist>
"#,
        label = LAUNCH_AGENT_LABEL,
        exe = xml_escape(&exe.display().to_string()),
        log = xml_escape(&log_file.display().to_string()),
        environment = environment,
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// State dir to bake into the service, when it was relocated
fn relocated_state_dir() -> Option<PathBuf> {
    std::env::var_os(paths::HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Run a platform tool, returning its combined output on success
fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", program))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(text)
    } else {
        anyhow::bail!("{} {} failed: {}", program, args.join(" "), text.trim())
    }
}

/// Best effort: failures are logged only
fn run_tool_quiet(program: &str, args: &[&str]) {
    if let Err(e) = run_tool(program, args) {
        tracing::debug!("{}", e);
    }
}

fn prepare() -> Result<(PathBuf, PathBuf)> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;
    let log_file = paths::default_log_file()?;
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok((exe, log_file))
}

#[cfg(target_os = "linux")]
fn systemd_unit_path() -> Result<PathBuf> {
    let config = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config.join("systemd").join("user").join(SYSTEMD_UNIT))
}

#[cfg(target_os = "macos")]
fn launch_agent_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join("Library")
        .join("LaunchAgents")
        .join(format!("{}.plist", LAUNCH_AGENT_LABEL)))
}

fn write_definition(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Register the service for the current user
#[cfg(target_os = "linux")]
pub fn install() -> Result<Installed> {
    let (exe, log_file) = prepare()?;
    let unit = systemd_unit_path()?;

    write_definition(
        &unit,
        &systemd_unit(&exe, &log_file, relocated_state_dir().as_deref()),
    )?;
    run_tool_quiet("systemctl", &["--user", "daemon-reload"]);
    run_tool("systemctl", &["--user", "enable", SYSTEMD_UNIT]).context("Failed to enable service")?;

    Ok(Installed {
        definition: Some(unit),
        log_file,
        start_hint: "systemctl --user start bookmarked".to_string(),
    })
}

#[cfg(target_os = "macos")]
pub fn install() -> Result<Installed> {
    let (exe, log_file) = prepare()?;
    let plist = launch_agent_path()?;

    write_definition(
        &plist,
        &launch_agent_plist(&exe, &log_file, relocated_state_dir().as_deref()),
    )?;
    let plist_arg = plist.to_string_lossy().into_owned();
    run_tool("launchctl", &["load", &plist_arg]).context("Failed to load launch agent")?;

    Ok(Installed {
        definition: Some(plist),
        log_file,
        start_hint: "bookmarked start".to_string(),
    })
}

#[cfg(target_os = "windows")]
pub fn install() -> Result<Installed> {
    let (exe, log_file) = prepare()?;
    let action = format!("\"{}\" start", exe.display());

    run_tool_quiet("schtasks", &["/Delete", "/TN", SCHEDULED_TASK, "/F"]);
    run_tool(
        "schtasks",
        &["/Create", "/TN", SCHEDULED_TASK, "/TR", &action, "/SC", "ONLOGON", "/RL", "HIGHEST", "/F"],
    )
    .context("Failed to create scheduled task")?;

    Ok(Installed {
        definition: None,
        log_file,
        start_hint: "bookmarked start".to_string(),
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn install() -> Result<Installed> {
    anyhow::bail!("unsupported operating system: {}", std::env::consts::OS)
}

/// Remove the service; a missing registration is not an error
#[cfg(target_os = "linux")]
pub fn uninstall() -> Result<()> {
    run_tool_quiet("systemctl", &["--user", "stop", SYSTEMD_UNIT]);
    run_tool_quiet("systemctl", &["--user", "disable", SYSTEMD_UNIT]);
    remove_if_present(&systemd_unit_path()?)?;
    run_tool_quiet("systemctl", &["--user", "daemon-reload"]);
    Ok(())
}

#[cfg(target_os = "macos")]
pub fn uninstall() -> Result<()> {
    let plist = launch_agent_path()?;
    let plist_arg = plist.to_string_lossy().into_owned();
    run_tool_quiet("launchctl", &["unload", &plist_arg]);
    remove_if_present(&plist)
}

#[cfg(target_os = "windows")]
pub fn uninstall() -> Result<()> {
    run_tool("schtasks", &["/Delete", "/TN", SCHEDULED_TASK, "/F"])
        .context("Failed to delete scheduled task")?;
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn uninstall() -> Result<()> {
    anyhow::bail!("unsupported operating system: {}", std::env::consts::OS)
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Ask the platform tool about the service
#[cfg(target_os = "linux")]
pub fn status() -> Result<ServiceState> {
    if !systemd_unit_path()?.exists() {
        return Ok(ServiceState::NotInstalled);
    }
    Ok(match run_tool("systemctl", &["--user", "status", SYSTEMD_UNIT]) {
        Ok(details) => ServiceState::Installed { running: true, details },
        Err(e) => ServiceState::Installed {
            running: false,
            details: e.to_string(),
        },
    })
}

#[cfg(target_os = "macos")]
pub fn status() -> Result<ServiceState> {
    if !launch_agent_path()?.exists() {
        return Ok(ServiceState::NotInstalled);
    }
    Ok(match run_tool("launchctl", &["list", LAUNCH_AGENT_LABEL]) {
        Ok(details) => ServiceState::Installed { running: true, details },
        Err(_) => ServiceState::Installed {
            running: false,
            details: String::new(),
        },
    })
}

#[cfg(target_os = "windows")]
pub fn status() -> Result<ServiceState> {
    Ok(match run_tool("schtasks", &["/Query", "/TN", SCHEDULED_TASK, "/FO", "LIST", "/V"]) {
        Ok(details) => {
            let running = details.contains("Running");
            ServiceState::Installed { running, details }
        }
        Err(_) => ServiceState::NotInstalled,
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn status() -> Result<ServiceState> {
    anyhow::bail!("unsupported operating system: {}", std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemd_unit() {
        let log = Path::new("/home/me/.bookmarked/bookmarked.log");
        let unit = systemd_unit(Path::new("/usr/local/bin/bookmarked"), log, None);
        assert!(unit.contains("ExecStart=\"/usr/local/bin/bookmarked\" start\n"));
        assert!(unit.contains("WantedBy=default.target"));
        assert!(!unit.contains("Environment="));

        let unit = systemd_unit(Path::new("/bin/bookmarked"), log, Some(Path::new("/data/bm")));
        assert!(unit.contains("Environment=BOOKMARKED_HOME=/data/bm\nStandardOutput="));
    }

    #[test]
    fn test_systemd_unit_appends_output_to_log_file() {
        let unit = systemd_unit(
            Path::new("/usr/local/bin/bookmarked"),
            Path::new("/home/me/.bookmarked/bookmarked.log"),
            None,
        );
        assert!(unit.contains("StandardOutput=append:/home/me/.bookmarked/bookmarked.log\n"));
        assert!(unit.contains("StandardError=append:/home/me/.bookmarked/bookmarked.log\n"));
    }

    #[test]
    fn test_launch_agent_plist() {
        let plist = launch_agent_plist(
            Path::new("/Applications/B&M/bookmarked"),
            Path::new("/Users/me/.bookmarked/bookmarked.log"),
            None,
        );
        assert!(plist.contains("<string>com.bookmarked.sync</string>"));
        assert!(plist.contains("<string>/Applications/B&amp;M/bookmarked</string>"));
        assert_eq!(plist.matches("/Users/me/.bookmarked/bookmarked.log").count(), 2);
        assert!(!plist.contains("EnvironmentVariables"));

        let plist = launch_agent_plist(
            Path::new("/bin/bookmarked"),
            Path::new("/tmp/b.log"),
            Some(Path::new("/data/bm")),
        );
        assert!(plist.contains("<key>BOOKMARKED_HOME</key>\n        <string>/data/bm</string>"));
    }
}
