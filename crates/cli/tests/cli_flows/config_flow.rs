//! init / config commands

use crate::bm;
use crate::common::TestEnv;
use anyhow::Result;

#[test]
fn test_init_writes_template_once() -> Result<()> {
    let env = TestEnv::new()?;

    let result = bm!(env, "init").assert_success()?;
    assert!(result.contains_stdout("Created"));
    assert!(env.config_path().exists());

    let template = std::fs::read_to_string(env.config_path())?;
    assert!(template.contains("remote = \"\""));
    assert!(template.contains("debounce_ms = 500"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(env.config_path())?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let result = bm!(env, "init").assert_failure()?;
    assert!(result.contains_stderr("already exists"));
    assert_eq!(std::fs::read_to_string(env.config_path())?, template);
    Ok(())
}

#[test]
fn test_unfilled_template_is_rejected() -> Result<()> {
    let env = TestEnv::new()?;
    bm!(env, "init").assert_success()?;

    let result = bm!(env, "sync").assert_failure()?;
    assert!(result.contains_stderr("remote"));
    Ok(())
}

#[test]
fn test_missing_config_fails() -> Result<()> {
    let env = TestEnv::new()?;
    let result = bm!(env, "sync").assert_failure()?;
    assert!(result.contains_stderr("Failed to load config"));
    Ok(())
}

#[test]
fn test_config_masks_token() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("token = \"ghp_supersecret1234\"\nbranch = \"trunk\"\n")?;

    let result = bm!(env, "config").assert_success()?;
    assert!(result.contains_stdout("****1234"));
    assert!(!result.contains_stdout("supersecret"));
    assert!(result.contains_stdout("trunk"));
    assert!(result.contains_stdout(&env.config_path().display().to_string()));
    Ok(())
}
