//! One-shot sync against a local remote

use crate::bm;
use crate::common::TestEnv;
use anyhow::Result;

#[test]
fn test_first_sync_then_no_change() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("")?;

    let result = bm!(env, "sync").assert_success()?;
    assert!(result.contains_stdout("Synced bookmarks"), "{}", result.stdout);
    assert_eq!(env.remote_commits()?, 1);

    let summary = env.remote_head_summary()?.unwrap_or_default();
    assert!(summary.starts_with("Update bookmarks - "), "{}", summary);

    // Payload is the canonical form: sorted keys, two-space indent, newline
    let payload = std::fs::read_to_string(env.repo_dir().join("Bookmarks.json"))?;
    assert!(payload.starts_with("{\n  \"roots\": {"), "{}", payload);
    assert!(payload.ends_with("}\n"));

    let result = bm!(env, "sync").assert_success()?;
    assert!(result.contains_stdout("already up to date"), "{}", result.stdout);
    assert_eq!(env.remote_commits()?, 1);
    Ok(())
}

#[test]
fn test_changed_bookmarks_create_one_commit() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("commit_message = \"Bookmarks\"\n")?;
    bm!(env, "sync").assert_success()?;

    std::fs::write(env.bookmarks_path(), r#"{"version": 1, "roots": {}}"#)?;
    bm!(env, "sync").assert_success()?;

    assert_eq!(env.remote_commits()?, 2);
    let summary = env.remote_head_summary()?.unwrap_or_default();
    assert!(summary.starts_with("Bookmarks - "), "{}", summary);
    Ok(())
}

#[test]
fn test_missing_bookmarks_file_creates_nothing() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("")?;
    std::fs::remove_file(env.bookmarks_path())?;

    let result = bm!(env, "sync").assert_failure()?;
    assert!(result.contains_stderr("not found"), "{}", result.stderr);
    assert!(!env.repo_dir().exists());
    assert_eq!(env.remote_commits()?, 0);
    Ok(())
}

#[test]
fn test_malformed_bookmarks_fail_sync() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("")?;
    std::fs::write(env.bookmarks_path(), "{\"roots\": [")?;

    let result = bm!(env, "sync").assert_failure()?;
    assert!(result.contains_stderr("malformed"), "{}", result.stderr);
    assert_eq!(env.remote_commits()?, 0);
    Ok(())
}

#[test]
fn test_status_reports_working_copy() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_config("")?;

    let result = bm!(env, "status").assert_success()?;
    assert!(result.contains_stdout("Not created yet"));

    bm!(env, "sync").assert_success()?;
    let result = bm!(env, "status").assert_success()?;
    assert!(result.contains_stdout("Last commit:"));
    assert!(result.contains_stdout("Update bookmarks"));
    Ok(())
}
