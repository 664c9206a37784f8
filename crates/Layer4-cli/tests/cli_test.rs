//! `warden` binary tests

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output, Stdio};

fn warden(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_warden"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run warden")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_exec_safe_command() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "exec", "echo hello-cli"]);

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out).trim(), "hello-cli");
}

#[test]
fn test_exec_mirrors_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "exec", "exit 7"]);
    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn test_exec_blocked_command() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "exec", "rm -rf /"]);

    assert_eq!(out.status.code(), Some(126));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Blocked"));
}

#[test]
fn test_exec_dangerous_without_answer_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("build")).unwrap();

    // stdin is closed, so the prompt reads an empty answer
    let out = warden(dir.path(), &["--no-snapshot", "exec", "rm -rf build"]);

    assert_eq!(out.status.code(), Some(126));
    assert!(dir.path().join("build").exists());
}

#[test]
fn test_exec_dangerous_with_yes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("build")).unwrap();

    let out = warden(dir.path(), &["--no-snapshot", "exec", "--yes", "rm -rf build"]);

    assert_eq!(out.status.code(), Some(0));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn test_exec_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(
        dir.path(),
        &["--no-snapshot", "exec", "--timeout", "1", "echo begun; sleep 10"],
    );

    assert_eq!(out.status.code(), Some(124));
    assert!(stdout(&out).contains("begun"));
}

#[test]
fn test_classify_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "--json", "classify", "git push --force"]);

    assert_eq!(out.status.code(), Some(0));
    let verdict: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(verdict["level"], "dangerous");
    assert_eq!(verdict["source"], "pattern-only");
}

#[test]
fn test_register_persists_to_snapshot() {
    let dir = tempfile::tempdir().unwrap();

    let out = warden(
        dir.path(),
        &[
            "register",
            "weather",
            "--description",
            "Forecasts",
            "--capability",
            "forecast",
            "--meta",
            "owner=ops",
        ],
    );
    assert_eq!(out.status.code(), Some(0));
    assert!(dir.path().join(".warden/registry.json").exists());

    let out = warden(dir.path(), &["services", "--capability", "forecast"]);
    assert_eq!(out.status.code(), Some(0));
    let listing = stdout(&out);
    assert!(listing.contains("weather"));
    assert!(listing.contains("custom"));
}

#[test]
fn test_invoke_builtin_service() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "from disk").unwrap();

    let out = warden(
        dir.path(),
        &["--no-snapshot", "invoke", "file_reader", "--args", r#"{"path": "notes.txt"}"#],
    );

    assert_eq!(out.status.code(), Some(0));
    let data: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(data["content"], "from disk");
}

#[test]
fn test_invoke_unknown_service_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "invoke", "teleporter"]);
    assert!(!out.status.success());
}

#[test]
fn test_invoke_unknown_service_prints_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "invoke", "teleporter"]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("✗ "));
    assert!(stderr.contains("teleporter"));
}

#[test]
fn test_invoke_blocked_shell_command_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(
        dir.path(),
        &["--no-snapshot", "invoke", "shell_executor", "--args", r#"{"command": "rm -rf \"/\""}"#],
    );

    assert_eq!(out.status.code(), Some(126));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Blocked"));
}

#[test]
fn test_exec_blocked_names_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let out = warden(dir.path(), &["--no-snapshot", "exec", "rm -rf //"]);

    assert_eq!(out.status.code(), Some(126));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Command 'rm -rf //' was refused"));
}

#[test]
fn test_classify_in_read_only_directory() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let locked = dir.path().join("locked");
    std::fs::create_dir(&locked).unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

    let out = warden(&locked, &["classify", "ls"]);

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).starts_with("safe"));
}
