//! CLI smoke tests — verify all commands that work without API keys.
//!
//! These tests run the compiled binary and verify exit codes and output.
//! Every test points `--config` at a temporary file so the user's real
//! configuration and sessions are never touched.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Helper: run chipclaw with given args and return (exit_code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_chipclaw");
    let output = Command::new(bin)
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("CHIPCLAW_PROVIDER_API_KEY")
        .output()
        .expect("failed to execute chipclaw binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

/// Write a config whose data and workspace dirs live under `dir`.
fn write_config(dir: &Path, extra_agent: &str) -> String {
    let path = dir.join("config.json");
    let config = format!(
        r#"{{"agent": {{"workspace": "{}", "data_dir": "{}"{}}}}}"#,
        dir.join("workspace").display(),
        dir.join("data").display(),
        extra_agent
    );
    std::fs::write(&path, config).unwrap();
    path.to_string_lossy().to_string()
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(&[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("chipclaw"));
}

#[test]
fn cli_help_lists_commands() {
    let (code, stdout, _stderr) = run_cli(&["--help"]);
    assert_eq!(code, 0);
    for command in ["gateway", "agent", "sessions", "config", "version"] {
        assert!(stdout.contains(command), "missing {} in help", command);
    }
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(&["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("chipclaw"));
    assert!(stdout.contains('.'));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_check_valid() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    let (code, stdout, _stderr) = run_cli(&["--config", &path, "config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Config file:"));
    assert!(stdout.contains("Configuration looks good!"), "{}", stdout);
}

#[test]
fn cli_config_check_reports_typo() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), r#", "max_tool_iteration": 3"#);
    let (code, stdout, _stderr) = run_cli(&["--config", &path, "config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("[ERROR] agent.max_tool_iteration"), "{}", stdout);
    assert!(stdout.contains("did you mean 'max_tool_iterations'?"));
}

#[test]
fn cli_config_check_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let (code, stdout, _stderr) =
        run_cli(&["--config", &path.to_string_lossy(), "config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No config file found"));
}

#[test]
fn cli_config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"provider": {"api_key": "sk-secret-abcd"}}"#).unwrap();
    let (code, stdout, _stderr) =
        run_cli(&["--config", &path.to_string_lossy(), "config", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("abcd"));
    assert!(!stdout.contains("sk-secret"));
    assert!(stdout.contains("\"max_tool_iterations\": 15"));
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn cli_sessions_list_empty() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    let (code, stdout, _stderr) = run_cli(&["--config", &path, "sessions", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No sessions"));
}

#[test]
fn cli_sessions_show_and_delete() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    let sessions_dir = dir.path().join("data").join("sessions");
    std::fs::create_dir_all(&sessions_dir).unwrap();
    std::fs::write(
        sessions_dir.join("uart%3Auart_default.jsonl"),
        "{\"role\":\"user\",\"content\":\"blink\"}\n{\"role\":\"assistant\",\"content\":\"blinking\"}\n",
    )
    .unwrap();

    let (code, stdout, _stderr) = run_cli(&["--config", &path, "sessions", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("uart:uart_default"));

    let (code, stdout, _stderr) =
        run_cli(&["--config", &path, "sessions", "show", "uart:uart_default"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("[user] blink"));
    assert!(stdout.contains("[assistant] blinking"));

    let (code, _stdout, _stderr) =
        run_cli(&["--config", &path, "sessions", "delete", "uart:uart_default"]);
    assert_eq!(code, 0);
    assert!(!sessions_dir.join("uart%3Auart_default.jsonl").exists());
}

#[test]
fn cli_sessions_show_nonexistent() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    let (code, _stdout, stderr) = run_cli(&["--config", &path, "sessions", "show", "mqtt:nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("No session named"));
}

// ============================================================================
// Invalid commands & edge cases
// ============================================================================

#[test]
fn cli_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), r#", "max_tool_iterations": 0"#);
    let (code, _stdout, stderr) = run_cli(&["--config", &path, "sessions", "list"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("max_tool_iterations"), "{}", stderr);
}

#[test]
fn cli_invalid_command() {
    let (code, _stdout, stderr) = run_cli(&["nonexistent-command"]);
    assert_ne!(code, 0);
    assert!(
        stderr.contains("error") || stderr.contains("unrecognized"),
        "Expected error message for invalid command, got stderr: {}",
        stderr
    );
}

#[test]
fn cli_agent_help() {
    let (code, stdout, _stderr) = run_cli(&["agent", "--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("--message"));
}

#[test]
fn cli_gateway_help() {
    let (code, stdout, _stderr) = run_cli(&["gateway", "--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Ctrl-C"));
}
