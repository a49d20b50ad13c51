//! CLI integration tests

use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "typhoon-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Typhoon Impact Analysis"), "Should show app name");
    assert!(stdout.contains("cluster"), "Should show cluster command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("typhoon"), "Should show binary name");
}

/// Test cluster subcommand help
#[test]
fn test_cluster_help() {
    let output = run(&["cluster", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Cluster help should succeed");
    assert!(stdout.contains("--file"), "Should show file option");
    assert!(stdout.contains("--k"), "Should show k option");
    assert!(stdout.contains("--seed"), "Should show seed option");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = run(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in ["--name", "--province", "--wind", "--rainfall", "--duration", "--population"] {
        assert!(stdout.contains(flag), "Should show {flag} option");
    }
}

/// Test format and api-url options
#[test]
fn test_global_options() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("TYPHOON_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = run(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_predict_missing_argument() {
    let output = run(&["predict", "--name", "Yolanda"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
