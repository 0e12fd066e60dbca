//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "recipe-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("GPU cluster recipe service"),
        "Should show app description"
    );
    assert!(stdout.contains("recipe"), "Should show recipe command");
    assert!(stdout.contains("bundle"), "Should show bundle command");
    assert!(stdout.contains("criteria"), "Should show criteria command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "recipe-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("rcp"), "Should show binary name");
}

/// Test that resolving a recipe as JSON produces the expected shape
#[test]
fn test_recipe_json_output() {
    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "recipe-cli",
            "--",
            "--format",
            "json",
            "recipe",
            "--accelerator",
            "h100",
            "--intent",
            "inference",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "recipe command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let recipe: serde_json::Value =
        serde_json::from_str(&stdout).expect("output should be valid JSON");

    assert_eq!(recipe["criteria"]["accelerator"], "h100");
    let order: Vec<&str> = recipe["deploymentOrder"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(order[0], "cert-manager");
    assert!(order.contains(&"network-operator"));
}

/// Test that invalid criteria values exit with code 2
#[test]
fn test_invalid_criteria_exit_code() {
    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "recipe-cli",
            "--",
            "recipe",
            "--service",
            "mainframe",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2), "criteria errors exit 2");
}

/// Test the criteria listing command
#[test]
fn test_criteria_listing() {
    let output = Command::new("cargo")
        .args(["run", "-p", "recipe-cli", "--", "criteria"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for value in ["eks", "h100", "training", "ubuntu"] {
        assert!(stdout.contains(value), "should list {value}");
    }
}
