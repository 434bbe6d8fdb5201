//! Tests for the command-line interface of the binary

use head_pose_overlay::config::Config;
use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_head-pose-overlay"))
}

#[test]
fn test_help_lists_options() {
    let output = binary().arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--cam", "--frames", "--backend", "--accessory", "--filter", "--headless", "--config", "--print-config", "--debug"] {
        assert!(help.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn test_print_config_emits_valid_yaml() {
    let output = binary().arg("--print-config").output().unwrap();
    assert!(output.status.success());

    let config: Config = serde_yaml::from_slice(&output.stdout).unwrap();
    config.validate().unwrap();
}

#[test]
fn test_unknown_backend_fails() {
    let output = binary().args(["--headless", "--backend", "sonar"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown detector backend"));
}

#[test]
fn test_unknown_accessory_fails_validation() {
    let output = binary().args(["--headless", "--accessory", "monocle"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown initial accessory"));
}

#[test]
fn test_empty_frames_directory_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let output = binary()
        .args(["--headless", "--frames"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No frames found"));
}
