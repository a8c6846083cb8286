//! Integration tests for CLI commands.
//!
//! These tests only cover commands that work without a message bus or a
//! running VDR.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the dbus2vdr binary with its config kept in `config_home`
fn dbus2vdr(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dbus2vdr").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path());
    cmd
}

#[test]
fn test_help_command() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Talk to VDR over D-Bus"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("setup"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbus2vdr"));
}

#[test]
fn test_config_show() {
    // Should work even without an existing config (uses defaults)
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[bus]"))
        .stdout(predicate::str::contains("instance = 0"))
        .stdout(predicate::str::contains("level = \"info\""));
}

#[test]
fn test_first_run_logs_config_creation() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config saved to:"));

    // The file exists now, so nothing is saved the second time
    dbus2vdr(&home)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config saved to:").not());
    assert!(home.path().join("dbus2vdr").join("config.toml").exists());
}

#[test]
fn test_config_show_reads_existing_file() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("dbus2vdr");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[bus]\nbus = \"session\"\ninstance = 3\nwatchdog = true\n",
    )
    .unwrap();

    dbus2vdr(&home)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bus = \"session\""))
        .stdout(predicate::str::contains("instance = 3"));
}

#[test]
fn test_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("dbus2vdr");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[logging]\nlevel = \"chatty\"\n").unwrap();

    dbus2vdr(&home)
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level"));
}

#[test]
fn test_unknown_subcommand() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .arg("reboot")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_keys_require_arguments() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home).arg("keys").assert().failure();
}

#[test]
fn test_instance_must_be_a_number() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .args(["--instance", "first", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_setup_help() {
    let home = TempDir::new().unwrap();
    dbus2vdr(&home)
        .args(["setup", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("set"));
}
