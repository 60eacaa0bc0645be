#![allow(deprecated)] // TODO: migrate cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VNET_ONLY: &str = r#"
resourceGroupName: rg-drifttest
uniqueSuffix: ab12cd34
deployVnet: true
deployNsg: false
deployStorage: false
deployAppServicePlan: false
deployLogAnalytics: false
"#;

fn project(config: &str) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("stackflow.yaml"), config).unwrap();
    root
}

fn stack(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("STACKFLOW_CONFIG_PATH")
        .env_remove("STACKFLOW_PARALLEL")
        .env("XDG_CONFIG_HOME", dir.path())
        .env("NO_COLOR", "1");
    cmd
}

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("outputs"))
        .stdout(predicate::str::contains("--set"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_up_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("up")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// Without a configuration file the run stops before provisioning
#[test]
fn test_preview_without_config() {
    let dir = tempfile::tempdir().unwrap();
    stack(&dir)
        .arg("preview")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stack configuration not found"));
}

#[test]
fn test_preview_vnet_only() {
    let dir = project(VNET_ONLY);
    stack(&dir)
        .arg("preview")
        .assert()
        .success()
        .stdout(predicate::str::contains("drifttest-vnet"))
        .stdout(predicate::str::contains("drifttest-nsg"))
        .stdout(predicate::str::contains("1 resources to provision in 1 waves"));
}

#[test]
fn test_preview_with_overrides() {
    let dir = project(VNET_ONLY);
    stack(&dir)
        .args(["preview", "--set", "deployServiceBus=true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-orders"))
        .stdout(predicate::str::contains("5 resources to provision in 2 waves"));
}

#[test]
fn test_missing_resource_group() {
    let dir = project("location: westeurope\n");
    stack(&dir)
        .arg("preview")
        .assert()
        .failure()
        .stderr(predicate::str::contains("resourceGroupName"));
}

#[test]
fn test_up_prints_and_records_outputs() {
    let dir = project(VNET_ONLY);
    stack(&dir)
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"vnetName\": \"drifttest-vnet\""))
        .stdout(predicate::str::contains("\"uniqueSuffix\": \"ab12cd34\""))
        .stdout(predicate::str::contains("nsgId").not());

    assert!(dir.path().join(".stackflow/state.json").exists());

    stack(&dir)
        .arg("outputs")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"vnetId\""));
}

#[test]
fn test_outputs_without_state() {
    let dir = tempfile::tempdir().unwrap();
    stack(&dir)
        .arg("outputs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack up"));
}

#[test]
fn test_up_with_explicit_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.yaml");
    fs::write(&config, VNET_ONLY).unwrap();

    stack(&dir)
        .arg("up")
        .arg("--config")
        .arg(&config)
        .args(["--parallel", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vnetId"));
}
