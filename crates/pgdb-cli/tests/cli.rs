use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// `pgdb` with its config home and the user home both inside `root`
fn pgdb(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pgdb").unwrap();
    cmd.env("PGDB_HOME", root.join("pgdb-home"))
        .env("HOME", root.join("user"))
        .env_remove("PGDB_TEMPLATES");
    cmd
}

#[test]
fn pgdb_without_command_prints_usage() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"));
}

#[test]
fn pgdb_help_lists_commands() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn pgdb_install_help_lists_flags() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .args(["install", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--quiet"))
        .stdout(predicate::str::contains("--download"));
}

#[test]
fn pgdb_stop_twice_without_install() {
    let root = tempdir().unwrap();
    for _ in 0..2 {
        pgdb(root.path())
            .arg("stop")
            .assert()
            .success()
            .stdout(predicate::str::contains("Neo4j is not installed"))
            .stdout(predicate::str::contains("InfluxDB is not running"));
    }
}

#[test]
fn pgdb_start_without_install_fails() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("executable not found"));
}

#[test]
fn pgdb_status_is_a_no_op() {
    let root = tempdir().unwrap();
    pgdb(root.path()).arg("status").assert().success();
}

#[test]
fn pgdb_first_run_writes_default_settings() {
    let root = tempdir().unwrap();
    pgdb(root.path()).arg("status").assert().success();

    let ini = fs::read_to_string(root.path().join("pgdb-home").join("config.ini")).unwrap();
    assert!(ini.contains("[Neo4j]"));
    assert!(ini.contains("[InfluxDB]"));
    assert!(ini.contains("[Data]"));
}

#[test]
fn pgdb_uninstall_without_install_reports_missing_directory() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Could not uninstall"));
    assert!(!root.path().join("pgdb-home").exists());
}

#[test]
fn pgdb_install_declining_overwrite_keeps_directory() {
    let root = tempdir().unwrap();
    let target = root.path().join("existing");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("keep.txt"), "mine").unwrap();

    pgdb(root.path())
        .args(["install", target.to_str().unwrap()])
        .write_stdin("n\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("(Y/N)"))
        .stdout(predicate::str::contains("Aborting installation."));

    assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "mine");
}

#[test]
fn pgdb_install_declining_default_directory() {
    let root = tempdir().unwrap();
    pgdb(root.path())
        .arg("install")
        .write_stdin("no\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No install directory was specified"));
    assert!(!root.path().join("pgdb-home").join("data").exists());
}

#[test]
fn pgdb_quiet_install_refuses_unrelated_directory() {
    let root = tempdir().unwrap();
    let target = root.path().join("photos");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("holiday.jpg"), "jpeg").unwrap();

    pgdb(root.path())
        .args(["install", target.to_str().unwrap(), "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not look like a previous installation"));

    assert!(target.join("holiday.jpg").exists());
}
