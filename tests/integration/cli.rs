//! End-to-end coverage for the `rcctl` binary (component O) driving the library
//! through a real on-disk layout, the way a user invoking the binary would.

use std::{fs, os::unix::fs::PermissionsExt};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn make_script(init_dir: &std::path::Path, name: &str, depend_lines: &[&str]) {
    fs::create_dir_all(init_dir).unwrap();
    let path = init_dir.join(name);
    let mut body = String::from("#!/bin/sh\ncase \"$1\" in\n  depend)\n");
    for line in depend_lines {
        body.push_str(&format!("    echo '{line}'\n"));
    }
    body.push_str("    ;;\n  *) exit 0 ;;\nesac\n");
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

fn write_settings(root: &std::path::Path) -> std::path::PathBuf {
    let settings_path = root.join("rc.conf.yaml");
    fs::write(
        &settings_path,
        format!(
            "init_dir: \"{root}/init.d\"\nrunlevels_root: \"{root}/runlevels\"\nstate_root: \"{root}/state\"\ndeptree_cache: \"{root}/state/deptree\"\nsoftlevel_file: \"{root}/state/softlevel\"\n",
            root = root.display()
        ),
    )
    .unwrap();
    settings_path
}

#[test]
fn runlevels_lists_known_runlevels() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("runlevels").join("default")).unwrap();
    let settings_path = write_settings(root);

    Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .arg("runlevels")
        .assert()
        .success()
        .stdout(predicate::str::contains("default"));
}

#[test]
fn order_prints_services_in_dependency_order() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    make_script(&root.join("init.d"), "a", &[]);
    make_script(&root.join("init.d"), "b", &["need a"]);
    fs::create_dir_all(root.join("runlevels").join("default")).unwrap();
    std::os::unix::fs::symlink(root.join("init.d").join("a"), root.join("runlevels/default/a")).unwrap();
    std::os::unix::fs::symlink(root.join("init.d").join("b"), root.join("runlevels/default/b")).unwrap();
    let settings_path = write_settings(root);

    let output = Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .args(["order", "default"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["a", "b"]);
}

#[test]
fn state_reports_stopped_for_a_never_started_service() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    make_script(&root.join("init.d"), "sshd", &[]);
    let settings_path = write_settings(root);

    Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .args(["state", "sshd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped"));
}

#[test]
fn transition_starts_runlevel_members_and_updates_current_runlevel() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    make_script(&root.join("init.d"), "sshd", &[]);
    fs::create_dir_all(root.join("runlevels").join("default")).unwrap();
    std::os::unix::fs::symlink(root.join("init.d").join("sshd"), root.join("runlevels/default/sshd")).unwrap();
    let settings_path = write_settings(root);

    Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .args(["transition", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("started sshd"));

    Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .args(["state", "sshd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("started"));
}

#[test]
fn an_unknown_runlevel_exits_non_zero_with_a_clear_message() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("init.d")).unwrap();
    let settings_path = write_settings(root);

    Command::cargo_bin("rcctl")
        .unwrap()
        .arg("--settings")
        .arg(&settings_path)
        .args(["transition", "nonexistent"])
        .assert()
        .failure();
}
