//! Integration coverage for the runlevel registry (component E) against a real
//! init.d directory with multiple runlevels sharing services.

use std::{fs, os::unix::fs::PermissionsExt};

use rc_core::{paths::Paths, runlevel::RunlevelRegistry};
use tempfile::tempdir;

fn make_script(paths: &Paths, name: &str) {
    fs::create_dir_all(&paths.init_dir).unwrap();
    let path = paths.script_path(name);
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

#[test]
fn a_service_can_belong_to_more_than_one_runlevel_independently() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "syslog");

    let registry = RunlevelRegistry::new(&paths);
    registry.add("boot", "syslog").unwrap();
    registry.add("default", "syslog").unwrap();

    assert!(registry.in_runlevel("syslog", "boot"));
    assert!(registry.in_runlevel("syslog", "default"));

    registry.delete("boot", "syslog").unwrap();
    assert!(!registry.in_runlevel("syslog", "boot"));
    assert!(registry.in_runlevel("syslog", "default"));
}

#[test]
fn runlevels_lists_every_directory_under_the_runlevels_root() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "syslog");

    let registry = RunlevelRegistry::new(&paths);
    registry.add("boot", "syslog").unwrap();
    registry.add("default", "syslog").unwrap();

    assert_eq!(registry.runlevels().unwrap(), vec!["boot".to_string(), "default".to_string()]);
    assert!(registry.exists("boot"));
    assert!(!registry.exists("single"));
}

#[test]
fn current_runlevel_round_trips_through_the_softlevel_file() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    let registry = RunlevelRegistry::new(&paths);

    assert_eq!(registry.current_runlevel().unwrap(), None);
    registry.set_runlevel("default").unwrap();

    // A fresh registry instance over the same paths sees the persisted value.
    let reader = RunlevelRegistry::new(&paths);
    assert_eq!(reader.current_runlevel().unwrap(), Some("default".to_string()));
}
