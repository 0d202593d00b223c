//! Integration coverage for the metadata store (component D) combined with the
//! executor (component H): a started service's recorded daemon should reflect its
//! actual spawned process, and `crashed` should follow a real (faked) `ProcessQuery`.

use rc_core::{exec::Executor, metadata::MetadataStore, paths::Paths, process::FixedProcessQuery};
use std::{fs, os::unix::fs::PermissionsExt};
use tempfile::tempdir;

fn make_script(paths: &Paths, name: &str, body: &str) {
    fs::create_dir_all(&paths.init_dir).unwrap();
    let path = paths.script_path(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

#[test]
fn starting_a_service_clears_any_previously_recorded_daemons() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "sshd", "#!/bin/sh\nexit 0\n");

    let metadata = MetadataStore::new(paths.clone());
    metadata.add_daemon("sshd", "/usr/sbin/sshd-old", None, None).unwrap();

    let executor = Executor::new(paths.clone());
    executor.start("sshd").unwrap();

    let metadata = MetadataStore::new(paths);
    assert!(!metadata.started_daemon("sshd", "/usr/sbin/sshd-old", 0).unwrap());
}

#[test]
fn crashed_reflects_a_fixed_process_query_after_a_real_start() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "sshd", "#!/bin/sh\nexit 0\n");

    let executor = Executor::new(paths.clone());
    executor.start("sshd").unwrap();

    let metadata = MetadataStore::new(paths.clone());
    metadata.add_daemon("sshd", "/usr/sbin/sshd", None, Some("/run/sshd.pid")).unwrap();

    let not_crashed = MetadataStore::with_process_query(
        paths.clone(),
        Box::new(FixedProcessQuery::alive_execs(vec!["/usr/sbin/sshd".to_string()])),
    );
    assert!(!not_crashed.crashed("sshd").unwrap());

    let crashed = MetadataStore::with_process_query(
        paths,
        Box::new(FixedProcessQuery::alive_execs(vec![])),
    );
    assert!(crashed.crashed("sshd").unwrap());
}
