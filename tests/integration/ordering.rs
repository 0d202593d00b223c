//! End-to-end check of the dependency parser/cache (component F) feeding the graph
//! and ordering engine (component G) against real shell script fixtures.

use std::{fs, os::unix::fs::PermissionsExt};

use rc_core::{
    depend::{order, DependencyParser, Direction, OrderOptions},
    paths::Paths,
    runlevel::RunlevelRegistry,
};
use tempfile::tempdir;

fn make_script(paths: &Paths, name: &str, depend_lines: &[&str]) {
    fs::create_dir_all(&paths.init_dir).unwrap();
    let path = paths.script_path(name);
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

#[test]
fn a_runlevel_of_scripts_is_ordered_by_their_declared_needs() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());

    make_script(&paths, "net-eth0", &["provide net"]);
    make_script(&paths, "dhcpcd", &["need net"]);
    make_script(&paths, "sshd", &["need dhcpcd"]);

    let registry = RunlevelRegistry::new(&paths);
    registry.add("default", "net-eth0").unwrap();
    registry.add("default", "dhcpcd").unwrap();
    registry.add("default", "sshd").unwrap();

    let parser = DependencyParser::new(&paths);
    let tree = parser.load().unwrap();

    let seeds = registry.services_in_runlevel("default").unwrap();
    let start_order = order(&tree, &seeds, Direction::Start, OrderOptions::default());

    let pos = |name: &str| start_order.iter().position(|s| s == name).unwrap();
    assert!(pos("net-eth0") < pos("dhcpcd"));
    assert!(pos("dhcpcd") < pos("sshd"));

    let stop_order = order(&tree, &seeds, Direction::Stop, OrderOptions::default());
    assert_eq!(stop_order, start_order.into_iter().rev().collect::<Vec<_>>());
}

#[test]
fn an_unseeded_provider_of_the_same_virtual_is_not_pulled_into_the_order() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());

    make_script(&paths, "net-eth0", &["provide net"]);
    make_script(&paths, "net-wifi0", &["provide net"]);
    make_script(&paths, "sshd", &["need net"]);

    let registry = RunlevelRegistry::new(&paths);
    registry.add("default", "net-eth0").unwrap();
    registry.add("default", "sshd").unwrap();

    let parser = DependencyParser::new(&paths);
    let tree = parser.load().unwrap();

    let seeds = registry.services_in_runlevel("default").unwrap();
    let start_order = order(&tree, &seeds, Direction::Start, OrderOptions::default());

    let mut sorted = start_order.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["net-eth0".to_string(), "sshd".to_string()]);
}

#[test]
fn cache_survives_a_process_restart_without_rescanning_scripts() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "a", &[]);

    {
        let parser = DependencyParser::new(&paths);
        assert!(parser.update(false).unwrap());
    }

    // A fresh parser instance (simulating a new process) should see the cache as
    // already fresh and not need to invoke any scripts.
    let parser = DependencyParser::new(&paths);
    assert!(!parser.update(false).unwrap());
    let tree = parser.load().unwrap();
    assert!(tree.is_service("a"));
}
