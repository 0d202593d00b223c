//! Integration coverage for the transition driver (component I): a full switch
//! between two runlevels, and plugin (component J) environment contributions
//! reaching a spawned script.

use std::{
    collections::HashMap,
    fs,
    os::unix::fs::PermissionsExt,
    sync::Mutex,
};

use rc_core::{
    depend::{DependencyRecord, DependencyTree},
    paths::Paths,
    plugin::{HookEvent, Plugin, PluginRegistry},
    runlevel::RunlevelRegistry,
    state::{ServiceState, StateStore},
    transition::TransitionDriver,
};
use tempfile::tempdir;

fn make_script(paths: &Paths, name: &str) {
    fs::create_dir_all(&paths.init_dir).unwrap();
    let path = paths.script_path(name);
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

/// A script that appends a line to `counter_path` every time its `start` verb runs,
/// so a test can tell whether it was actually re-invoked.
fn make_counting_script(paths: &Paths, name: &str, counter_path: &std::path::Path) {
    fs::create_dir_all(&paths.init_dir).unwrap();
    let path = paths.script_path(name);
    fs::write(
        &path,
        format!(
            "#!/bin/sh\ncase \"$1\" in\n  start) echo x >> {} ;;\nesac\nexit 0\n",
            counter_path.display()
        ),
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

fn tree_with(pairs: &[(&str, Vec<&str>)]) -> DependencyTree {
    let mut tree = DependencyTree::default();
    for (name, needs) in pairs {
        tree.records.insert(
            name.to_string(),
            DependencyRecord {
                need: needs.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        );
    }
    tree
}

#[test]
fn switching_runlevels_stops_services_the_new_one_no_longer_wants() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    make_script(&paths, "a");
    make_script(&paths, "b");

    let registry = RunlevelRegistry::new(&paths);
    registry.add("single", "a").unwrap();
    registry.add("default", "b").unwrap();

    let tree = tree_with(&[("a", vec![]), ("b", vec![])]);
    let driver = TransitionDriver::new(paths.clone());

    driver.transition_to("single", &tree).unwrap();
    assert_eq!(
        StateStore::new(paths.clone()).get_state("a").unwrap().primary,
        rc_core::state::ServiceState::Started
    );

    let report = driver.transition_to("default", &tree).unwrap();
    assert_eq!(report.stopped.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>(), vec!["a".to_string()]);
    assert_eq!(report.started.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>(), vec!["b".to_string()]);

    let state = StateStore::new(paths);
    assert_eq!(state.get_state("a").unwrap().primary, ServiceState::Stopped);
    assert_eq!(state.get_state("b").unwrap().primary, ServiceState::Started);
}

#[test]
fn a_service_still_wanted_by_the_new_runlevel_is_left_running_untouched() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    let b_runs = temp.path().join("b-runs");
    let c_runs = temp.path().join("c-runs");
    let d_runs = temp.path().join("d-runs");
    make_counting_script(&paths, "b", &b_runs);
    make_counting_script(&paths, "c", &c_runs);
    make_counting_script(&paths, "d", &d_runs);

    let registry = RunlevelRegistry::new(&paths);
    registry.add("default", "b").unwrap();
    registry.add("default", "c").unwrap();
    registry.add("fuller", "b").unwrap();
    registry.add("fuller", "c").unwrap();
    registry.add("fuller", "d").unwrap();

    let tree = tree_with(&[("b", vec![]), ("c", vec![]), ("d", vec![])]);
    let driver = TransitionDriver::new(paths.clone());

    driver.transition_to("default", &tree).unwrap();
    assert_eq!(fs::read_to_string(&b_runs).unwrap().lines().count(), 1);
    assert_eq!(fs::read_to_string(&c_runs).unwrap().lines().count(), 1);

    let report = driver.transition_to("fuller", &tree).unwrap();
    assert_eq!(report.started.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>(), vec!["d".to_string()]);
    assert!(report.stopped.is_empty());

    assert_eq!(fs::read_to_string(&b_runs).unwrap().lines().count(), 1);
    assert_eq!(fs::read_to_string(&c_runs).unwrap().lines().count(), 1);
    assert_eq!(fs::read_to_string(&d_runs).unwrap().lines().count(), 1);

    let state = StateStore::new(paths);
    assert_eq!(state.get_state("b").unwrap().primary, ServiceState::Started);
    assert_eq!(state.get_state("c").unwrap().primary, ServiceState::Started);
    assert_eq!(state.get_state("d").unwrap().primary, ServiceState::Started);
}

/// A plugin that contributes an environment variable on `ServiceStartIn` and records
/// every hook it saw, in order — used to check dispatch ordering and env propagation.
struct RecordingPlugin {
    seen: Mutex<Vec<HookEvent>>,
}

impl Plugin for RecordingPlugin {
    fn hook(
        &self,
        event: HookEvent,
        _service: Option<&str>,
        env: &mut HashMap<String, String>,
    ) -> Result<(), i32> {
        self.seen.lock().unwrap().push(event);
        if event == HookEvent::ServiceStartIn {
            env.insert("RC_PLUGIN_MARK".to_string(), "1".to_string());
        }
        Ok(())
    }
}

#[test]
fn a_plugin_contributed_env_var_reaches_the_spawned_start_script() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    fs::create_dir_all(&paths.init_dir).unwrap();
    let marker_path = temp.path().join("saw-mark");
    let script = paths.script_path("svc");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\nif [ \"$RC_PLUGIN_MARK\" = \"1\" ]; then touch {}; fi\nexit 0\n",
            marker_path.display()
        ),
    )
    .unwrap();
    let mut perms = fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script, perms).unwrap();

    let registry = RunlevelRegistry::new(&paths);
    registry.add("default", "svc").unwrap();

    let mut plugins = PluginRegistry::new();
    plugins.register(Box::new(RecordingPlugin { seen: Mutex::new(Vec::new()) }));

    let driver = TransitionDriver::with_plugins(paths.clone(), plugins);
    let tree = tree_with(&[("svc", vec![])]);
    driver.transition_to("default", &tree).unwrap();

    assert!(marker_path.exists(), "spawned script should have observed the plugin-contributed env var");
}
