//! Integration coverage for the state store (component C) as the rest of the crate
//! actually uses it: markers surviving across independent `StateStore` instances
//! rooted at the same directory, the way two separate `rcctl` invocations would see
//! each other's state.

use std::time::Duration;

use rc_core::{
    paths::Paths,
    state::{ServiceState, StateStore},
};
use tempfile::tempdir;

#[test]
fn state_set_by_one_store_instance_is_visible_to_another() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());

    StateStore::new(paths.clone()).mark("sshd", ServiceState::Started).unwrap();

    let reader = StateStore::new(paths);
    assert_eq!(reader.get_state("sshd").unwrap().primary, ServiceState::Started);
}

#[test]
fn a_failed_service_still_settles_to_stopped_and_is_listed_both_ways() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    let store = StateStore::new(paths);

    store.mark("httpd", ServiceState::Starting).unwrap();
    store.mark("httpd", ServiceState::Failed).unwrap();
    store.mark("httpd", ServiceState::Stopped).unwrap();

    let state = store.get_state("httpd").unwrap();
    assert_eq!(state.primary, ServiceState::Stopped);
    // `Stopped` clears `failed`, so a settled-after-failure service reads clean
    // rather than carrying a stale flag forward.
    assert!(!state.flags.failed);
    assert!(store.services_in_state(ServiceState::Stopped).unwrap().contains(&"httpd".to_string()));
}

#[test]
fn wait_for_observes_a_state_change_made_by_a_concurrent_thread() {
    let temp = tempdir().unwrap();
    let paths = Paths::rooted_at(temp.path());
    let store = StateStore::new(paths.clone());
    store.mark("ntpd", ServiceState::Starting).unwrap();

    let writer_paths = paths.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        StateStore::new(writer_paths).mark("ntpd", ServiceState::Started).unwrap();
    });

    assert!(store.wait_for("ntpd", Some(Duration::from_secs(2))).unwrap());
    handle.join().unwrap();
    assert_eq!(store.get_state("ntpd").unwrap().primary, ServiceState::Started);
}
