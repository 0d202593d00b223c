//! Process query collaborator (component K).
//!
//! Crash detection needs to ask "is there a live process behind this recorded daemon".
//! Discovering PIDs from `/proc` or the process table is an external collaborator the
//! core does not own; this module is the narrow trait boundary that makes that
//! collaborator swappable, with a default implementation so the crate is runnable
//! standalone.

use std::fs;

use nix::{sys::signal, unistd::Pid};
use sysinfo::System;

/// Asks whether a recorded daemon invocation is currently backed by a live process.
pub trait ProcessQuery: Send + Sync {
    /// Returns true if some live process matches the given `exec`/`name`/`pidfile`.
    ///
    /// Implementations are free to use whichever of the three fields are most
    /// reliable; the pidfile, when present, is authoritative.
    fn is_alive(&self, exec: &str, name: Option<&str>, pidfile: Option<&str>) -> bool;
}

/// Default [`ProcessQuery`] backed by the host process table (`sysinfo`), with a
/// pidfile-driven signal-0 liveness probe preferred when a pidfile is recorded.
#[derive(Default)]
pub struct SystemProcessQuery;

impl ProcessQuery for SystemProcessQuery {
    fn is_alive(&self, exec: &str, name: Option<&str>, pidfile: Option<&str>) -> bool {
        if let Some(pidfile) = pidfile
            && let Some(pid) = read_pidfile(pidfile)
        {
            return pid_is_alive(pid);
        }

        let mut system = System::new();
        system.refresh_all();
        system.processes().values().any(|process| {
            let exec_matches = process
                .exe()
                .map(|path| path.to_string_lossy() == exec)
                .unwrap_or(false);
            let name_matches = name.is_none_or(|n| process.name().to_string_lossy() == n);
            exec_matches && name_matches
        })
    }
}

fn read_pidfile(path: &str) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn pid_is_alive(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Test fixture: a fixed set of "alive" executables, independent of the real process table.
#[derive(Default)]
pub struct FixedProcessQuery {
    alive_execs: Vec<String>,
}

impl FixedProcessQuery {
    /// Builds a fixture that reports the given `exec` paths as alive and nothing else.
    pub fn alive_execs(alive_execs: Vec<String>) -> Self {
        FixedProcessQuery { alive_execs }
    }
}

impl ProcessQuery for FixedProcessQuery {
    fn is_alive(&self, exec: &str, _name: Option<&str>, _pidfile: Option<&str>) -> bool {
        self.alive_execs.iter().any(|e| e == exec)
    }
}
