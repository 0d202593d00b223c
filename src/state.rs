//! Service state machine and state store (component C).
//!
//! Each service's state is the presence or absence of marker files under the state
//! root, one subdirectory per state (`stopped`, `starting`, `started`, `stopping`,
//! `inactive`, plus the flag directories `failed`, `scheduled`, `was-inactive`,
//! `coldplugged`). This mirrors the reference init system's "filesystem as database"
//! design: atomicity comes from create-exclusive/rename, not from a lock held across
//! a transition.

use std::{thread, time::{Duration, Instant}};

use strum_macros::{AsRefStr, EnumString};
use tracing::trace;

use crate::{
    constants::{WAIT_BACKOFF_CAP, WAIT_BACKOFF_START, WAIT_DEFAULT_TIMEOUT},
    error::RcError,
    paths::{create_marker, marker_exists, remove_marker, Paths},
};

/// A primary run-state or coexisting flag, each backed by its own marker directory.
///
/// Primary states (`Stopped`, `Starting`, `Started`, `Stopping`, `Inactive`) are
/// mutually exclusive at the storage level. Flags (`WasInactive`, `Coldplugged`,
/// `Failed`, `Scheduled`) coexist with whichever primary state is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceState {
    /// No work in progress, not currently running.
    Stopped,
    /// The start script has been spawned but has not yet exited.
    Starting,
    /// The start script exited zero.
    Started,
    /// The stop script has been spawned but has not yet exited.
    Stopping,
    /// The service reported it could not fully start, or self-demoted.
    Inactive,
    /// Flag: the service was `inactive` the last time it was observed.
    WasInactive,
    /// Flag: the service was marked started without being spawned (cold plug).
    Coldplugged,
    /// Flag: the last `start` attempt returned a non-zero exit.
    Failed,
    /// Flag: the service is deferred because a hard `need` is not yet started.
    Scheduled,
}

/// The five primary states, in storage priority order. Exactly one marker from this
/// list should exist for a service at any instant.
pub const PRIMARY_STATES: [ServiceState; 5] = [
    ServiceState::Stopped,
    ServiceState::Starting,
    ServiceState::Started,
    ServiceState::Stopping,
    ServiceState::Inactive,
];

/// The four flags that may coexist with a primary state.
pub const FLAG_STATES: [ServiceState; 4] = [
    ServiceState::WasInactive,
    ServiceState::Coldplugged,
    ServiceState::Failed,
    ServiceState::Scheduled,
];

/// Transitional primary states in which a service is not yet settled (used by `wait_for`).
const TRANSITIONAL: [ServiceState; 3] =
    [ServiceState::Starting, ServiceState::Stopping, ServiceState::Inactive];

impl ServiceState {
    /// Name of the marker directory for this state (kebab-case, e.g. `was-inactive`).
    pub fn marker_dir(&self) -> String {
        self.as_ref().to_string()
    }

    /// True for the five mutually-exclusive primary states.
    pub fn is_primary(&self) -> bool {
        PRIMARY_STATES.contains(self)
    }
}

/// A service's full observed state: one primary state plus whichever flags are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullState {
    /// The single current primary state.
    pub primary: ServiceState,
    /// Flag markers present alongside the primary state.
    pub flags: Flags,
}

/// The flag markers that may coexist with a primary state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// Service was `inactive` the last time it was observed.
    pub was_inactive: bool,
    /// Service was marked started without being spawned.
    pub coldplugged: bool,
    /// Last `start` attempt returned non-zero.
    pub failed: bool,
    /// Deferred waiting on a hard `need`.
    pub scheduled: bool,
}

impl FullState {
    /// A freshly-initialized service: stopped, no flags.
    pub fn settled_stopped() -> Self {
        FullState {
            primary: ServiceState::Stopped,
            flags: Flags::default(),
        }
    }

    /// Whether this service is currently in a transitional (not-yet-settled) primary state.
    pub fn is_transitional(&self) -> bool {
        TRANSITIONAL.contains(&self.primary)
    }
}

/// Persists and queries per-service state markers under a [`Paths`] layout.
pub struct StateStore {
    paths: Paths,
}

impl StateStore {
    /// Builds a state store rooted at `paths`.
    pub fn new(paths: Paths) -> Self {
        StateStore { paths }
    }

    /// Returns the service's current primary state and flags.
    ///
    /// If no primary marker is present, the service is `stopped` — this is a
    /// deliberate default rather than an error, so a never-touched service reads cleanly.
    pub fn get_state(&self, service: &str) -> Result<FullState, RcError> {
        let mut primary = None;
        for state in PRIMARY_STATES {
            if marker_exists(&self.paths.marker_path(service, state)) {
                primary = Some(state);
                break;
            }
        }

        Ok(FullState {
            primary: primary.unwrap_or(ServiceState::Stopped),
            flags: Flags {
                was_inactive: marker_exists(
                    &self.paths.marker_path(service, ServiceState::WasInactive),
                ),
                coldplugged: marker_exists(
                    &self.paths.marker_path(service, ServiceState::Coldplugged),
                ),
                failed: marker_exists(&self.paths.marker_path(service, ServiceState::Failed)),
                scheduled: marker_exists(
                    &self.paths.marker_path(service, ServiceState::Scheduled),
                ),
            },
        })
    }

    /// Marks `service` as being in `state`.
    ///
    /// For a primary state, other primary markers are removed first, so the storage
    /// invariant "exactly one primary marker" holds even if a caller observes an
    /// intermediate filesystem snapshot mid-call. For a flag, only that flag marker is
    /// touched. Transitioning to `Started` or `Stopped` additionally clears the
    /// `failed`, `scheduled`, and `was-inactive` flags.
    pub fn mark(&self, service: &str, state: ServiceState) -> Result<(), RcError> {
        if state.is_primary() {
            for other in PRIMARY_STATES {
                if other != state {
                    remove_marker(&self.paths.marker_path(service, other))?;
                }
            }
            create_marker(&self.paths.marker_path(service, state))?;

            if matches!(state, ServiceState::Started | ServiceState::Stopped) {
                remove_marker(&self.paths.marker_path(service, ServiceState::Failed))?;
                remove_marker(&self.paths.marker_path(service, ServiceState::Scheduled))?;
                remove_marker(&self.paths.marker_path(service, ServiceState::WasInactive))?;
            }
        } else {
            create_marker(&self.paths.marker_path(service, state))?;
        }

        trace!(service, state = %state.as_ref(), "marked service state");
        Ok(())
    }

    /// Clears a single flag without affecting the primary state.
    pub fn clear_flag(&self, service: &str, flag: ServiceState) -> Result<(), RcError> {
        debug_assert!(!flag.is_primary(), "clear_flag called with a primary state");
        remove_marker(&self.paths.marker_path(service, flag))
    }

    /// Lists the names of all services currently marked with `state`.
    pub fn services_in_state(&self, state: ServiceState) -> Result<Vec<String>, RcError> {
        let dir = self.paths.state_dir(state);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RcError::io_marker(&dir, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Blocks until `service` leaves the transitional subset `{starting, stopping,
    /// inactive}`, or `timeout` elapses. Returns whether it settled before the timeout.
    ///
    /// Polls with exponential backoff starting at [`WAIT_BACKOFF_START`], capped at
    /// [`WAIT_BACKOFF_CAP`]; a settled service is detected on the first check with no
    /// sleep at all.
    pub fn wait_for(&self, service: &str, timeout: Option<Duration>) -> Result<bool, RcError> {
        let timeout = timeout.unwrap_or(WAIT_DEFAULT_TIMEOUT);
        let deadline = Instant::now() + timeout;
        let mut backoff = WAIT_BACKOFF_START;

        loop {
            let state = self.get_state(service)?;
            if !state.is_transitional() {
                return Ok(true);
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(backoff.min(remaining));
            backoff = (backoff * 2).min(WAIT_BACKOFF_CAP);
        }
    }
}

impl RcError {
    pub(crate) fn io_marker(path: &std::path::Path, source: std::io::Error) -> RcError {
        RcError::StateStoreError(crate::error::StateStoreError::MarkerIo {
            path: path.display().to_string(),
            source,
        })
    }
}
