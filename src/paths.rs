//! Path & FS layer (component A).
//!
//! Canonical locations for init scripts, runlevels, state markers and metadata, plus
//! the small set of atomic filesystem primitives the rest of the crate builds on.
//!
//! Deliberately an explicit, constructed value rather than process-global state (see
//! the Design Notes' open question on `rc_environ_fd`/global context): callers thread
//! a [`Paths`] through every component that needs it, which also lets tests stand up
//! independent roots under a `tempfile` directory without touching the real filesystem.

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    thread,
};

use tracing::{trace, warn};

use crate::{
    constants::{
        DAEMONS_SUBDIR, DEFAULT_DEPTREE_CACHE, DEFAULT_INIT_DIR, DEFAULT_RUNLEVELS_ROOT,
        DEFAULT_SOFTLEVEL_FILE, DEFAULT_STATE_ROOT, OPTIONS_SUBDIR, TRANSIENT_IO_BACKOFF,
        TRANSIENT_IO_RETRIES,
    },
    error::{RcError, StateStoreError},
    state::ServiceState,
};

/// Canonical filesystem layout for one init-system instance.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Directory containing init scripts (`/etc/init.d` by default).
    pub init_dir: PathBuf,
    /// Root directory containing one subdirectory per runlevel.
    pub runlevels_root: PathBuf,
    /// Root directory for state markers, options, and daemon records.
    pub state_root: PathBuf,
    /// Path to the serialized dependency cache.
    pub deptree_cache: PathBuf,
    /// Path to the current-runlevel marker file.
    pub softlevel_file: PathBuf,
}

impl Default for Paths {
    /// Normative system defaults.
    fn default() -> Self {
        Paths {
            init_dir: PathBuf::from(DEFAULT_INIT_DIR),
            runlevels_root: PathBuf::from(DEFAULT_RUNLEVELS_ROOT),
            state_root: PathBuf::from(DEFAULT_STATE_ROOT),
            deptree_cache: PathBuf::from(DEFAULT_DEPTREE_CACHE),
            softlevel_file: PathBuf::from(DEFAULT_SOFTLEVEL_FILE),
        }
    }
}

impl Paths {
    /// Builds a layout rooted entirely under `root` — the shape every integration test
    /// and the `user` runtime mode use.
    pub fn rooted_at(root: &Path) -> Self {
        Paths {
            init_dir: root.join("init.d"),
            runlevels_root: root.join("runlevels"),
            state_root: root.join("state"),
            deptree_cache: root.join("state").join("deptree"),
            softlevel_file: root.join("state").join("softlevel"),
        }
    }

    /// Absolute path of the script for `name` (component B relies on this).
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.init_dir.join(name)
    }

    /// Directory holding markers for a given state.
    pub fn state_dir(&self, state: ServiceState) -> PathBuf {
        self.state_root.join(state.marker_dir())
    }

    /// Canonical marker path for `(service, state)`.
    pub fn marker_path(&self, service: &str, state: ServiceState) -> PathBuf {
        self.state_dir(state).join(service)
    }

    /// Directory for one runlevel's membership symlinks/entries.
    pub fn runlevel_dir(&self, runlevel: &str) -> PathBuf {
        self.runlevels_root.join(runlevel)
    }

    /// Canonical membership path for `(runlevel, service)`.
    pub fn runlevel_membership_path(&self, runlevel: &str, service: &str) -> PathBuf {
        self.runlevel_dir(runlevel).join(service)
    }

    /// Directory of saved options for a service.
    pub fn options_dir(&self, service: &str) -> PathBuf {
        self.state_root.join(OPTIONS_SUBDIR).join(service)
    }

    /// Canonical option path for `(service, key)`.
    pub fn option_path(&self, service: &str, key: &str) -> PathBuf {
        self.options_dir(service).join(key)
    }

    /// Directory of daemon-invocation records for a service.
    pub fn daemons_dir(&self, service: &str) -> PathBuf {
        self.state_root.join(DAEMONS_SUBDIR).join(service)
    }

    /// Canonical daemon-record path for `(service, 1-based index)`.
    pub fn daemon_path(&self, service: &str, index: usize) -> PathBuf {
        self.daemons_dir(service).join(index.to_string())
    }

    /// Ensures every directory this layout depends on exists.
    pub fn ensure_dirs(&self) -> Result<(), RcError> {
        for dir in [
            &self.init_dir,
            &self.runlevels_root,
            &self.state_root,
            self.deptree_cache.parent().unwrap_or(&self.state_root).to_path_buf().as_path(),
        ] {
            create_dir_all_retrying(dir)?;
        }
        Ok(())
    }
}

/// Creates a marker file exclusively. A race where another process created the same
/// marker first is treated as success (idempotent).
pub fn create_marker(path: &Path) -> Result<(), RcError> {
    if let Some(parent) = path.parent() {
        create_dir_all_retrying(parent)?;
    }
    with_retry(path, || {
        match fs::OpenOptions::new().create_new(true).write(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                trace!(path = %path.display(), "marker already present, treating as success");
                Ok(())
            }
            Err(e) => Err(e),
        }
    })
}

/// Removes a marker file. Idempotent: removing an absent marker is success.
pub fn remove_marker(path: &Path) -> Result<(), RcError> {
    with_retry(path, || match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    })
}

/// Returns whether a marker file is present.
pub fn marker_exists(path: &Path) -> bool {
    path.is_file()
}

fn create_dir_all_retrying(dir: &Path) -> Result<(), RcError> {
    with_retry(dir, || fs::create_dir_all(dir))
}

/// Retries a transient filesystem operation up to [`TRANSIENT_IO_RETRIES`] times with
/// [`TRANSIENT_IO_BACKOFF`] between attempts. Permission errors are never retried:
/// they are fatal.
fn with_retry<F>(path: &Path, mut op: F) -> Result<(), RcError>
where
    F: FnMut() -> io::Result<()>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(RcError::StateStoreError(StateStoreError::PermissionDenied(
                    path.display().to_string(),
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound && attempt == 0 => {
                return Err(RcError::StateStoreError(StateStoreError::MissingDirectory(
                    path.display().to_string(),
                )));
            }
            Err(e) => {
                attempt += 1;
                if attempt >= TRANSIENT_IO_RETRIES {
                    return Err(RcError::StateStoreError(StateStoreError::MarkerIo {
                        path: path.display().to_string(),
                        source: e,
                    }));
                }
                warn!(path = %path.display(), attempt, "transient I/O error, retrying");
                thread::sleep(TRANSIENT_IO_BACKOFF);
            }
        }
    }
}
