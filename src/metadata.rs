//! Per-service metadata store (component D): saved options and daemon-invocation
//! records, plus the passive crash check that compares recorded daemons against
//! live processes through the [`ProcessQuery`] collaborator (component K).

use std::{
    fs,
    io::ErrorKind,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::{RcError, StateStoreError}, paths::Paths, process::ProcessQuery};

/// One recorded daemon invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRecord {
    /// The executable path the service invoked.
    pub exec: String,
    /// Optional process name used to disambiguate multiple instances of `exec`.
    pub name: Option<String>,
    /// Optional PID-file path the daemon is expected to maintain.
    pub pidfile: Option<String>,
    /// Reserved argv signature, set by callers that need finer-grained matching.
    #[serde(default)]
    pub argv_signature: Option<String>,
}

impl DaemonRecord {
    fn matches(&self, exec: &str, name: Option<&str>, pidfile: Option<&str>) -> bool {
        self.exec == exec && self.name.as_deref() == name && self.pidfile.as_deref() == pidfile
    }
}

/// Persists and queries per-service saved options and daemon records.
pub struct MetadataStore {
    paths: Paths,
    process_query: Box<dyn ProcessQuery>,
}

impl MetadataStore {
    /// Builds a metadata store using the default, `sysinfo`-backed process query.
    pub fn new(paths: Paths) -> Self {
        MetadataStore {
            paths,
            process_query: Box::new(crate::process::SystemProcessQuery::default()),
        }
    }

    /// Builds a metadata store with an explicit [`ProcessQuery`] collaborator, e.g. a
    /// fixture in tests.
    pub fn with_process_query(paths: Paths, process_query: Box<dyn ProcessQuery>) -> Self {
        MetadataStore { paths, process_query }
    }

    /// Returns a saved option's value, or `None` if it was never set.
    pub fn get_option(&self, service: &str, key: &str) -> Result<Option<String>, RcError> {
        match fs::read_to_string(self.paths.option_path(service, key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(self.paths.option_path(service, key).as_path(), e)),
        }
    }

    /// Persists a saved option's value, creating the service's option directory as needed.
    pub fn set_option(&self, service: &str, key: &str, value: &str) -> Result<(), RcError> {
        let dir = self.paths.options_dir(service);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let path = self.paths.option_path(service, key);
        fs::write(&path, value).map_err(|e| io_err(&path, e))
    }

    /// Lists the saved option keys for a service.
    pub fn options(&self, service: &str) -> Result<Vec<String>, RcError> {
        list_dir_names(&self.paths.options_dir(service))
    }

    /// Appends a new daemon-invocation record, returning its 1-based index.
    ///
    /// Daemon records are meant to be cleared at the start of each `start` invocation
    /// via [`MetadataStore::clear_daemons`] and then re-populated during it.
    pub fn add_daemon(
        &self,
        service: &str,
        exec: &str,
        name: Option<&str>,
        pidfile: Option<&str>,
    ) -> Result<usize, RcError> {
        let dir = self.paths.daemons_dir(service);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let next_index = self
            .daemon_indices(service)?
            .into_iter()
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);

        let record = DaemonRecord {
            exec: exec.to_string(),
            name: name.map(str::to_string),
            pidfile: pidfile.map(str::to_string),
            argv_signature: None,
        };
        let path = self.paths.daemon_path(service, next_index);
        let encoded = serde_json::to_string(&record)?;
        fs::write(&path, encoded).map_err(|e| io_err(&path, e))?;
        Ok(next_index)
    }

    /// Removes the daemon record matching `(exec, name, pidfile)` exactly, if any.
    /// Returns whether a record was removed.
    pub fn remove_daemon(
        &self,
        service: &str,
        exec: &str,
        name: Option<&str>,
        pidfile: Option<&str>,
    ) -> Result<bool, RcError> {
        for index in self.daemon_indices(service)? {
            let path = self.paths.daemon_path(service, index);
            let record = self.read_daemon(&path)?;
            if record.matches(exec, name, pidfile) {
                fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Clears every daemon record for a service. Called before spawning `start`.
    pub fn clear_daemons(&self, service: &str) -> Result<(), RcError> {
        let dir = self.paths.daemons_dir(service);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&dir, e)),
        }
    }

    /// Whether `service` recorded starting `exec`. `index == 0` means "any index".
    pub fn started_daemon(
        &self,
        service: &str,
        exec: &str,
        index: usize,
    ) -> Result<bool, RcError> {
        if index == 0 {
            for idx in self.daemon_indices(service)? {
                if self.read_daemon(&self.paths.daemon_path(service, idx))?.exec == exec {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        let path = self.paths.daemon_path(service, index);
        match fs::read(&path) {
            Ok(_) => Ok(self.read_daemon(&path)?.exec == exec),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    /// True iff any daemon recorded for `service` has no live process backing it,
    /// per the external [`ProcessQuery`] collaborator (component K).
    pub fn crashed(&self, service: &str) -> Result<bool, RcError> {
        for index in self.daemon_indices(service)? {
            let record = self.read_daemon(&self.paths.daemon_path(service, index))?;
            let alive = self.process_query.is_alive(
                &record.exec,
                record.name.as_deref(),
                record.pidfile.as_deref(),
            );
            if !alive {
                debug!(service, exec = %record.exec, "daemon record has no live process");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn daemon_indices(&self, service: &str) -> Result<Vec<usize>, RcError> {
        let mut indices: Vec<usize> = list_dir_names(&self.paths.daemons_dir(service))?
            .into_iter()
            .filter_map(|name| name.parse::<usize>().ok())
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    fn read_daemon(&self, path: &Path) -> Result<DaemonRecord, RcError> {
        let content = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn list_dir_names(dir: &Path) -> Result<Vec<String>, RcError> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(io_err(dir, e)),
    }
}

fn io_err(path: &Path, source: std::io::Error) -> RcError {
    RcError::StateStoreError(StateStoreError::MarkerIo {
        path: path.display().to_string(),
        source,
    })
}
