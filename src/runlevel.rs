//! Runlevel registry (component E): named collections of service references.
//!
//! Membership is represented the way the reference init system represents it — a
//! symlink from the runlevel directory to the service's script — so membership is
//! simply link presence.

use std::{
    fs,
    io::ErrorKind,
    os::unix::fs::symlink,
};

use tracing::trace;

use crate::{
    error::RcError,
    paths::Paths,
    resolver::Resolver,
};

/// Enumerates and mutates runlevel membership under a [`Paths`] layout.
pub struct RunlevelRegistry<'p> {
    paths: &'p Paths,
}

impl<'p> RunlevelRegistry<'p> {
    /// Builds a registry over `paths`.
    pub fn new(paths: &'p Paths) -> Self {
        RunlevelRegistry { paths }
    }

    /// Lists every known runlevel (subdirectories of the runlevels root).
    pub fn runlevels(&self) -> Result<Vec<String>, RcError> {
        let entries = match fs::read_dir(&self.paths.runlevels_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.paths.runlevels_root, e)),
        };

        let mut levels: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Whether `runlevel` exists at all (has a directory, even if empty).
    pub fn exists(&self, runlevel: &str) -> bool {
        self.paths.runlevel_dir(runlevel).is_dir()
    }

    /// Lists the services in `runlevel` that resolve to a real script, skipping
    /// dangling entries.
    pub fn services_in_runlevel(&self, runlevel: &str) -> Result<Vec<String>, RcError> {
        let dir = self.paths.runlevel_dir(runlevel);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir, e)),
        };

        let resolver = Resolver::new(self.paths);
        let mut services: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| resolver.exists(name))
            .collect();
        services.sort();
        Ok(services)
    }

    /// Adds `service` to `runlevel`, creating the runlevel directory if needed.
    /// Idempotent: adding an already-present service is a no-op.
    pub fn add(&self, runlevel: &str, service: &str) -> Result<(), RcError> {
        let dir = self.paths.runlevel_dir(runlevel);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let link = self.paths.runlevel_membership_path(runlevel, service);
        if link.exists() || link.symlink_metadata().is_ok() {
            trace!(runlevel, service, "already a member, leaving in place");
            return Ok(());
        }

        symlink(self.paths.script_path(service), &link).map_err(|e| io_err(&link, e))?;
        Ok(())
    }

    /// Removes `service` from `runlevel`. Idempotent.
    pub fn delete(&self, runlevel: &str, service: &str) -> Result<(), RcError> {
        let link = self.paths.runlevel_membership_path(runlevel, service);
        match fs::remove_file(&link) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&link, e)),
        }
    }

    /// Whether `service` is a member of `runlevel`.
    pub fn in_runlevel(&self, service: &str, runlevel: &str) -> bool {
        self.paths
            .runlevel_membership_path(runlevel, service)
            .symlink_metadata()
            .is_ok()
    }

    /// Reads the current runlevel name, if one has been set.
    pub fn current_runlevel(&self) -> Result<Option<String>, RcError> {
        match fs::read_to_string(&self.paths.softlevel_file) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.paths.softlevel_file, e)),
        }
    }

    /// Records `name` as the current runlevel. Does **not** trigger a transition —
    /// that is the job of the transition driver (component I).
    pub fn set_runlevel(&self, name: &str) -> Result<(), RcError> {
        if let Some(parent) = self.paths.softlevel_file.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::write(&self.paths.softlevel_file, name).map_err(|e| io_err(&self.paths.softlevel_file, e))
    }
}

fn io_err(path: &std::path::Path, source: std::io::Error) -> RcError {
    RcError::StateStoreError(crate::error::StateStoreError::MarkerIo {
        path: path.display().to_string(),
        source,
    })
}
