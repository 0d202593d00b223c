//! Service executor (component H): spawns a resolved script with a lifecycle verb
//! and folds its exit status back into the state store.
//!
//! The executor owns no concurrency of its own — spawning and waiting happen inline,
//! on the caller's thread. The transition driver (component I) is what runs several
//! of these concurrently for independent services.

use std::{collections::HashMap, process::{Command, ExitStatus}};

use tracing::{info, warn};

use crate::{
    constants::{VERB_START, VERB_STATUS, VERB_STOP},
    error::RcError,
    metadata::MetadataStore,
    paths::Paths,
    resolver::Resolver,
    state::{ServiceState, StateStore},
};

/// Outcome of a single `start`/`stop` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The script exited zero.
    Success,
    /// The script exited non-zero, or could not be waited on cleanly.
    Failed {
        /// The process exit code, when one was available.
        exit_code: Option<i32>,
    },
}

impl ExecOutcome {
    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Success)
    }
}

/// Runs lifecycle scripts for services and records the resulting state.
pub struct Executor {
    paths: Paths,
    state: StateStore,
    metadata: MetadataStore,
}

impl Executor {
    /// Builds an executor over `paths`.
    pub fn new(paths: Paths) -> Self {
        Executor {
            state: StateStore::new(paths.clone()),
            metadata: MetadataStore::new(paths.clone()),
            paths,
        }
    }

    /// Starts `service`: clears its `scheduled` flag and daemon records, marks it
    /// `starting`, spawns the script with the start verb, and marks the outcome.
    ///
    /// A non-zero exit settles the service back to `stopped` with `failed` set —
    /// it does not leave the service stuck `starting` — unless the script itself
    /// demoted it to `inactive` before exiting, in which case that primary state is
    /// left alone. The `scheduled` flag is cleared unconditionally before the
    /// attempt, whatever the attempt's outcome turns out to be, so a service
    /// deferred behind an unmet `need` does not stay marked `scheduled` forever once
    /// it is finally retried.
    pub fn start(&self, service: &str) -> Result<ExecOutcome, RcError> {
        self.start_with_env(service, &HashMap::new())
    }

    /// Same as [`Executor::start`], but folds `env` into the spawned script's
    /// environment — used by the transition driver to pass through plugin
    /// contributions (component J).
    pub fn start_with_env(
        &self,
        service: &str,
        env: &HashMap<String, String>,
    ) -> Result<ExecOutcome, RcError> {
        let script = self.resolve(service)?;

        self.state.clear_flag(service, ServiceState::Scheduled)?;
        self.metadata.clear_daemons(service)?;
        self.state.mark(service, ServiceState::Starting)?;

        let status = self.spawn(service, &script, VERB_START, env).map_err(|source| {
            RcError::ServiceStartError {
                service: service.to_string(),
                source,
            }
        });

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.settle_failure(service)?;
                return Err(e);
            }
        };

        if status.success() {
            self.state.mark(service, ServiceState::Started)?;
            info!(service, "service started");
            Ok(ExecOutcome::Success)
        } else {
            self.settle_failure(service)?;
            warn!(service, code = ?status.code(), "start script exited non-zero");
            Ok(ExecOutcome::Failed { exit_code: status.code() })
        }
    }

    /// Stops `service`: marks it `stopping`, spawns the script with the stop verb,
    /// and settles it back to `stopped` regardless of outcome — a stop that itself
    /// fails still leaves nothing running to retry against, so `failed` is recorded
    /// but the service is not left `stopping` forever.
    pub fn stop(&self, service: &str) -> Result<ExecOutcome, RcError> {
        self.stop_with_env(service, &HashMap::new())
    }

    /// Same as [`Executor::stop`], but folds `env` into the spawned script's
    /// environment.
    pub fn stop_with_env(
        &self,
        service: &str,
        env: &HashMap<String, String>,
    ) -> Result<ExecOutcome, RcError> {
        let script = self.resolve(service)?;

        self.state.mark(service, ServiceState::Stopping)?;

        let status = self.spawn(service, &script, VERB_STOP, env).map_err(|source| {
            RcError::ServiceStopError {
                service: service.to_string(),
                source,
            }
        });

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.state.mark(service, ServiceState::Stopped)?;
                self.state.mark(service, ServiceState::Failed)?;
                return Err(e);
            }
        };

        self.state.mark(service, ServiceState::Stopped)?;
        if status.success() {
            info!(service, "service stopped");
            Ok(ExecOutcome::Success)
        } else {
            self.state.mark(service, ServiceState::Failed)?;
            warn!(service, code = ?status.code(), "stop script exited non-zero");
            Ok(ExecOutcome::Failed { exit_code: status.code() })
        }
    }

    /// Invokes the script's status verb without touching any stored state. Primarily
    /// a diagnostic surface for the CLI driver.
    pub fn status(&self, service: &str) -> Result<ExecOutcome, RcError> {
        let script = self.resolve(service)?;
        let status = self.spawn(service, &script, VERB_STATUS, &HashMap::new()).map_err(|source| {
            RcError::ServiceStartError {
                service: service.to_string(),
                source,
            }
        })?;

        if status.success() {
            Ok(ExecOutcome::Success)
        } else {
            Ok(ExecOutcome::Failed { exit_code: status.code() })
        }
    }

    /// Settles a service after a failed start attempt. A script that demoted itself
    /// to `inactive` before exiting non-zero is left `inactive`; any other primary
    /// state settles to `stopped`. `failed` is set either way.
    fn settle_failure(&self, service: &str) -> Result<(), RcError> {
        if self.state.get_state(service)?.primary != ServiceState::Inactive {
            self.state.mark(service, ServiceState::Stopped)?;
        }
        self.state.mark(service, ServiceState::Failed)
    }

    fn resolve(&self, service: &str) -> Result<std::path::PathBuf, RcError> {
        Resolver::new(&self.paths)
            .resolve(service)
            .ok_or_else(|| RcError::UnknownService(service.to_string()))
    }

    fn spawn(
        &self,
        service: &str,
        script: &std::path::Path,
        verb: &str,
        env: &HashMap<String, String>,
    ) -> std::io::Result<ExitStatus> {
        tracing::trace!(service, verb, script = %script.display(), "spawning service script");
        Command::new(script).arg(verb).envs(env).status()
    }
}
