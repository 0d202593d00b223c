//! Runlevel transition driver (component I): the top-level algorithm that takes a
//! system from its current runlevel to a target one — stopping what the target no
//! longer needs, then starting what it newly requires, dispatching plugin hooks
//! around each step.

use std::{collections::HashSet, sync::Arc, thread};

use tracing::{info, warn};

use crate::{
    constants::{LEVEL_BOOT, LEVEL_SYSINIT},
    depend::{order, Direction, DependencyTree, OrderOptions},
    error::RcError,
    exec::{ExecOutcome, Executor},
    paths::Paths,
    plugin::{HookEvent, PluginRegistry},
    runlevel::RunlevelRegistry,
    state::{ServiceState, StateStore},
};

/// What happened to one service during a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// The service was started or stopped successfully.
    Settled(ExecOutcome),
    /// The service was deferred: a hard `need` has not started yet.
    Scheduled,
}

/// A full account of one `transition_to` call, in execution order.
#[derive(Debug, Clone, Default)]
pub struct TransitionReport {
    /// Services stopped, in the order they were stopped.
    pub stopped: Vec<(String, ServiceOutcome)>,
    /// Services started, in the order they were started.
    pub started: Vec<(String, ServiceOutcome)>,
}

/// Drives the system from its current runlevel to a target one.
pub struct TransitionDriver {
    paths: Paths,
    state: StateStore,
    executor: Executor,
    plugins: PluginRegistry,
}

impl TransitionDriver {
    /// Builds a driver with no registered plugins.
    pub fn new(paths: Paths) -> Self {
        TransitionDriver {
            state: StateStore::new(paths.clone()),
            executor: Executor::new(paths.clone()),
            plugins: PluginRegistry::new(),
            paths,
        }
    }

    /// Builds a driver with an explicit plugin registry.
    pub fn with_plugins(paths: Paths, plugins: PluginRegistry) -> Self {
        TransitionDriver {
            state: StateStore::new(paths.clone()),
            executor: Executor::new(paths.clone()),
            plugins,
            paths,
        }
    }

    /// Transitions the system to `runlevel`, using `tree` for ordering.
    ///
    /// Steps: `stop_in` hook; stop every currently-relevant service the target
    /// runlevel no longer needs, in dependent-before-dependency order; `stop_out`
    /// hook; record the new current runlevel; `start_in` hook; start every service
    /// the target runlevel needs that is not already `Started` (a still-wanted,
    /// already-running service is left untouched), in dependency-before-dependent
    /// order, deferring (`scheduled`) any whose hard `need` has not itself started;
    /// `start_out` hook.
    pub fn transition_to(
        &self,
        runlevel: &str,
        tree: &DependencyTree,
    ) -> Result<TransitionReport, RcError> {
        let registry = RunlevelRegistry::new(&self.paths);
        if !registry.exists(runlevel) {
            return Err(RcError::UnknownRunlevel(runlevel.to_string()));
        }

        let mut report = TransitionReport::default();

        let new_seeds = self.seed_set(&registry, runlevel)?;
        let full_order = order(tree, &new_seeds, Direction::Start, OrderOptions::default());
        let to_start_set: HashSet<&str> = full_order.iter().map(String::as_str).collect();

        let old_runlevel = registry.current_runlevel()?;
        let to_stop = self.compute_stop_set(&registry, old_runlevel.as_deref(), tree, &to_start_set)?;

        self.plugins.dispatch(HookEvent::RunlevelStopIn, None);
        for service in &to_stop {
            let outcome = self.stop_one(service)?;
            report.stopped.push((service.clone(), outcome));
        }
        self.plugins.dispatch(HookEvent::RunlevelStopOut, None);

        registry.set_runlevel(runlevel)?;

        // Services already running and still wanted are left untouched: only the
        // part of the order not yet settled into `Started` is (re)started.
        let mut to_start = Vec::with_capacity(full_order.len());
        for service in full_order {
            if self.state.get_state(&service)?.primary != ServiceState::Started {
                to_start.push(service);
            }
        }

        self.plugins.dispatch(HookEvent::RunlevelStartIn, None);
        for service in &to_start {
            let outcome = self.start_one(tree, service)?;
            report.started.push((service.clone(), outcome));
        }
        self.plugins.dispatch(HookEvent::RunlevelStartOut, None);

        info!(runlevel, stopped = report.stopped.len(), started = report.started.len(), "transition complete");
        Ok(report)
    }

    /// Runs independent services (no edge between them in `tree`) within a single
    /// rank concurrently, bounded by `max_parallel`. A simple generalization of
    /// `transition_to`'s otherwise strictly sequential start loop, for runlevels with
    /// many leaf services that do not depend on each other.
    pub fn start_concurrent(
        self: &Arc<Self>,
        tree: &DependencyTree,
        services: &[String],
        max_parallel: usize,
    ) -> Vec<(String, Result<ServiceOutcome, RcError>)> {
        let mut results = Vec::with_capacity(services.len());
        for chunk in services.chunks(max_parallel.max(1)) {
            let handles: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|service| {
                    let driver = Arc::clone(self);
                    let tree = tree.clone();
                    thread::spawn(move || {
                        let outcome = driver.start_one(&tree, &service);
                        (service, outcome)
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(_) => warn!("a concurrent start thread panicked"),
                }
            }
        }
        results
    }

    fn seed_set(&self, registry: &RunlevelRegistry, runlevel: &str) -> Result<Vec<String>, RcError> {
        let mut seeds = Vec::new();
        let mut seen = HashSet::new();

        for implicit in [LEVEL_SYSINIT, LEVEL_BOOT] {
            if registry.exists(implicit) {
                for service in registry.services_in_runlevel(implicit)? {
                    if seen.insert(service.clone()) {
                        seeds.push(service);
                    }
                }
            }
        }
        for service in registry.services_in_runlevel(runlevel)? {
            if seen.insert(service.clone()) {
                seeds.push(service);
            }
        }
        Ok(seeds)
    }

    fn compute_stop_set(
        &self,
        registry: &RunlevelRegistry,
        old_runlevel: Option<&str>,
        tree: &DependencyTree,
        to_start_set: &HashSet<&str>,
    ) -> Result<Vec<String>, RcError> {
        let Some(old_runlevel) = old_runlevel else {
            return Ok(Vec::new());
        };

        let old_seeds = self.seed_set(registry, old_runlevel)?;
        let old_order = order(tree, &old_seeds, Direction::Start, OrderOptions::default());

        Ok(old_order
            .into_iter()
            .filter(|service| !to_start_set.contains(service.as_str()))
            .rev()
            .collect())
    }

    fn stop_one(&self, service: &str) -> Result<ServiceOutcome, RcError> {
        let env = self.plugins.dispatch(HookEvent::ServiceStopIn, Some(service));
        self.plugins.dispatch(HookEvent::ServiceStopNow, Some(service));
        let outcome = self.executor.stop_with_env(service, &env)?;
        self.plugins.dispatch(HookEvent::ServiceStopDone, Some(service));
        self.plugins.dispatch(HookEvent::ServiceStopOut, Some(service));
        Ok(ServiceOutcome::Settled(outcome))
    }

    fn start_one(&self, tree: &DependencyTree, service: &str) -> Result<ServiceOutcome, RcError> {
        if let Some(unmet) = self.unmet_need(tree, service)? {
            warn!(service, blocking_on = unmet, "deferring service, hard need not yet started");
            self.state.mark(service, ServiceState::Scheduled)?;
            return Ok(ServiceOutcome::Scheduled);
        }

        let env = self.plugins.dispatch(HookEvent::ServiceStartIn, Some(service));
        self.plugins.dispatch(HookEvent::ServiceStartNow, Some(service));
        let outcome = self.executor.start_with_env(service, &env)?;
        self.plugins.dispatch(HookEvent::ServiceStartDone, Some(service));
        self.plugins.dispatch(HookEvent::ServiceStartOut, Some(service));
        Ok(ServiceOutcome::Settled(outcome))
    }

    /// Returns the name of an unmet hard `need`, if any, resolving virtuals against
    /// `tree`'s provider map.
    fn unmet_need(&self, tree: &DependencyTree, service: &str) -> Result<Option<String>, RcError> {
        let Some(record) = tree.record(service) else {
            return Ok(None);
        };

        for need in &record.need {
            let candidates = if tree.is_service(need) {
                vec![need.clone()]
            } else {
                tree.providers.get(need).cloned().unwrap_or_default()
            };

            if candidates.is_empty() {
                return Ok(Some(need.clone()));
            }

            let any_started = candidates
                .iter()
                .map(|candidate| self.state.get_state(candidate))
                .collect::<Result<Vec<_>, _>>()?
                .iter()
                .any(|state| state.primary == ServiceState::Started);

            if !any_started {
                return Ok(Some(need.clone()));
            }
        }

        Ok(None)
    }
}
