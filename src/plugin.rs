//! Plugin registry (component J): the hook points the transition driver calls out to
//! around each runlevel and service lifecycle step, plus the environment
//! contributions plugins may fold into subsequently spawned scripts.

use std::collections::HashMap;

use tracing::{debug, warn};

/// A point in the runlevel/service lifecycle a plugin may observe or veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before any service in the target runlevel is stopped.
    RunlevelStopIn,
    /// After every service in the target runlevel has been stopped.
    RunlevelStopOut,
    /// Before any service in the target runlevel is started.
    RunlevelStartIn,
    /// After every service in the target runlevel has been started.
    RunlevelStartOut,
    /// Immediately before a single service's start script is spawned.
    ServiceStartIn,
    /// Immediately after a single service's start script is spawned, before it exits.
    ServiceStartNow,
    /// After a single service's start script has exited.
    ServiceStartDone,
    /// After the state store has recorded the service's start outcome.
    ServiceStartOut,
    /// Immediately before a single service's stop script is spawned.
    ServiceStopIn,
    /// Immediately after a single service's stop script is spawned, before it exits.
    ServiceStopNow,
    /// After a single service's stop script has exited.
    ServiceStopDone,
    /// After the state store has recorded the service's stop outcome.
    ServiceStopOut,
}

/// A subscriber to lifecycle [`HookEvent`]s.
///
/// A plugin may contribute environment variables for the scripts spawned after its
/// hook runs by inserting into `env`. Returning `Err` with a non-zero code vetoes the
/// hook: it is logged and otherwise ignored, the same as a `-1` exit from a hook
/// script. Dispatch continues to the remaining plugins and the transition proceeds.
pub trait Plugin: Send + Sync {
    /// Handles `event` for `service` (absent for runlevel-scoped events).
    fn hook(
        &self,
        event: HookEvent,
        service: Option<&str>,
        env: &mut HashMap<String, String>,
    ) -> Result<(), i32>;
}

/// Dispatches lifecycle events to registered plugins, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    /// Builds an empty registry.
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    /// Registers a plugin. Later registrations run after earlier ones for the same event.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Runs every registered plugin for `event`, accumulating environment
    /// contributions. A vetoing plugin is logged and skipped; dispatch continues to
    /// the remaining plugins rather than aborting.
    pub fn dispatch(&self, event: HookEvent, service: Option<&str>) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for plugin in &self.plugins {
            if let Err(code) = plugin.hook(event, service, &mut env) {
                warn!(?event, service, code, "plugin vetoed hook, ignoring");
            }
        }
        debug!(?event, service, contributions = env.len(), "dispatched hook");
        env
    }
}
