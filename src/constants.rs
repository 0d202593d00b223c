//! Constants and default values used throughout the init-system core.
//!
//! This module centralizes magic numbers, default paths, and reserved names so the
//! rest of the crate reads them from one place instead of re-deriving them.

use std::time::Duration;

// ============================================================================
// Reserved runlevels
// ============================================================================

/// Services in this runlevel are started before any regular runlevel and are
/// always part of the implicit seed set.
pub const LEVEL_SYSINIT: &str = "sysinit";

/// Single-user runlevel.
pub const LEVEL_SINGLE: &str = "single";

/// Runlevel entered on shutdown.
pub const LEVEL_SHUTDOWN: &str = "shutdown";

/// Runlevel entered on reboot.
pub const LEVEL_REBOOT: &str = "reboot";

/// Implicit runlevel considered alongside `sysinit` when seeding an ordering.
pub const LEVEL_BOOT: &str = "boot";

/// The four reserved runlevel names.
pub const RESERVED_LEVELS: [&str; 4] =
    [LEVEL_SYSINIT, LEVEL_SINGLE, LEVEL_SHUTDOWN, LEVEL_REBOOT];

// ============================================================================
// Default on-disk layout
// ============================================================================

/// Default directory containing init scripts.
pub const DEFAULT_INIT_DIR: &str = "/etc/init.d";

/// Default root directory containing one subdirectory per runlevel.
pub const DEFAULT_RUNLEVELS_ROOT: &str = "/etc/runlevels";

/// Default root directory for state markers, options, and daemon records.
pub const DEFAULT_STATE_ROOT: &str = "/var/lib/rc";

/// Default path to the serialized dependency cache.
pub const DEFAULT_DEPTREE_CACHE: &str = "/var/lib/rc/deptree";

/// Default path to the current-runlevel marker file.
pub const DEFAULT_SOFTLEVEL_FILE: &str = "/var/lib/rc/softlevel";

/// Default path to the optional settings file.
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/rc.conf.toml";

/// Subdirectory of the state root holding per-service saved options.
pub const OPTIONS_SUBDIR: &str = "options";

/// Subdirectory of the state root holding per-service daemon invocation records.
pub const DAEMONS_SUBDIR: &str = "daemons";

// ============================================================================
// Script execution
// ============================================================================

/// Default shell used to invoke a service script when it is not itself executable
/// (falls back to direct exec otherwise).
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

/// Verb passed to a script to request its lifecycle start action.
pub const VERB_START: &str = "start";

/// Verb passed to a script to request its lifecycle stop action.
pub const VERB_STOP: &str = "stop";

/// Verb passed to a script to request a status report (no state mutation).
pub const VERB_STATUS: &str = "status";

/// Verb passed to a script to enter sandboxed metadata mode (no side effects).
pub const VERB_DEPEND: &str = "depend";

// ============================================================================
// State-store timing (component C)
// ============================================================================

/// Initial backoff used by `wait_for` polling.
pub const WAIT_BACKOFF_START: Duration = Duration::from_millis(20);

/// Backoff ceiling used by `wait_for` polling.
pub const WAIT_BACKOFF_CAP: Duration = Duration::from_secs(1);

/// Default total wall-clock bound for `wait_for`, absent an explicit override.
pub const WAIT_DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Transient I/O retry policy
// ============================================================================

/// Maximum attempts for a transient directory write before surfacing failure.
pub const TRANSIENT_IO_RETRIES: u32 = 3;

/// Backoff between transient I/O retries.
pub const TRANSIENT_IO_BACKOFF: Duration = Duration::from_millis(100);
