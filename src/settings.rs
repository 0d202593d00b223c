//! Settings layer (component L): the optional on-disk configuration that overrides
//! [`Paths`]' defaults, the default shell, timeouts, and log verbosity.
//!
//! Path-like fields may reference `$VAR`/`${VAR}`, expanded against the process
//! environment before the file is parsed.

use std::{env, fs, io::ErrorKind, path::Path, time::Duration};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    constants::{
        DEFAULT_DEPTREE_CACHE, DEFAULT_INIT_DIR, DEFAULT_RUNLEVELS_ROOT, DEFAULT_SHELL,
        DEFAULT_SOFTLEVEL_FILE, DEFAULT_STATE_ROOT, WAIT_DEFAULT_TIMEOUT,
    },
    error::RcError,
    paths::Paths,
};

/// On-disk, user-overridable configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides [`Paths::init_dir`].
    pub init_dir: String,
    /// Overrides [`Paths::runlevels_root`].
    pub runlevels_root: String,
    /// Overrides [`Paths::state_root`].
    pub state_root: String,
    /// Overrides [`Paths::deptree_cache`].
    pub deptree_cache: String,
    /// Overrides [`Paths::softlevel_file`].
    pub softlevel_file: String,
    /// Shell used to invoke a script that is not itself directly executable.
    pub shell: String,
    /// Default `wait_for` timeout, in seconds.
    pub wait_timeout_secs: u64,
    /// Log verbosity passed to `tracing_subscriber::EnvFilter` when `RC_LOG` is unset.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            init_dir: DEFAULT_INIT_DIR.to_string(),
            runlevels_root: DEFAULT_RUNLEVELS_ROOT.to_string(),
            state_root: DEFAULT_STATE_ROOT.to_string(),
            deptree_cache: DEFAULT_DEPTREE_CACHE.to_string(),
            softlevel_file: DEFAULT_SOFTLEVEL_FILE.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            wait_timeout_secs: WAIT_DEFAULT_TIMEOUT.as_secs(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Converts these settings into a [`Paths`] layout.
    pub fn to_paths(&self) -> Paths {
        Paths {
            init_dir: self.init_dir.clone().into(),
            runlevels_root: self.runlevels_root.clone().into(),
            state_root: self.state_root.clone().into(),
            deptree_cache: self.deptree_cache.clone().into(),
            softlevel_file: self.softlevel_file.clone().into(),
        }
    }

    /// The configured `wait_for` timeout.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Loads settings from `path`, or the default settings path if `path` is `None`. A
/// missing file is not an error: it yields [`Settings::default`].
pub fn load_settings(path: Option<&Path>) -> Result<Settings, RcError> {
    let path = path.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        Path::new(crate::constants::DEFAULT_SETTINGS_FILE).to_path_buf()
    });

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file found, using defaults");
            return Ok(Settings::default());
        }
        Err(e) => return Err(RcError::SettingsReadError(e)),
    };

    let expanded = expand_env_vars(&content);
    let settings: Settings = serde_yaml::from_str(&expanded)?;
    Ok(settings)
}

/// Expands `$VAR`/`${VAR}` references against the process environment. An
/// unset variable is left as-is rather than treated as fatal, since a settings file
/// is allowed to reference optional overrides.
fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("static regex is valid");
    re.replace_all(input, |caps: &regex::Captures| match env::var(&caps[1]) {
        Ok(value) => value,
        Err(_) => {
            warn!(var = &caps[1], "settings file references unset environment variable");
            caps[0].to_string()
        }
    })
    .to_string()
}
