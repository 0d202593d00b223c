//! Thin command-line driver (component O).
//!
//! This is a demonstration surface over the library, not the full production
//! control tool: one subcommand per core operation (ordering, state inspection,
//! cache rebuilds, and driving a runlevel transition), with no daemonization,
//! supervision, or log streaming of its own.

use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from either string
/// names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RC_LOG`/`EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };
            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for the `rcctl` driver.
#[derive(Parser)]
#[command(name = "rcctl", version, author)]
#[command(about = "Inspect and drive the dependency-ordered runlevel service manager core", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Path to the settings file (defaults to the compiled-in default path).
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `rcctl` commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the computed start (or stop) order for a runlevel.
    Order {
        /// Runlevel to compute the order for.
        runlevel: String,

        /// Compute the stop order instead of the start order.
        #[arg(long)]
        stop: bool,

        /// Rebuild the dependency cache first, even if it looks fresh.
        #[arg(long)]
        force_cache: bool,
    },

    /// Print a service's current primary state and flags.
    State {
        /// Service name.
        service: String,
    },

    /// List every service currently in a given primary state or flag.
    Services {
        /// State or flag name (e.g. `started`, `failed`).
        state: String,
    },

    /// List known runlevels.
    Runlevels,

    /// Force a rebuild of the dependency cache from the init directory.
    UpdateCache {
        /// Rebuild even if the cache looks fresh.
        #[arg(long)]
        force: bool,
    },

    /// Drive a full transition to the given runlevel.
    Transition {
        /// Target runlevel.
        runlevel: String,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
