//! Dependency-ordered runlevel service manager core for a Unix-like init system.
//!
//! This crate is the engine: given a directory of service scripts and their
//! declared relations, it resolves names, tracks per-service state on disk,
//! computes a deterministic start/stop order, and drives a runlevel transition.
//! It does not daemonize, does not supervise a long-running process of its own,
//! and the CLI in [`cli`] is a thin demonstration surface, not a production tool.

#![warn(unused_crate_dependencies)]
// Used only by the binary (src/bin/main.rs).
use ctrlc as _;

/// Errors.
pub mod error;

/// Constants and default values.
pub mod constants;

/// Path & filesystem layer (component A).
pub mod paths;

/// Service resolver (component B).
pub mod resolver;

/// Service state machine and state store (component C).
pub mod state;

/// Per-service metadata store (component D).
pub mod metadata;

/// Runlevel registry (component E).
pub mod runlevel;

/// Dependency parser, cache, and graph/ordering (components F and G).
pub mod depend;

/// Service executor (component H).
pub mod exec;

/// Process query collaborator (component K).
pub mod process;

/// Plugin registry (component J).
pub mod plugin;

/// Runlevel transition driver (component I).
pub mod transition;

/// Settings layer (component L).
pub mod settings;

/// Thin CLI driver (component O).
pub mod cli;

/// Test utilities shared across unit and integration tests.
#[doc(hidden)]
pub mod test_utils;
