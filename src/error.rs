//! Error handling for rc-core.
use thiserror::Error;

/// Defines all possible errors that can occur in the init-system core.
#[derive(Debug, Error)]
pub enum RcError {
    /// Error reading or accessing the settings file.
    #[error("Failed to read settings file: {0}")]
    SettingsReadError(#[from] std::io::Error),

    /// Error parsing the settings file (accepts YAML or TOML-shaped YAML).
    #[error("Invalid settings format: {0}")]
    SettingsParseError(#[from] serde_yaml::Error),

    /// Error parsing or writing the dependency cache.
    #[error("Dependency cache error: {0}")]
    CacheError(#[from] serde_json::Error),

    /// A referenced service name does not resolve to a script.
    #[error("Unknown service '{0}'")]
    UnknownService(String),

    /// A referenced runlevel does not exist.
    #[error("Unknown runlevel '{0}'")]
    UnknownRunlevel(String),

    /// A declared relation references a service or virtual that cannot be resolved.
    #[error("Service '{service}' declares unresolvable dependency '{dependency}'")]
    UnresolvedDependency {
        /// The service declaring the relation.
        service: String,
        /// The peer name or virtual that could not be resolved.
        dependency: String,
    },

    /// Error spawning a service script.
    #[error("Failed to start service '{service}': {source}")]
    ServiceStartError {
        /// The service name that failed to start.
        service: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error stopping a service script.
    #[error("Failed to stop service '{service}': {source}")]
    ServiceStopError {
        /// The service name that failed to stop.
        service: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error while invoking a script's `depend` verb to parse its declared relations.
    #[error("Failed to parse dependencies for '{service}': {reason}")]
    DependencyParseError {
        /// Service whose `depend` invocation could not be parsed.
        service: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Error in the on-disk state-marker or metadata store.
    #[error("State store error: {0}")]
    StateStoreError(#[from] StateStoreError),

    /// Error for poisoned mutex (plugin registry, status cache).
    #[error("Mutex is poisoned: {0}")]
    MutexPoisonError(String),

    /// Fatal condition: the library aborts rather than silently continuing.
    #[error("Fatal: {0}")]
    Fatal(String),
}

/// Implement the `From` trait to convert a `std::sync::PoisonError` into an `RcError`.
impl<T> From<std::sync::PoisonError<T>> for RcError {
    /// Converts a `std::sync::PoisonError` into an `RcError`.
    fn from(err: std::sync::PoisonError<T>) -> Self {
        RcError::MutexPoisonError(err.to_string())
    }
}

/// Error type for the on-disk state-marker and metadata stores (components C and D).
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Error reading or writing a marker file.
    #[error("Marker I/O error at {path}: {source}")]
    MarkerIo {
        /// Path of the marker file involved.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Permission denied accessing the state root.
    #[error("Permission denied accessing state root '{0}'")]
    PermissionDenied(String),

    /// The parent directory for a marker path does not exist.
    #[error("Missing state directory '{0}'")]
    MissingDirectory(String),

    /// A saved option or daemon record could not be parsed.
    #[error("Failed to parse metadata record: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A required daemon record was not found.
    #[error("No matching daemon record for service '{0}'")]
    DaemonRecordNotFound(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RcError>;
