//! Error types for jobwatch operations.
//!
//! Defines error types for the major subsystems:
//! - Log monitoring and outcome classification
//! - Quarantine of failed job directories
//! - Configuration loading and validation
//! - Launching dependent jobs

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while watching or classifying a job log.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Log file '{}' not found", path.display())]
    LogNotFound { path: PathBuf },

    #[error("Failed to read log file '{}': {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid error pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Marker '{0}' cannot be empty")]
    EmptyMarker(&'static str),
}

impl MonitorError {
    /// Maps an IO error on `path` to the matching variant.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            MonitorError::LogNotFound { path }
        } else {
            MonitorError::ReadFailed { path, source }
        }
    }
}

/// Errors that can occur while quarantining job directories.
#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("Failed to create quarantine directory '{}': {source}", path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination '{}' already exists", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Failed to move '{}' to '{}': {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read settings file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Markers(#[from] MonitorError),
}

/// Errors that can occur while launching a dependent job.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to prepare job directory '{}': {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Geometry file '{}' not found", path.display())]
    GeometryNotFound { path: PathBuf },

    #[error("Failed to spawn launch command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
