use std::path::PathBuf;
use thiserror::Error;

/// Startup failure while constructing a sink or reading logging configuration.
///
/// Fatal only for the sink it names; the remaining sinks are still built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level '{0}': expected one of debug, info, warn, error")]
    InvalidLevel(String),

    #[error("Invalid terminal output format '{0}': expected default or json")]
    InvalidOutput(String),

    #[error("Rotation threshold must be greater than zero")]
    ZeroThreshold,

    #[error("Invalid log path '{}': {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Cannot create log directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open log file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Runtime failure of a single sink. Counted by the logger, never surfaced
/// to callers of `log()`.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{sink} sink write failed: {source}")]
    Write {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink} sink rotation failed: {source}")]
    Rotate {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink} sink flush failed: {source}")]
    Flush {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink} sink is closed")]
    Closed { sink: &'static str },
}

impl SinkError {
    /// Name of the sink kind that produced the error.
    #[must_use]
    pub fn sink(&self) -> &'static str {
        match self {
            Self::Write { sink, .. }
            | Self::Rotate { sink, .. }
            | Self::Flush { sink, .. }
            | Self::Closed { sink } => sink,
        }
    }
}

/// A record could not be rendered as JSON and was emitted in degraded form.
#[derive(Error, Debug)]
#[error("Failed to serialize log record: {0}")]
pub struct FormatError(#[from] pub serde_json::Error);

/// Close errors collected while shutting the logger down.
#[derive(Error, Debug)]
#[error("{} sink(s) failed to close cleanly", errors.len())]
pub struct ShutdownError {
    pub errors: Vec<SinkError>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
