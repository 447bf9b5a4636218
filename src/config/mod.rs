//! Logging configuration and sink selection.
//!
//! Keys mirror the daemon's YAML config file (`loglevel`, `logfile`,
//! `log-directory`, ...). Everything else in that file belongs to other
//! subsystems and is ignored here.

mod file;

pub use file::{default_config_paths, find_default_config};

use crate::error::ConfigError;
use crate::logger::Logger;
use crate::record::Level;
use crate::rotation::{RotationPolicy, DEFAULT_ROTATE_AFTER_BYTES};
use crate::sink::{FileSink, RotatingDirectorySink, TerminalFormat, TerminalSink};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

fn default_rotate_after_bytes() -> u64 {
    DEFAULT_ROTATE_AFTER_BYTES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LogConfig {
    /// Records below this level are dropped before formatting.
    #[serde(default)]
    pub loglevel: Level,
    /// Enables the single-file sink.
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    /// Enables the rotating directory sink.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
    /// Disables the terminal sink.
    #[serde(default)]
    pub no_terminal: bool,
    /// Terminal rendering.
    #[serde(default)]
    pub output: TerminalFormat,
    #[serde(default = "default_rotate_after_bytes")]
    pub rotate_after_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            loglevel: Level::Info,
            logfile: None,
            log_directory: None,
            no_terminal: false,
            output: TerminalFormat::Default,
            rotate_after_bytes: DEFAULT_ROTATE_AFTER_BYTES,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOverrides {
    pub loglevel: Option<Level>,
    pub logfile: Option<PathBuf>,
    pub log_directory: Option<PathBuf>,
    pub no_terminal: bool,
    pub output: Option<TerminalFormat>,
    pub rotate_after_bytes: Option<u64>,
}

impl LogConfig {
    /// Parse the logging keys out of a daemon YAML config document.
    /// An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a daemon YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply command-line overrides on top of this configuration.
    #[must_use]
    pub fn with_overrides(self, overrides: LogOverrides) -> Self {
        Self {
            loglevel: overrides.loglevel.unwrap_or(self.loglevel),
            logfile: overrides.logfile.or(self.logfile),
            log_directory: overrides.log_directory.or(self.log_directory),
            no_terminal: overrides.no_terminal || self.no_terminal,
            output: overrides.output.unwrap_or(self.output),
            rotate_after_bytes: overrides.rotate_after_bytes.unwrap_or(self.rotate_after_bytes),
        }
    }

    /// Build a logger writing its terminal output to stderr.
    #[must_use]
    pub fn build_logger(&self) -> (Logger, Vec<ConfigError>) {
        self.build_logger_with_terminal(Box::new(std::io::stderr()))
    }

    /// Build the sinks this configuration selects, in the order terminal,
    /// file, directory.
    ///
    /// A sink that cannot be constructed is left out and its error returned
    /// alongside the logger; the other sinks are still built.
    #[must_use]
    pub fn build_logger_with_terminal(
        &self,
        terminal_out: Box<dyn Write + Send>,
    ) -> (Logger, Vec<ConfigError>) {
        let mut builder = Logger::builder().min_level(self.loglevel);
        let mut errors = Vec::new();

        if !self.no_terminal {
            builder = builder.sink(TerminalSink::with_writer(terminal_out, self.output));
        }
        if let Some(path) = &self.logfile {
            match FileSink::open(path) {
                Ok(sink) => builder = builder.sink(sink),
                Err(err) => errors.push(err),
            }
        }
        if let Some(directory) = &self.log_directory {
            let sink = RotationPolicy::new(self.rotate_after_bytes)
                .and_then(|policy| RotatingDirectorySink::open(directory, policy));
            match sink {
                Ok(sink) => builder = builder.sink(sink),
                Err(err) => errors.push(err),
            }
        }
        (builder.build(), errors)
    }
}

#[cfg(test)]
#[path = "../config_tests.rs"]
mod config_tests;
