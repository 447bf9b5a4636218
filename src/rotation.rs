//! Size-based rotation policy for the directory sink.
//!
//! Naming scheme: the current file keeps a fixed name and the single
//! retained rotated file is `<current>.1`. A rotation renames the current
//! file over the rotated slot, so the directory never holds more than two
//! files of this scheme.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the file receiving writes.
pub const DEFAULT_CURRENT_FILE_NAME: &str = "cloudflared.log";

/// Rotate once the current file reaches this many bytes.
pub const DEFAULT_ROTATE_AFTER_BYTES: u64 = 1_000_000;

/// Suffix appended to the current file name to form the rotated name.
pub const ROTATED_SUFFIX: &str = ".1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    threshold_bytes: u64,
    current_file_name: String,
    rotated_file_name: String,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_ROTATE_AFTER_BYTES,
            current_file_name: DEFAULT_CURRENT_FILE_NAME.to_string(),
            rotated_file_name: format!("{DEFAULT_CURRENT_FILE_NAME}{ROTATED_SUFFIX}"),
        }
    }
}

impl RotationPolicy {
    /// Policy with the default file names and the given threshold.
    pub fn new(threshold_bytes: u64) -> Result<Self, ConfigError> {
        if threshold_bytes == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(Self {
            threshold_bytes,
            ..Self::default()
        })
    }

    /// Use a different current file name. The rotated name follows it.
    pub fn with_file_name(self, name: &str) -> Result<Self, ConfigError> {
        let is_plain_name = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !is_plain_name {
            return Err(ConfigError::InvalidPath {
                path: PathBuf::from(name),
                reason: "log file name must not contain path separators".to_string(),
            });
        }
        Ok(Self {
            current_file_name: name.to_string(),
            rotated_file_name: format!("{name}{ROTATED_SUFFIX}"),
            ..self
        })
    }

    #[must_use]
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    #[must_use]
    pub fn current_file_name(&self) -> &str {
        &self.current_file_name
    }

    #[must_use]
    pub fn rotated_file_name(&self) -> &str {
        &self.rotated_file_name
    }

    #[must_use]
    pub fn current_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.current_file_name)
    }

    #[must_use]
    pub fn rotated_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.rotated_file_name)
    }

    /// Checked after each completed write, never before.
    #[must_use]
    pub fn should_rotate(&self, current_size_bytes: u64) -> bool {
        current_size_bytes >= self.threshold_bytes
    }

    /// True if `name` is one of the two files this policy manages.
    #[must_use]
    pub fn owns(&self, name: &str) -> bool {
        name == self.current_file_name || name == self.rotated_file_name
    }
}
