use super::{append_line, lock};
use crate::error::{ConfigError, SinkError};
use crate::record::FormattedRecord;
use crate::rotation::RotationPolicy;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Mutable half of the directory sink, guarded by the sink's mutex.
struct RotationState {
    writer: Option<BufWriter<File>>,
    current_size_bytes: u64,
    rotations: u64,
    rotate_failures: u64,
    /// First error of the current run of failed rotations, until taken.
    rotate_error: Option<SinkError>,
    rotate_failing: bool,
    closed: bool,
}

/// JSON lines appended to `<directory>/<current>`, rotated to
/// `<directory>/<current>.1` once the byte threshold is reached.
pub struct RotatingDirectorySink {
    directory: PathBuf,
    policy: RotationPolicy,
    state: Mutex<RotationState>,
}

impl RotatingDirectorySink {
    pub const NAME: &'static str = "directory";

    /// Create the directory if needed and open (or resume) the current file.
    ///
    /// An existing current file is appended to and its size counts toward
    /// the threshold. Files left over from older runs are not removed.
    pub fn open(directory: impl AsRef<Path>, policy: RotationPolicy) -> Result<Self, ConfigError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|source| ConfigError::CreateDir {
            path: directory.clone(),
            source,
        })?;
        let current = policy.current_path(&directory);
        let (writer, size) = open_append(&current).map_err(|source| ConfigError::Open {
            path: current.clone(),
            source,
        })?;
        Ok(Self {
            directory,
            policy,
            state: Mutex::new(RotationState {
                writer: Some(writer),
                current_size_bytes: size,
                rotations: 0,
                rotate_failures: 0,
                rotate_error: None,
                rotate_failing: false,
                closed: false,
            }),
        })
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Bytes written to the current file since it was started.
    #[must_use]
    pub fn current_size_bytes(&self) -> u64 {
        lock(&self.state).current_size_bytes
    }

    #[must_use]
    pub fn rotations(&self) -> u64 {
        lock(&self.state).rotations
    }

    /// Rotations that failed after their record had been written.
    #[must_use]
    pub fn rotate_failures(&self) -> u64 {
        lock(&self.state).rotate_failures
    }

    /// Error that started the current run of failed rotations, once.
    pub fn take_rotate_error(&self) -> Option<SinkError> {
        lock(&self.state).rotate_error.take()
    }

    /// Append one record, then rotate if the current file reached the
    /// threshold. The whole sequence runs under the sink's lock.
    ///
    /// The record is on disk once the append succeeds, so a failed rotation
    /// does not fail the write. It is counted and retried on the next write.
    pub fn write(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.closed {
            return Err(SinkError::Closed { sink: Self::NAME });
        }
        if state.writer.is_none() {
            // A previous rotation could not reopen the current file.
            let (writer, size) =
                open_append(&self.policy.current_path(&self.directory)).map_err(|source| {
                    SinkError::Write {
                        sink: Self::NAME,
                        source,
                    }
                })?;
            state.writer = Some(writer);
            state.current_size_bytes = size;
        }
        let writer = state
            .writer
            .as_mut()
            .ok_or(SinkError::Closed { sink: Self::NAME })?;
        let written = append_line(writer, record.json_line()).map_err(|source| SinkError::Write {
            sink: Self::NAME,
            source,
        })?;
        state.current_size_bytes = state.current_size_bytes.saturating_add(written);

        if self.policy.should_rotate(state.current_size_bytes) {
            match self.rotate(state) {
                Ok(()) => state.rotate_failing = false,
                Err(err) => {
                    state.rotate_failures = state.rotate_failures.saturating_add(1);
                    if !state.rotate_failing {
                        state.rotate_failing = true;
                        state.rotate_error = Some(err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the current file, rename it over the rotated slot and start a
    /// fresh current file.
    fn rotate(&self, state: &mut RotationState) -> Result<(), SinkError> {
        let rotate_err = |source: io::Error| SinkError::Rotate {
            sink: Self::NAME,
            source,
        };
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(rotate_err)?;
        }
        let current = self.policy.current_path(&self.directory);
        // rename(2) replaces the old rotated file atomically.
        fs::rename(&current, self.policy.rotated_path(&self.directory)).map_err(rotate_err)?;
        let (writer, size) = open_append(&current).map_err(rotate_err)?;
        state.writer = Some(writer);
        state.current_size_bytes = size;
        state.rotations = state.rotations.saturating_add(1);
        Ok(())
    }

    pub fn close(&self) -> Result<(), SinkError> {
        let mut guard = lock(&self.state);
        if guard.closed {
            return Ok(());
        }
        guard.closed = true;
        let taken = guard.writer.take();
        drop(guard);
        match taken {
            Some(mut writer) => writer.flush().map_err(|source| SinkError::Flush {
                sink: Self::NAME,
                source,
            }),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((BufWriter::new(file), size))
}

#[cfg(test)]
#[path = "rotating_tests.rs"]
mod rotating_tests;
