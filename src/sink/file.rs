use super::{append_line, lock};
use crate::error::{ConfigError, SinkError};
use crate::record::FormattedRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON lines appended to one fixed file. Never rotates.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    pub const NAME: &'static str = "file";

    /// Open `path` for appending, creating it and any missing parent
    /// directories. Fails instead of falling back to another destination.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(ConfigError::InvalidPath {
                path,
                reason: "log file path has no file name".to_string(),
            });
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ConfigError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        let mut guard = lock(&self.writer);
        let writer = guard.as_mut().ok_or(SinkError::Closed { sink: Self::NAME })?;
        append_line(writer, record.json_line())
            .map(drop)
            .map_err(|source| SinkError::Write {
                sink: Self::NAME,
                source,
            })
    }

    pub fn close(&self) -> Result<(), SinkError> {
        let taken = lock(&self.writer).take();
        match taken {
            Some(mut writer) => writer.flush().map_err(|source| SinkError::Flush {
                sink: Self::NAME,
                source,
            }),
            None => Ok(()),
        }
    }
}
