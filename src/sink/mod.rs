//! Log destinations.
//!
//! Sinks form a closed set: terminal, single file and rotating directory.
//! Every sink owns its handle behind its own mutex, so writers of different
//! sinks never contend with each other.

mod file;
mod rotating;
mod terminal;

pub use file::FileSink;
pub use rotating::RotatingDirectorySink;
pub use terminal::{TerminalFormat, TerminalSink};

use crate::error::SinkError;
use crate::record::FormattedRecord;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub enum Sink {
    Terminal(TerminalSink),
    File(FileSink),
    RotatingDirectory(RotatingDirectorySink),
}

impl Sink {
    /// Short name used in error messages and statistics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terminal(_) => TerminalSink::NAME,
            Self::File(_) => FileSink::NAME,
            Self::RotatingDirectory(_) => RotatingDirectorySink::NAME,
        }
    }

    pub fn write(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        match self {
            Self::Terminal(sink) => sink.write(record),
            Self::File(sink) => sink.write(record),
            Self::RotatingDirectory(sink) => sink.write(record),
        }
    }

    /// Flush and release the handle. A second call is a no-op.
    pub fn close(&self) -> Result<(), SinkError> {
        match self {
            Self::Terminal(sink) => sink.close(),
            Self::File(sink) => sink.close(),
            Self::RotatingDirectory(sink) => sink.close(),
        }
    }

    /// Completed rotations; always zero for non-rotating sinks.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        match self {
            Self::RotatingDirectory(sink) => sink.rotations(),
            Self::Terminal(_) | Self::File(_) => 0,
        }
    }

    /// Rotations that failed after their record was written.
    #[must_use]
    pub fn rotate_failures(&self) -> u64 {
        match self {
            Self::RotatingDirectory(sink) => sink.rotate_failures(),
            Self::Terminal(_) | Self::File(_) => 0,
        }
    }

    /// Error that started a run of failed rotations, reported once.
    pub fn take_rotate_error(&self) -> Option<SinkError> {
        match self {
            Self::RotatingDirectory(sink) => sink.take_rotate_error(),
            Self::Terminal(_) | Self::File(_) => None,
        }
    }

    #[must_use]
    pub fn as_terminal(&self) -> Option<&TerminalSink> {
        match self {
            Self::Terminal(sink) => Some(sink),
            Self::File(_) | Self::RotatingDirectory(_) => None,
        }
    }
}

impl From<TerminalSink> for Sink {
    fn from(sink: TerminalSink) -> Self {
        Self::Terminal(sink)
    }
}

impl From<FileSink> for Sink {
    fn from(sink: FileSink) -> Self {
        Self::File(sink)
    }
}

impl From<RotatingDirectorySink> for Sink {
    fn from(sink: RotatingDirectorySink) -> Self {
        Self::RotatingDirectory(sink)
    }
}

/// Lock a sink mutex, recovering the data if a writer panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write `line` plus a newline as one buffer and flush it through.
/// Returns the number of bytes written.
pub(crate) fn append_line<W: Write>(writer: &mut W, line: &str) -> io::Result<u64> {
    let mut buf = Vec::with_capacity(line.len().saturating_add(1));
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(u64::try_from(buf.len()).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[path = "../sink_tests.rs"]
mod sink_tests;
