use super::{append_line, lock};
use crate::error::{ConfigError, SinkError};
use crate::record::FormattedRecord;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

/// How the terminal sink renders records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalFormat {
    /// `<time> <LVL> <message> key=value ...`
    #[default]
    Default,
    /// Same JSON lines as the file sinks.
    Json,
}

impl fmt::Display for TerminalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for TerminalFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "text" => Ok(Self::Default),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidOutput(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for TerminalFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

type BoxedWriter = Box<dyn Write + Send>;

/// Human-readable lines on standard error (or any injected stream).
pub struct TerminalSink {
    format: TerminalFormat,
    out: Mutex<Option<BoxedWriter>>,
}

impl TerminalSink {
    pub const NAME: &'static str = "terminal";

    /// Terminal sink on the process's standard error.
    #[must_use]
    pub fn stderr(format: TerminalFormat) -> Self {
        Self::with_writer(Box::new(std::io::stderr()), format)
    }

    #[must_use]
    pub fn with_writer(writer: BoxedWriter, format: TerminalFormat) -> Self {
        Self {
            format,
            out: Mutex::new(Some(writer)),
        }
    }

    #[must_use]
    pub fn format(&self) -> TerminalFormat {
        self.format
    }

    pub fn write(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        let line = match self.format {
            TerminalFormat::Default => record.human_line(),
            TerminalFormat::Json => record.json_line(),
        };
        let mut guard = lock(&self.out);
        let out = guard.as_mut().ok_or(SinkError::Closed { sink: Self::NAME })?;
        append_line(out, line)
            .map(drop)
            .map_err(|source| SinkError::Write {
                sink: Self::NAME,
                source,
            })
    }

    pub fn close(&self) -> Result<(), SinkError> {
        let taken = lock(&self.out).take();
        match taken {
            Some(mut out) => out.flush().map_err(|source| SinkError::Flush {
                sink: Self::NAME,
                source,
            }),
            None => Ok(()),
        }
    }
}
