use super::{Fields, Level, LogRecord};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Process clock that never goes backwards, even if the wall clock does.
#[derive(Debug, Default)]
pub struct Clock {
    last_micros: AtomicI64,
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, clamped to be no earlier than any previous reading.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        let micros = wall.timestamp_micros();
        let previous = self.last_micros.fetch_max(micros, Ordering::AcqRel);
        if previous > micros {
            DateTime::from_timestamp_micros(previous).unwrap_or(wall)
        } else {
            wall
        }
    }
}

/// A record together with both of its renderings. Built once per `log()`
/// call and shared by every sink.
#[derive(Debug, Clone)]
pub struct FormattedRecord {
    record: LogRecord,
    human: String,
    json: String,
    degraded: bool,
}

impl FormattedRecord {
    #[must_use]
    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    /// Terminal rendering, no line terminator.
    #[must_use]
    pub fn human_line(&self) -> &str {
        &self.human
    }

    /// JSON rendering, no line terminator.
    #[must_use]
    pub fn json_line(&self) -> &str {
        &self.json
    }

    /// True when the JSON line is the fallback representation.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Turns `(level, message, fields)` into a [`FormattedRecord`].
#[derive(Debug, Default)]
pub struct Formatter {
    clock: Clock,
}

impl Formatter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self, level: Level, message: impl Into<String>, fields: Fields) -> FormattedRecord {
        let record = LogRecord::new(level, message.into(), self.clock.now(), fields);
        let human = record.to_human_line();
        let (json, degraded) = match record.to_json_line() {
            Ok(line) => (line, false),
            Err(err) => (degraded_json_line(&record, &err.to_string()), true),
        };
        FormattedRecord {
            record,
            human,
            json,
            degraded,
        }
    }
}

/// Minimal JSON line carrying the required keys and the serialization error.
fn degraded_json_line(record: &LogRecord, error: &str) -> String {
    serde_json::json!({
        "level": record.level().as_str(),
        "time": record.time_rfc3339(),
        "message": record.message(),
        "formatError": error,
    })
    .to_string()
}
