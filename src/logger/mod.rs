//! Multiplexing logger.
//!
//! A [`Logger`] formats each record once and hands it to every registered
//! sink in registration order. Sink failures are counted and reported, never
//! returned to the caller. The logger is an explicit value: clone it into
//! whatever needs to log.

mod context;
mod stats;

pub use context::ContextLogger;
pub use stats::{LoggerStats, SinkStats};

use crate::config::LogConfig;
use crate::error::{ConfigError, ShutdownError, SinkError};
use crate::record::{Fields, FormattedRecord, Formatter, Level};
use crate::sink::Sink;
use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

thread_local! {
    static IN_LOG_CALL: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside [`Logger::log`].
#[must_use]
pub fn is_logging_on_this_thread() -> bool {
    IN_LOG_CALL.with(Cell::get)
}

/// Marks the current thread as inside a log call until dropped.
struct ReentryGuard {
    previous: bool,
}

impl ReentryGuard {
    fn enter() -> Self {
        Self {
            previous: IN_LOG_CALL.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_LOG_CALL.with(|flag| flag.set(self.previous));
    }
}

/// A sink plus its delivery counters.
struct SinkSlot {
    sink: Sink,
    written: AtomicU64,
    failed: AtomicU64,
    failing: AtomicBool,
}

impl SinkSlot {
    fn new(sink: Sink) -> Self {
        Self {
            sink,
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    filtered: AtomicU64,
    rejected: AtomicU64,
    degraded: AtomicU64,
}

struct LoggerInner {
    min_level: Level,
    formatter: Formatter,
    slots: Vec<SinkSlot>,
    /// `true` once shut down. Writers hold the read side for the whole
    /// fan-out, so shutdown waits for every in-flight write.
    shut_down: RwLock<bool>,
    counters: Counters,
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        for slot in self.slots.iter().rev() {
            slot.sink.close().ok();
        }
    }
}

/// Collects sinks and settings for a [`Logger`].
#[derive(Default)]
pub struct LoggerBuilder {
    min_level: Level,
    sinks: Vec<Sink>,
}

impl LoggerBuilder {
    /// Drop records below `level` before they are formatted.
    #[must_use]
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Register a sink. Registration order is delivery order.
    #[must_use]
    pub fn sink(mut self, sink: impl Into<Sink>) -> Self {
        self.sinks.push(sink.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Logger {
        Logger {
            inner: Arc::new(LoggerInner {
                min_level: self.min_level,
                formatter: Formatter::new(),
                slots: self.sinks.into_iter().map(SinkSlot::new).collect(),
                shut_down: RwLock::new(false),
                counters: Counters::default(),
            }),
        }
    }
}

/// Cheaply clonable handle to one set of sinks.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Build a logger from configuration; see [`LogConfig::build_logger`].
    #[must_use]
    pub fn from_config(config: &LogConfig) -> (Self, Vec<ConfigError>) {
        config.build_logger()
    }

    #[must_use]
    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.inner.min_level
    }

    #[must_use]
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.inner.slots.iter().map(|slot| slot.sink.name()).collect()
    }

    /// Format the record once and deliver it to every sink.
    ///
    /// Never fails and never panics: sink errors are counted per sink and
    /// reported on the terminal as a best effort.
    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        let counters = &self.inner.counters;
        if !self.enabled(level) {
            counters.filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let _reentry = ReentryGuard::enter();
        let shut_down = self
            .inner
            .shut_down
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *shut_down {
            counters.rejected.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let record = self.inner.formatter.format(level, message, fields);
        counters.accepted.fetch_add(1, Ordering::Relaxed);
        if record.is_degraded() {
            counters.degraded.fetch_add(1, Ordering::Relaxed);
        }
        for (index, slot) in self.inner.slots.iter().enumerate() {
            self.deliver(index, slot, &record);
        }
        drop(shut_down);
    }

    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Error, message, fields);
    }

    /// Logger that adds `fields` to every record it emits.
    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> ContextLogger {
        ContextLogger::new(self.clone(), fields)
    }

    fn deliver(&self, index: usize, slot: &SinkSlot, record: &FormattedRecord) {
        match slot.sink.write(record) {
            Ok(()) => {
                slot.written.fetch_add(1, Ordering::Relaxed);
                if slot.failing.swap(false, Ordering::AcqRel) {
                    self.report(
                        index,
                        Level::Info,
                        "Log sink recovered",
                        Fields::new().with("sink", slot.sink.name()),
                    );
                }
                if let Some(err) = slot.sink.take_rotate_error() {
                    self.report(index, Level::Error, "Log rotation failed", failure_fields(&err));
                }
            }
            Err(err) => {
                slot.failed.fetch_add(1, Ordering::Relaxed);
                if !slot.failing.swap(true, Ordering::AcqRel) {
                    self.report(index, Level::Error, "Log sink failed", failure_fields(&err));
                }
            }
        }
    }

    /// Report a sink state change on a terminal sink other than the one at
    /// `source_index`, or on raw stderr if there is none.
    fn report(&self, source_index: usize, level: Level, message: &str, fields: Fields) {
        let record = self.inner.formatter.format(level, message, fields);
        let terminal = self
            .inner
            .slots
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != source_index)
            .find_map(|(_, slot)| slot.sink.as_terminal());
        let delivered = terminal.is_some_and(|sink| sink.write(&record).is_ok());
        if !delivered {
            let mut line = record.human_line().to_string();
            line.push('\n');
            std::io::stderr().write_all(line.as_bytes()).ok();
        }
    }

    /// Close every sink in reverse registration order.
    ///
    /// Waits for in-flight writes, then rejects later records. Close errors
    /// are collected without stopping early. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        let mut shut_down = self
            .inner
            .shut_down
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *shut_down {
            return Ok(());
        }
        *shut_down = true;
        drop(shut_down);

        let errors: Vec<SinkError> = self
            .inner
            .slots
            .iter()
            .rev()
            .filter_map(|slot| slot.sink.close().err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { errors })
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self
            .inner
            .shut_down
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn stats(&self) -> LoggerStats {
        let counters = &self.inner.counters;
        LoggerStats {
            accepted: counters.accepted.load(Ordering::Relaxed),
            filtered: counters.filtered.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            degraded: counters.degraded.load(Ordering::Relaxed),
            sinks: self
                .inner
                .slots
                .iter()
                .map(|slot| SinkStats {
                    name: slot.sink.name(),
                    written: slot.written.load(Ordering::Relaxed),
                    failed: slot.failed.load(Ordering::Relaxed),
                    rotations: slot.sink.rotations(),
                    rotate_failures: slot.sink.rotate_failures(),
                })
                .collect(),
        }
    }
}

fn failure_fields(err: &SinkError) -> Fields {
    Fields::new()
        .with("sink", err.sink())
        .with("error", err.to_string())
}

#[cfg(test)]
#[path = "../logger_tests.rs"]
mod logger_tests;
