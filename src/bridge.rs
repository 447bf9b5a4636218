//! Forwards `tracing` events into a [`Logger`].
//!
//! Lets libraries instrumented with `tracing` (tokio, hyper, ...) land in the
//! same sinks as the daemon's own records. Events raised while the same
//! thread is already inside [`Logger::log`] are dropped so a sink can never
//! log into itself.

use crate::logger::{is_logging_on_this_thread, Logger};
use crate::record::{FieldValue, Fields, Level};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Field name `tracing` uses for the formatted message.
const MESSAGE_FIELD: &str = "message";

/// Map a `tracing` level onto the four record levels.
#[must_use]
pub fn level_from_tracing(level: tracing::Level) -> Level {
    match level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

/// `tracing` level directive matching a record level, for `EnvFilter`
/// defaults.
#[must_use]
pub fn tracing_directive(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warn => "warn",
        Level::Error => "error",
    }
}

/// A `tracing_subscriber` layer writing every event to a [`Logger`].
#[derive(Clone)]
pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_logging_on_this_thread() {
            return;
        }
        let level = level_from_tracing(*event.metadata().level());
        if !self.logger.enabled(level) {
            return;
        }
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);
        self.logger
            .log(level, visitor.message.unwrap_or_default(), visitor.fields);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Fields,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: FieldValue) {
        self.fields.insert(field.name(), value);
    }
}

impl Visit for FieldCollector {
    #[allow(clippy::use_debug)]
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == MESSAGE_FIELD {
            self.message = Some(rendered);
        } else {
            self.insert(field, FieldValue::Str(rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, FieldValue::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::Uint(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, FieldValue::display(value));
    }
}
