use super::Logger;
use crate::record::{Fields, Level};

/// A [`Logger`] that stamps a fixed set of fields on every record,
/// e.g. `tunnelID` for everything a tunnel logs or `connIndex` for one
/// connection. Per-call fields win over the base fields.
#[derive(Clone)]
pub struct ContextLogger {
    logger: Logger,
    fields: Fields,
}

impl ContextLogger {
    pub(super) fn new(logger: Logger, fields: Fields) -> Self {
        Self { logger, fields }
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Narrower context layered on top of this one.
    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> Self {
        let mut merged = self.fields.clone();
        merged.merge(&fields);
        Self::new(self.logger.clone(), merged)
    }

    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        if !self.logger.enabled(level) {
            // Skip the merge; the logger still counts the record as filtered.
            self.logger.log(level, message, fields);
            return;
        }
        let mut merged = self.fields.clone();
        merged.merge(&fields);
        self.logger.log(level, message, merged);
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
}
