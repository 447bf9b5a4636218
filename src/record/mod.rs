//! Structured log records.
//!
//! A [`LogRecord`] is the unit every sink receives. Serialized as JSON it is
//! a single flat object whose first three keys are always `level`, `time` and
//! `message`; contextual fields follow as sibling keys.

mod format;

pub use format::{Clock, FormattedRecord, Formatter};

use crate::error::{ConfigError, FormatError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Keys owned by the record itself. Fields using them are renamed on output.
pub const RESERVED_KEYS: [&str; 3] = ["level", "time", "message"];

/// Prefix applied to a field whose key collides with a reserved key.
pub const RESERVED_KEY_PREFIX: &str = "fields.";

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    /// Lowercase name used in JSON output and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Three-letter uppercase abbreviation used on the terminal.
    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warn => "WRN",
            Self::Error => "ERR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Scalar value attached to a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    /// Capture any displayable value as a string field.
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Str(value.to_string())
    }

    /// Render for the human-readable terminal line.
    ///
    /// Strings that would break `key=value` scanning are JSON-quoted.
    #[must_use]
    pub fn to_human(&self) -> String {
        match self {
            Self::Str(s) => {
                let needs_quotes = s.is_empty()
                    || s.chars()
                        .any(|c| c.is_whitespace() || c == '"' || c == '=' || c.is_control());
                if needs_quotes {
                    serde_json::to_string(s).unwrap_or_else(|_| s.clone())
                } else {
                    s.clone()
                }
            }
            Self::Int(v) => v.to_string(),
            Self::Uint(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(s) => serializer.serialize_str(s),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Uint(v) => serializer.serialize_u64(*v),
            // JSON has no NaN/Infinity; keep the information as a string.
            Self::Float(v) if !v.is_finite() => serializer.serialize_str(&v.to_string()),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::Uint(u64::try_from(value).unwrap_or(u64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered key/value fields. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Merge `other` into `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.insert(key.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = Self::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// Output key for a field, renaming collisions with the reserved keys.
///
/// Returns `None` when the renamed key is already taken by another field;
/// the explicitly named field keeps it.
fn output_key<'a>(key: &'a str, fields: &Fields) -> Option<Cow<'a, str>> {
    if RESERVED_KEYS.contains(&key) {
        let renamed = format!("{RESERVED_KEY_PREFIX}{key}");
        fields.get(&renamed).is_none().then_some(Cow::Owned(renamed))
    } else {
        Some(Cow::Borrowed(key))
    }
}

/// Fields as written, with unique output keys.
fn output_fields(fields: &Fields) -> impl Iterator<Item = (Cow<'_, str>, &FieldValue)> {
    fields
        .iter()
        .filter_map(move |(key, value)| output_key(key, fields).map(|key| (key, value)))
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    level: Level,
    message: String,
    time: DateTime<Utc>,
    fields: Fields,
}

impl LogRecord {
    #[must_use]
    pub fn new(level: Level, message: String, time: DateTime<Utc>, fields: Fields) -> Self {
        Self {
            level,
            message,
            time,
            fields,
        }
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// RFC 3339 timestamp with millisecond precision, as written to JSON.
    #[must_use]
    pub fn time_rfc3339(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Single-line JSON document, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `<time> <LVL> <message> key=value ...` on a single line.
    #[must_use]
    pub fn to_human_line(&self) -> String {
        let mut parts = vec![
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level.abbreviation().to_string(),
            self.message.replace('\r', "\\r").replace('\n', "\\n"),
        ];
        parts.extend(
            output_fields(&self.fields).map(|(key, value)| format!("{key}={}", value.to_human())),
        );
        parts.join(" ")
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len().saturating_add(3)))?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("time", &self.time_rfc3339())?;
        map.serialize_entry("message", &self.message)?;
        for (key, value) in output_fields(&self.fields) {
            map.serialize_entry(key.as_ref(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[path = "../record_tests.rs"]
mod record_tests;
