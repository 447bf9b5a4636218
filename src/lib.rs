// Allow panic/unwrap/expect in tests (denied globally via Cargo.toml lints)
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing
    )
)]

//! Structured logging for the tunnel daemon.
//!
//! Records are formatted once and fanned out to up to three sinks: the
//! terminal, a single append-only file, and a size-rotated directory.

pub mod bridge;
pub mod config;
pub mod error;
pub mod logger;
pub mod record;
pub mod rotation;
pub mod sink;

// Re-export commonly used types
pub use bridge::LoggerLayer;
pub use config::{default_config_paths, find_default_config, LogConfig, LogOverrides};
pub use error::{ConfigError, FormatError, ShutdownError, SinkError};
pub use logger::{ContextLogger, Logger, LoggerBuilder, LoggerStats, SinkStats};
pub use record::{FieldValue, Fields, FormattedRecord, Formatter, Level, LogRecord};
pub use rotation::{RotationPolicy, DEFAULT_CURRENT_FILE_NAME, DEFAULT_ROTATE_AFTER_BYTES};
pub use sink::{FileSink, RotatingDirectorySink, Sink, TerminalFormat, TerminalSink};
