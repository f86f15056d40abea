//! Log records as they travel through the pipeline.

use chrono::{DateTime, Utc};
use tracing::Level;

/// One log event with its own timestamp.
///
/// The timestamp decides which file the record lands in; it is never
/// replaced by the time the sink happens to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Origin of the event, usually a module path or logger name.
    pub target: String,
    /// Rendered message without a trailing newline.
    pub message: String,
}

impl Record {
    /// Record stamped with the current time.
    #[must_use]
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            target: target.into(),
            message: message.into(),
        }
    }

    /// Replace the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Lowercase level name used in rendered output.
#[must_use]
pub const fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        _ => "error",
    }
}
