//! Rendering records into bytes.
//!
//! # Design
//! - The sink calls its formatter once per record, after any rotation.
//! - Formatters append into a caller-owned buffer so the sink can reuse it.

use std::io::{self, Write};

use chrono::SecondsFormat;
use serde::Serialize;
use tidelog_config::{RecordFormat, Zone};

use crate::record::{Record, level_name};
use crate::schedule::local_naive;

/// Turns a record into the bytes appended to the active file.
pub trait RecordFormatter: Send + Sync {
    /// Append the rendering of `record` to `out`, including the line terminator.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the record cannot be rendered.
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()>;
}

/// `[YYYY-MM-DD HH:MM:SS.mmm] [level] [target] message` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter {
    zone: Zone,
}

impl TextFormatter {
    /// Formatter rendering timestamps in `zone`.
    #[must_use]
    pub const fn new(zone: Zone) -> Self {
        Self { zone }
    }
}

impl RecordFormatter for TextFormatter {
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()> {
        let stamp = local_naive(self.zone, record.timestamp).format("%Y-%m-%d %H:%M:%S%.3f");
        write!(out, "[{stamp}] [{}] ", level_name(record.level))?;
        if !record.target.is_empty() {
            write!(out, "[{}] ", record.target)?;
        }
        out.extend_from_slice(record.message.trim_end_matches(['\r', '\n']).as_bytes());
        out.push(b'\n');
        Ok(())
    }
}

/// One JSON object per line with an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    target: &'a str,
    message: &'a str,
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()> {
        let line = JsonLine {
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            level: level_name(record.level),
            target: &record.target,
            message: record.message.trim_end_matches(['\r', '\n']),
        };
        serde_json::to_writer(&mut *out, &line)?;
        out.push(b'\n');
        Ok(())
    }
}

/// Formatter selected by configuration.
#[must_use]
pub fn formatter_for(format: RecordFormat, zone: Zone) -> Box<dyn RecordFormatter> {
    match format {
        RecordFormat::Text => Box::new(TextFormatter::new(zone)),
        RecordFormat::Json => Box::new(JsonFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::error::Error;
    use tracing::Level;

    fn record() -> Result<Record, Box<dyn Error>> {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 30)
            .single()
            .ok_or("invalid instant")?;
        Ok(Record::new(Level::WARN, "traffic", "queue is filling up\n").at(timestamp))
    }

    #[test]
    fn text_lines_carry_time_level_and_target() -> Result<(), Box<dyn Error>> {
        let mut out = Vec::new();
        TextFormatter::new(Zone::Utc).format(&record()?, &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "[2024-05-01 12:00:30.000] [warn] [traffic] queue is filling up\n"
        );
        Ok(())
    }

    #[test]
    fn text_lines_skip_an_empty_target() -> Result<(), Box<dyn Error>> {
        let mut record = record()?;
        record.target.clear();
        let mut out = Vec::new();
        TextFormatter::new(Zone::Utc).format(&record, &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "[2024-05-01 12:00:30.000] [warn] queue is filling up\n"
        );
        Ok(())
    }

    #[test]
    fn json_lines_parse_back() -> Result<(), Box<dyn Error>> {
        let mut out = Vec::new();
        formatter_for(RecordFormat::Json, Zone::Local).format(&record()?, &mut out)?;
        assert_eq!(out.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(value["timestamp"], "2024-05-01T12:00:30.000Z");
        assert_eq!(value["level"], "warn");
        assert_eq!(value["target"], "traffic");
        assert_eq!(value["message"], "queue is filling up");
        Ok(())
    }
}
