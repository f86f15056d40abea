//! `tracing` integration: a [`Logger`] is a `MakeWriter`.
//!
//! # Design
//! - Each formatted event becomes one record; level and target come from the
//!   event metadata, the timestamp from the moment the line is committed.
//! - Output produced while a thread is already inside the pipeline (sink
//!   diagnostics, worker failures) goes to stderr instead of back into the sink.
//! - Partial lines are held until a newline or until the writer drops.

use std::cell::Cell;
use std::io::{self, Write};

use chrono::Utc;
use tracing::{Level, Metadata, warn};
use tracing_subscriber::fmt::MakeWriter;

use crate::logger::Logger;
use crate::record::Record;

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the pipeline until dropped.
pub(crate) struct DeliveryGuard {
    previous: bool,
}

impl DeliveryGuard {
    pub(crate) fn enter() -> Self {
        Self {
            previous: DELIVERING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(self.previous));
    }
}

fn delivering() -> bool {
    DELIVERING.with(Cell::get)
}

/// Writer handed to `tracing_subscriber::fmt` for one event.
pub struct LogWriter {
    logger: Logger,
    level: Level,
    target: String,
    divert: bool,
    buffer: LineBuffer,
}

impl LogWriter {
    fn new(logger: &Logger, level: Level, target: &str) -> Self {
        Self {
            logger: logger.clone(),
            level,
            target: target.to_string(),
            divert: delivering(),
            buffer: LineBuffer::default(),
        }
    }

    fn commit(&self, message: String) -> io::Result<()> {
        if message.is_empty() {
            return Ok(());
        }
        let record = Record {
            timestamp: Utc::now(),
            level: self.level,
            target: self.target.clone(),
            message,
        };
        self.logger.log(record).map_err(io::Error::other)
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.divert {
            io::stderr().write_all(buf)?;
            return Ok(buf.len());
        }
        for line in self.buffer.push(buf) {
            self.commit(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.divert {
            return io::stderr().flush();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let Some(line) = self.buffer.finish() else {
            return;
        };
        if let Err(err) = self.commit(line) {
            let _delivering = DeliveryGuard::enter();
            warn!(error = %err, "dropping trailing log line");
        }
    }
}

impl<'a> MakeWriter<'a> for Logger {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::new(self, Level::INFO, "")
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LogWriter::new(self, *meta.level(), meta.target())
    }
}

#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last) = self.pending.iter().rposition(|byte| *byte == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last).collect();
        complete[..last]
            .split(|byte| *byte == b'\n')
            .map(trim_line)
            .collect()
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = trim_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn trim_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fs;
    use std::path::Path;

    use tidelog_config::{LoggerConfig, SinkConfig, Zone};
    use tidelog_telemetry::{LoggingConfig, build_subscriber};

    use crate::dispatch::Sink;
    use crate::error::SinkResult;

    fn read_all(dir: &Path) -> Result<String, Box<dyn Error>> {
        let mut names = fs::read_dir(dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        let mut contents = String::new();
        for name in names {
            contents.push_str(&fs::read_to_string(name)?);
        }
        Ok(contents)
    }

    fn telemetry() -> LoggingConfig<'static> {
        LoggingConfig {
            level: "info",
            console: None,
            build_sha: "test",
        }
    }

    #[test]
    fn line_buffer_splits_on_newlines() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"alpha\nbeta\n"), vec!["alpha", "beta"]);
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn line_buffer_holds_partial_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"alp").is_empty());
        assert_eq!(buffer.push(b"ha\r\nbe"), vec!["alpha"]);
        assert_eq!(buffer.finish().as_deref(), Some("be"));
    }

    #[test]
    fn guard_restores_the_previous_state() {
        assert!(!delivering());
        {
            let _outer = DeliveryGuard::enter();
            {
                let _inner = DeliveryGuard::enter();
                assert!(delivering());
            }
            assert!(delivering());
        }
        assert!(!delivering());
    }

    #[test]
    fn tracing_events_become_records() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let sink = SinkConfig::new(dir.path().join("app.log"), 1440)?.with_zone(Zone::Utc);
        let logger = Logger::from_config(&LoggerConfig::new(sink), None)?;

        tracing::subscriber::with_default(build_subscriber(&telemetry(), logger.clone()), || {
            tracing::info!(target: "bridge", answer = 42, "hello");
            tracing::debug!(target: "bridge", "filtered");
        });
        logger.flush()?;

        let contents = read_all(dir.path())?;
        assert!(contents.contains("[info] [bridge] hello answer=42"));
        assert!(!contents.contains("filtered"));
        Ok(())
    }

    #[test]
    fn events_raised_inside_the_pipeline_are_diverted() -> Result<(), Box<dyn Error>> {
        struct Chatty;

        impl Sink for Chatty {
            fn log(&mut self, record: &Record) -> SinkResult<()> {
                tracing::info!(target: "chatty", "saw {}", record.message);
                Ok(())
            }

            fn flush(&mut self) -> SinkResult<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir()?;
        let sink = SinkConfig::new(dir.path().join("app.log"), 1440)?.with_zone(Zone::Utc);
        let logger = Logger::builder(LoggerConfig::new(sink)).also(Chatty).build()?;

        tracing::subscriber::with_default(build_subscriber(&telemetry(), logger.clone()), || {
            tracing::info!(target: "bridge", "outside");
        });
        logger.flush()?;

        let contents = read_all(dir.path())?;
        assert_eq!(contents.matches("outside").count(), 1);
        assert!(!contents.contains("saw"));
        Ok(())
    }
}
