//! The time-interval rotating file sink.
//!
//! # Design
//! - The active file always lives at the base path; history is renamed away.
//! - A record at or past the boundary rotates before it is written, at most once.
//! - The next boundary comes from the triggering record's time, not from
//!   repeatedly adding the interval.
//! - Every record is flushed (and optionally synced) before `write` returns.
//! - A fatal rotation failure drops the handle; the sink then refuses writes.

use std::fmt;
use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tidelog_config::{Durability, IntervalMinutes, SinkConfig, Zone};
use tidelog_telemetry::Metrics;
use tracing::{debug, warn};

use crate::error::{SinkError, SinkResult};
use crate::events::FileEventHandlers;
use crate::file::ActiveFile;
use crate::format::{RecordFormatter, TextFormatter};
use crate::naming::{FileNamer, IntervalNamer, resolve_archive_path};
use crate::record::Record;
use crate::schedule::Slot;

/// What a successful write did besides appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record went into the current file.
    Appended,
    /// The current file was retired first.
    Rotated(Rotation),
}

/// Details of a completed rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// Archive name of the closed file; `None` when an untouched initial file was deleted.
    pub archived: Option<PathBuf>,
    /// Wall-clock start of the slot that was closed.
    pub closed_label: NaiveDateTime,
    /// Boundary of the freshly opened file.
    pub next_boundary: DateTime<Utc>,
}

/// Writes records to one file and retires it at every interval boundary.
///
/// Not synchronised: wrap it in [`crate::SharedRotatingFileSink`] when
/// several threads write, or give it to a single delivery worker.
pub struct RotatingFileSink {
    base_path: PathBuf,
    interval: IntervalMinutes,
    zone: Zone,
    truncate: bool,
    durability: Durability,
    slot: Slot,
    active: Option<ActiveFile>,
    discard_if_empty: bool,
    formatter: Box<dyn RecordFormatter>,
    namer: Box<dyn FileNamer>,
    handlers: FileEventHandlers,
    metrics: Option<Metrics>,
    buffer: Vec<u8>,
}

/// Collaborators for a [`RotatingFileSink`]; everything but the config is optional.
pub struct RotatingFileSinkBuilder {
    config: SinkConfig,
    formatter: Option<Box<dyn RecordFormatter>>,
    namer: Box<dyn FileNamer>,
    handlers: FileEventHandlers,
    metrics: Option<Metrics>,
}

impl RotatingFileSinkBuilder {
    /// Formatter used for [`RotatingFileSink::write`]; defaults to [`TextFormatter`] in the configured zone.
    #[must_use]
    pub fn formatter(mut self, formatter: impl RecordFormatter + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Boxed variant of [`Self::formatter`].
    #[must_use]
    pub fn boxed_formatter(mut self, formatter: Box<dyn RecordFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Archive naming strategy; defaults to [`IntervalNamer`].
    #[must_use]
    pub fn namer(mut self, namer: impl FileNamer + 'static) -> Self {
        self.namer = Box::new(namer);
        self
    }

    /// Lifecycle callbacks.
    #[must_use]
    pub fn handlers(mut self, handlers: FileEventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Metrics registry to report into.
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Open the base file, aligning the first boundary to the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the base file cannot be opened.
    pub fn open(self) -> SinkResult<RotatingFileSink> {
        self.open_at(Utc::now())
    }

    /// Open the base file as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the base file cannot be opened.
    pub fn open_at(self, now: DateTime<Utc>) -> SinkResult<RotatingFileSink> {
        let Self {
            config,
            formatter,
            namer,
            handlers,
            metrics,
        } = self;
        let SinkConfig {
            base_path,
            interval,
            truncate,
            durability,
            zone,
        } = config;

        let active = ActiveFile::open(&base_path, truncate, durability, &handlers)
            .inspect_err(|err| {
                if let Some(metrics) = &metrics {
                    metrics.inc_sink_error(err.kind());
                }
            })?;
        let discard_if_empty = active.is_empty();
        let slot = Slot::containing(now, interval, zone);
        debug!(
            path = %base_path.display(),
            interval = %interval,
            next_rotation = %slot.end(),
            "opened rotating log file"
        );

        Ok(RotatingFileSink {
            base_path,
            interval,
            zone,
            truncate,
            durability,
            slot,
            active: Some(active),
            discard_if_empty,
            formatter: formatter.unwrap_or_else(|| Box::new(TextFormatter::new(zone))),
            namer,
            handlers,
            metrics,
            buffer: Vec::new(),
        })
    }
}

impl RotatingFileSink {
    /// Start building a sink for `config`.
    #[must_use]
    pub fn builder(config: SinkConfig) -> RotatingFileSinkBuilder {
        RotatingFileSinkBuilder {
            config,
            formatter: None,
            namer: Box::new(IntervalNamer),
            handlers: FileEventHandlers::default(),
            metrics: None,
        }
    }

    /// Open a sink with default collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the base file cannot be opened.
    pub fn open(config: SinkConfig) -> SinkResult<Self> {
        Self::builder(config).open()
    }

    /// Format `record` and append it, rotating first when its time has reached the boundary.
    ///
    /// # Errors
    ///
    /// Fatal rotation failures close the sink. Append, flush and format
    /// failures affect only this record.
    pub fn write(&mut self, record: &Record) -> SinkResult<WriteOutcome> {
        let outcome = self.prepare(record.timestamp)?;
        let mut buffer = mem::take(&mut self.buffer);
        buffer.clear();
        let result = match self.formatter.format(record, &mut buffer) {
            Ok(()) => self.append(&buffer),
            Err(source) => Err(self.report(SinkError::Format { source })),
        };
        self.buffer = buffer;
        result.map(|()| outcome)
    }

    /// Append bytes that were already formatted, stamped with `timestamp`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`], minus formatter failures.
    pub fn write_rendered(
        &mut self,
        timestamp: DateTime<Utc>,
        bytes: &[u8],
    ) -> SinkResult<WriteOutcome> {
        let outcome = self.prepare(timestamp)?;
        self.append(bytes).map(|()| outcome)
    }

    /// Flush the active file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Flush`] or, after a fatal failure, [`SinkError::Closed`].
    pub fn flush(&mut self) -> SinkResult<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(self.report(self.closed()));
        };
        active.flush().map_err(|err| self.report(err))
    }

    /// Path of the active file; always the configured base path.
    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.base_path
    }

    /// Instant at which the next record will trigger a rotation.
    #[must_use]
    pub const fn next_rotation(&self) -> DateTime<Utc> {
        self.slot.end()
    }

    /// Rotation cadence.
    #[must_use]
    pub const fn interval(&self) -> IntervalMinutes {
        self.interval
    }

    /// Whether a fatal failure has closed the sink.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.active.is_none()
    }

    fn prepare(&mut self, timestamp: DateTime<Utc>) -> SinkResult<WriteOutcome> {
        if self.active.is_none() {
            return Err(self.report(self.closed()));
        }
        let outcome = if timestamp >= self.slot.end() {
            WriteOutcome::Rotated(self.rotate(timestamp)?)
        } else {
            WriteOutcome::Appended
        };
        self.discard_if_empty = false;
        Ok(outcome)
    }

    fn append(&mut self, bytes: &[u8]) -> SinkResult<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(self.report(self.closed()));
        };
        let result = active.append(bytes).and_then(|()| {
            if let Some(metrics) = &self.metrics {
                metrics.inc_record_written();
            }
            active.flush()
        });
        result.map_err(|err| self.report(err))
    }

    fn rotate(&mut self, trigger: DateTime<Utc>) -> SinkResult<Rotation> {
        let closed_label = self.slot.label();
        let Some(mut active) = self.active.take() else {
            return Err(self.report(self.closed()));
        };
        if let Err(err) = active.flush() {
            warn!(
                path = %self.base_path.display(),
                error = %err,
                "flush before rotation failed; archiving anyway"
            );
            self.report(err);
        }
        active.close(&self.handlers);

        let archived = if self.discard_if_empty {
            self.discard_initial_file()?;
            None
        } else {
            self.archive(closed_label)?
        };

        let reopened =
            ActiveFile::open(&self.base_path, self.truncate, self.durability, &self.handlers)
                .map_err(|err| self.report(err))?;
        self.active = Some(reopened);
        self.slot = Slot::containing(trigger, self.interval, self.zone);

        self.handlers
            .on_after_rotate(&self.base_path, archived.as_deref());
        if let Some(metrics) = &self.metrics {
            metrics.inc_rotation(trigger.timestamp());
        }
        debug!(
            path = %self.base_path.display(),
            archived = ?archived,
            next_rotation = %self.slot.end(),
            "rotated log file"
        );

        Ok(Rotation {
            archived,
            closed_label,
            next_boundary: self.slot.end(),
        })
    }

    fn discard_initial_file(&self) -> SinkResult<()> {
        match fs::remove_file(&self.base_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(self.report(SinkError::Remove {
                    path: self.base_path.clone(),
                    source,
                }));
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_empty_file_discarded();
        }
        Ok(())
    }

    fn archive(&self, label: NaiveDateTime) -> SinkResult<Option<PathBuf>> {
        let candidate = self.namer.archive_name(&self.base_path, label);
        let resolved =
            resolve_archive_path(self.namer.as_ref(), &candidate).map_err(|err| self.report(err))?;
        if resolved.collisions > 0 {
            debug!(
                candidate = %candidate.display(),
                chosen = %resolved.path.display(),
                "archive name already taken"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_name_collision();
            }
        }

        match fs::rename(&self.base_path, &resolved.path) {
            Ok(()) => Ok(Some(resolved.path)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    path = %self.base_path.display(),
                    "active log file vanished before rotation; nothing archived"
                );
                Ok(None)
            }
            Err(source) => Err(self.report(SinkError::Rename {
                from: self.base_path.clone(),
                to: resolved.path,
                source,
            })),
        }
    }

    fn closed(&self) -> SinkError {
        SinkError::Closed {
            path: self.base_path.clone(),
        }
    }

    fn report(&self, err: SinkError) -> SinkError {
        if let Some(metrics) = &self.metrics {
            metrics.inc_sink_error(err.kind());
        }
        err
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(err) = active.flush() {
                warn!(path = %self.base_path.display(), error = %err, "final flush failed");
            }
            active.close(&self.handlers);
        }
    }
}

impl fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("base_path", &self.base_path)
            .field("interval", &self.interval)
            .field("zone", &self.zone)
            .field("next_rotation", &self.slot.end())
            .field("closed", &self.active.is_none())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for RotatingFileSinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSinkBuilder")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::Level;

    fn at(hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>, Box<dyn Error>> {
        use chrono::TimeZone;
        Ok(Utc
            .with_ymd_and_hms(2024, 5, 1, hour, minute, second)
            .single()
            .ok_or("invalid instant")?)
    }

    fn config(dir: &Path, minutes: u32) -> Result<SinkConfig, Box<dyn Error>> {
        Ok(SinkConfig::new(dir.join("app.log"), minutes)?
            .with_zone(Zone::Utc)
            .with_durability(Durability::Flush))
    }

    #[test]
    fn boundary_is_aligned_at_open() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let sink = RotatingFileSink::builder(config(dir.path(), 5)?).open_at(at(12, 2, 30)?)?;
        assert_eq!(sink.next_rotation(), at(12, 5, 0)?);
        assert_eq!(sink.filename(), dir.path().join("app.log"));
        assert_eq!(sink.interval().get(), 5);
        assert!(!sink.is_closed());
        Ok(())
    }

    #[test]
    fn late_record_rotates_once_and_realigns() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let mut sink = RotatingFileSink::builder(config(dir.path(), 5)?).open_at(at(12, 0, 0)?)?;
        sink.write(&Record::new(Level::INFO, "", "first").at(at(12, 1, 0)?))?;

        let outcome = sink.write(&Record::new(Level::INFO, "", "late").at(at(15, 42, 10)?))?;
        let WriteOutcome::Rotated(rotation) = outcome else {
            return Err("expected a rotation".into());
        };
        assert_eq!(
            rotation.archived,
            Some(dir.path().join("app_2024-05-01-12-00.log"))
        );
        assert_eq!(rotation.next_boundary, at(15, 45, 0)?);
        assert_eq!(sink.next_rotation(), at(15, 45, 0)?);
        Ok(())
    }

    #[test]
    fn write_rendered_bypasses_the_formatter() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let mut sink = RotatingFileSink::builder(config(dir.path(), 1)?).open_at(at(12, 0, 0)?)?;
        sink.write_rendered(at(12, 0, 1)?, b"raw line\n")?;
        assert_eq!(fs::read_to_string(dir.path().join("app.log"))?, "raw line\n");
        Ok(())
    }

    #[test]
    fn reopen_failure_closes_the_sink() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        let mut sink = RotatingFileSink::builder(config(dir.path(), 1)?)
            .handlers(FileEventHandlers::default().before_open(move |path| {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    let _ = fs::create_dir(path);
                }
            }))
            .open_at(at(12, 0, 0)?)?;
        sink.write(&Record::new(Level::INFO, "", "kept").at(at(12, 0, 10)?))?;

        let err = sink
            .write(&Record::new(Level::INFO, "", "lost").at(at(12, 1, 10)?))
            .err();
        assert!(err.as_ref().is_some_and(SinkError::is_fatal), "{err:?}");
        assert!(sink.is_closed());
        assert!(matches!(
            sink.write(&Record::new(Level::INFO, "", "after").at(at(12, 1, 20)?)),
            Err(SinkError::Closed { .. })
        ));
        assert!(matches!(sink.flush(), Err(SinkError::Closed { .. })));
        assert_eq!(opens.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn metrics_follow_rotations_and_errors() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let metrics = Metrics::new()?;
        let mut sink = RotatingFileSink::builder(config(dir.path(), 1)?.with_truncate(true))
            .metrics(metrics.clone())
            .open_at(at(12, 0, 0)?)?;
        sink.write(&Record::new(Level::INFO, "", "one").at(at(12, 0, 30)?))?;
        sink.write(&Record::new(Level::INFO, "", "two").at(at(12, 1, 30)?))?;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_written_total, 2);
        assert_eq!(snapshot.rotations_total, 1);
        assert_eq!(snapshot.last_rotation_timestamp_seconds, at(12, 1, 30)?.timestamp());
        assert_eq!(snapshot.empty_files_discarded_total, 0);
        Ok(())
    }
}
