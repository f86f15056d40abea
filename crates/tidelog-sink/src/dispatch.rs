//! Sink abstraction and fan-out.
//!
//! # Design
//! - `Sink` is the seam between record producers and destinations.
//! - `FanOut` hands each record to every child even when an earlier one fails.

use std::fmt;

use crate::error::SinkResult;
use crate::record::Record;
use crate::shared::SharedRotatingFileSink;
use crate::sink::RotatingFileSink;

/// A destination for records.
///
/// Implementations are driven by one caller at a time (a mutex holder or the
/// delivery worker), hence `&mut self`.
pub trait Sink: Send {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Returns the destination's failure for this record.
    fn log(&mut self, record: &Record) -> SinkResult<()>;

    /// Push buffered output to its destination.
    ///
    /// # Errors
    ///
    /// Returns the destination's flush failure.
    fn flush(&mut self) -> SinkResult<()>;
}

impl Sink for RotatingFileSink {
    fn log(&mut self, record: &Record) -> SinkResult<()> {
        self.write(record).map(|_| ())
    }

    fn flush(&mut self) -> SinkResult<()> {
        Self::flush(self)
    }
}

impl Sink for SharedRotatingFileSink {
    fn log(&mut self, record: &Record) -> SinkResult<()> {
        self.write(record).map(|_| ())
    }

    fn flush(&mut self) -> SinkResult<()> {
        Self::flush(self)
    }
}

impl Sink for Box<dyn Sink> {
    fn log(&mut self, record: &Record) -> SinkResult<()> {
        (**self).log(record)
    }

    fn flush(&mut self) -> SinkResult<()> {
        (**self).flush()
    }
}

/// Forwards every record to each child sink in insertion order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanOut {
    /// Empty fan-out.
    #[must_use]
    pub const fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a child, builder style.
    #[must_use]
    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.push(sink);
        self
    }

    /// Add a child.
    pub fn push(&mut self, sink: impl Sink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Number of children.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no child was added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for FanOut {
    /// Every child sees the record; the first failure is returned.
    fn log(&mut self, record: &Record) -> SinkResult<()> {
        let mut first = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.log(record) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn flush(&mut self) -> SinkResult<()> {
        let mut first = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.flush() {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
