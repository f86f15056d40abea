//! Explicitly constructed logger handles.
//!
//! # Design
//! - No process-wide statics: a `Logger` is built from configuration and passed
//!   to whatever needs it; clones share one pipeline.
//! - Direct delivery locks one fan-out per record; queued delivery hands records
//!   to the worker, which is the sink's only caller.
//! - Teardown is explicit through `shutdown`, and implicit when the last clone drops.

use std::fmt;
use std::sync::{Arc, Mutex};

use tidelog_config::{Delivery, LoggerConfig};
use tidelog_telemetry::Metrics;
use tracing::Level;
use tracing::level_filters::LevelFilter;

use crate::bridge::DeliveryGuard;
use crate::dispatch::{FanOut, Sink};
use crate::error::{SinkError, SinkResult};
use crate::events::FileEventHandlers;
use crate::format::formatter_for;
use crate::naming::FileNamer;
use crate::record::Record;
use crate::sink::{RotatingFileSink, RotatingFileSinkBuilder};
use crate::worker::{AsyncSink, ErrorHandler};

/// Cloneable handle to one logging pipeline.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    name: String,
    level: LevelFilter,
    pipeline: Pipeline,
}

enum Pipeline {
    Direct(Mutex<FanOut>),
    Queued(AsyncSink),
}

/// Collaborators for a [`Logger`].
pub struct LoggerBuilder {
    config: LoggerConfig,
    sink: RotatingFileSinkBuilder,
    extra: Vec<Box<dyn Sink>>,
    metrics: Option<Metrics>,
    on_error: Option<ErrorHandler>,
}

impl LoggerBuilder {
    /// Report sink and queue activity into `metrics`.
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.sink = self.sink.metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Lifecycle callbacks for the rotating file.
    #[must_use]
    pub fn handlers(mut self, handlers: FileEventHandlers) -> Self {
        self.sink = self.sink.handlers(handlers);
        self
    }

    /// Archive naming strategy for the rotating file.
    #[must_use]
    pub fn namer(mut self, namer: impl FileNamer + 'static) -> Self {
        self.sink = self.sink.namer(namer);
        self
    }

    /// Another destination receiving every record after the rotating file.
    #[must_use]
    pub fn also(mut self, sink: impl Sink + 'static) -> Self {
        self.extra.push(Box::new(sink));
        self
    }

    /// Handler for failures on the queued worker thread.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&SinkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Open the rotating file and start delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the base file cannot be opened and
    /// [`SinkError::Spawn`] when the worker cannot start.
    pub fn build(self) -> SinkResult<Logger> {
        let Self {
            config,
            sink,
            extra,
            metrics,
            on_error,
        } = self;

        let mut fan_out = FanOut::new().with(sink.open()?);
        for sink in extra {
            fan_out.push(sink);
        }

        let pipeline = match config.delivery {
            Delivery::Direct => Pipeline::Direct(Mutex::new(fan_out)),
            Delivery::Queued { capacity, overflow } => {
                let mut worker = AsyncSink::builder(fan_out)
                    .capacity(capacity)
                    .overflow(overflow);
                if let Some(metrics) = metrics {
                    worker = worker.metrics(metrics);
                }
                if let Some(handler) = on_error {
                    worker = worker.on_error(move |err| handler(err));
                }
                Pipeline::Queued(worker.spawn()?)
            }
        };

        Ok(Logger {
            inner: Arc::new(LoggerInner {
                name: config.name,
                level: config.level,
                pipeline,
            }),
        })
    }
}

impl Logger {
    /// Start building a logger for `config`.
    #[must_use]
    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        let formatter = formatter_for(config.format, config.sink.zone);
        LoggerBuilder {
            sink: RotatingFileSink::builder(config.sink.clone()).boxed_formatter(formatter),
            config,
            extra: Vec::new(),
            metrics: None,
            on_error: None,
        }
    }

    /// Build a logger with default collaborators.
    ///
    /// # Errors
    ///
    /// Same as [`LoggerBuilder::build`].
    pub fn from_config(config: &LoggerConfig, metrics: Option<Metrics>) -> SinkResult<Self> {
        let builder = Self::builder(config.clone());
        match metrics {
            Some(metrics) => builder.metrics(metrics).build(),
            None => builder.build(),
        }
    }

    /// Logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Most verbose level that is delivered.
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.inner.level
    }

    /// Whether records at `level` pass the filter.
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.inner.level
    }

    /// Deliver `record` if its level passes the filter.
    ///
    /// # Errors
    ///
    /// Direct delivery returns the sink's failure; queued delivery only fails
    /// once the worker is shut down.
    pub fn log(&self, record: Record) -> SinkResult<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        let _delivering = DeliveryGuard::enter();
        match &self.inner.pipeline {
            Pipeline::Direct(fan_out) => fan_out
                .lock()
                .map_err(|_| SinkError::Poisoned)?
                .log(&record),
            Pipeline::Queued(worker) => worker.log(record),
        }
    }

    /// Log `message` with the logger name as target.
    ///
    /// # Errors
    ///
    /// Same as [`Self::log`].
    pub fn emit(&self, level: Level, message: impl Into<String>) -> SinkResult<()> {
        self.log(Record::new(level, self.inner.name.as_str(), message))
    }

    /// Flush every destination; with queued delivery, wait for the queue first.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure.
    pub fn flush(&self) -> SinkResult<()> {
        let _delivering = DeliveryGuard::enter();
        match &self.inner.pipeline {
            Pipeline::Direct(fan_out) => fan_out.lock().map_err(|_| SinkError::Poisoned)?.flush(),
            Pipeline::Queued(worker) => worker.flush(),
        }
    }

    /// Flush and, with queued delivery, stop the worker.
    ///
    /// Later records are refused with [`SinkError::QueueClosed`] when queued;
    /// direct delivery keeps working.
    ///
    /// # Errors
    ///
    /// Returns the flush failure or [`SinkError::WorkerPanicked`].
    pub fn shutdown(&self) -> SinkResult<()> {
        let _delivering = DeliveryGuard::enter();
        match &self.inner.pipeline {
            Pipeline::Direct(fan_out) => fan_out.lock().map_err(|_| SinkError::Poisoned)?.flush(),
            Pipeline::Queued(worker) => worker.shutdown(),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delivery = match &self.inner.pipeline {
            Pipeline::Direct(_) => "direct",
            Pipeline::Queued(_) => "queued",
        };
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("level", &self.inner.level)
            .field("delivery", &delivery)
            .finish()
    }
}

impl fmt::Debug for LoggerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerBuilder")
            .field("config", &self.config)
            .field("sink", &self.sink)
            .field("extra", &self.extra.len())
            .finish_non_exhaustive()
    }
}
