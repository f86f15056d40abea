//! Queued delivery through a dedicated worker thread.
//!
//! # Design
//! - Producers push into a bounded lock-free queue and never touch the file.
//! - The worker is the only caller of the wrapped sink, so it needs no lock.
//! - Overflow follows the configured policy; every lost record is counted.
//! - `flush` waits for everything accepted before it to reach the sink.
//! - Shutdown drains the queue, flushes and joins; dropping the handle does the same.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use crossbeam::sync::{Parker, Unparker};
use crossbeam::utils::Backoff;
use tidelog_config::{OverflowPolicy, default_queue_capacity};
use tidelog_telemetry::Metrics;
use tracing::{error, warn};

use crate::bridge::DeliveryGuard;
use crate::dispatch::Sink;
use crate::error::{SinkError, SinkResult};
use crate::record::Record;

const IDLE_PARK: Duration = Duration::from_millis(100);
const FLUSH_WAIT: Duration = Duration::from_millis(1);

/// Callback receiving failures that happen on the worker thread.
pub type ErrorHandler = Arc<dyn Fn(&SinkError) + Send + Sync>;

struct Shared {
    queue: ArrayQueue<Record>,
    closed: AtomicBool,
    running: AtomicBool,
    flush_requested: AtomicU64,
    flush_completed: AtomicU64,
    dropped: AtomicU64,
}

/// Handle to a worker thread that owns a [`Sink`].
pub struct AsyncSink {
    shared: Arc<Shared>,
    unparker: Unparker,
    overflow: OverflowPolicy,
    metrics: Option<Metrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Options for [`AsyncSink`].
pub struct AsyncSinkBuilder<S> {
    sink: S,
    capacity: NonZeroUsize,
    overflow: OverflowPolicy,
    metrics: Option<Metrics>,
    on_error: Option<ErrorHandler>,
}

impl<S> AsyncSinkBuilder<S>
where
    S: Sink + 'static,
{
    /// Queue capacity.
    #[must_use]
    pub const fn capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Behavior when the queue is full.
    #[must_use]
    pub const fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Metrics registry for queue depth and drops.
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the default handler, which logs worker failures at error level.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&SinkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Spawn`] when the thread cannot be created.
    pub fn spawn(self) -> SinkResult<AsyncSink> {
        let Self {
            sink,
            capacity,
            overflow,
            metrics,
            on_error,
        } = self;
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity.get()),
            closed: AtomicBool::new(false),
            running: AtomicBool::new(true),
            flush_requested: AtomicU64::new(0),
            flush_completed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });
        let parker = Parker::new();
        let unparker = parker.unparker().clone();
        let on_error = on_error.unwrap_or_else(|| Arc::new(log_worker_error));

        let worker = Worker {
            shared: Arc::clone(&shared),
            parker,
            sink,
            on_error,
            metrics: metrics.clone(),
        };
        let handle = thread::Builder::new()
            .name("tidelog-worker".to_string())
            .spawn(move || worker.run())
            .map_err(|source| SinkError::Spawn { source })?;

        Ok(AsyncSink {
            shared,
            unparker,
            overflow,
            metrics,
            worker: Mutex::new(Some(handle)),
        })
    }
}

impl AsyncSink {
    /// Wrap `sink` with the default capacity and blocking overflow.
    #[must_use]
    pub fn builder<S>(sink: S) -> AsyncSinkBuilder<S>
    where
        S: Sink + 'static,
    {
        AsyncSinkBuilder {
            sink,
            capacity: default_queue_capacity(),
            overflow: OverflowPolicy::Block,
            metrics: None,
            on_error: None,
        }
    }

    /// Queue `record` for the worker.
    ///
    /// A record lost to `OverrunOldest` or `DiscardNew` is not an error; it is
    /// counted in [`Self::dropped`] and in metrics.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::QueueClosed`] after shutdown.
    pub fn log(&self, record: Record) -> SinkResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SinkError::QueueClosed);
        }
        match self.overflow {
            OverflowPolicy::Block => self.push_blocking(record)?,
            OverflowPolicy::OverrunOldest => {
                if self.shared.queue.force_push(record).is_some() {
                    self.count_drop();
                }
            }
            OverflowPolicy::DiscardNew => {
                if self.shared.queue.push(record).is_err() {
                    self.count_drop();
                }
            }
        }
        self.unparker.unpark();
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(depth(&self.shared.queue));
        }
        Ok(())
    }

    /// Wait until every record accepted so far has been handed to the sink
    /// and the sink has been flushed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::QueueClosed`] when the worker is gone.
    pub fn flush(&self) -> SinkResult<()> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(SinkError::QueueClosed);
        }
        let ticket = self.shared.flush_requested.fetch_add(1, Ordering::SeqCst) + 1;
        self.unparker.unpark();
        let backoff = Backoff::new();
        while self.shared.flush_completed.load(Ordering::SeqCst) < ticket {
            if !self.shared.running.load(Ordering::SeqCst)
                && self.shared.flush_completed.load(Ordering::SeqCst) < ticket
            {
                return Err(SinkError::QueueClosed);
            }
            if backoff.is_completed() {
                thread::sleep(FLUSH_WAIT);
            } else {
                backoff.snooze();
            }
        }
        Ok(())
    }

    /// Stop accepting records, drain the queue, flush and join the worker.
    ///
    /// Records pushed concurrently with shutdown may be refused. Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::WorkerPanicked`] when the worker thread panicked.
    pub fn shutdown(&self) -> SinkResult<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.unparker.unpark();
        let handle = self
            .worker
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .take();
        match handle {
            Some(handle) => handle.join().map_err(|_| SinkError::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Records waiting for the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Records lost to the overflow policy since start.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Active overflow policy.
    #[must_use]
    pub const fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    fn push_blocking(&self, mut record: Record) -> SinkResult<()> {
        let backoff = Backoff::new();
        loop {
            match self.shared.queue.push(record) {
                Ok(()) => return Ok(()),
                Err(rejected) => record = rejected,
            }
            if self.shared.closed.load(Ordering::SeqCst)
                || !self.shared.running.load(Ordering::SeqCst)
            {
                return Err(SinkError::QueueClosed);
            }
            self.unparker.unpark();
            if backoff.is_completed() {
                thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }

    fn count_drop(&self) {
        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.inc_record_dropped(self.overflow.as_str());
        }
    }
}

impl Sink for AsyncSink {
    fn log(&mut self, record: &Record) -> SinkResult<()> {
        Self::log(self, record.clone())
    }

    fn flush(&mut self) -> SinkResult<()> {
        Self::flush(self)
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "log worker did not shut down cleanly");
        }
    }
}

impl fmt::Debug for AsyncSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSink")
            .field("overflow", &self.overflow)
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

struct Worker<S> {
    shared: Arc<Shared>,
    parker: Parker,
    sink: S,
    on_error: ErrorHandler,
    metrics: Option<Metrics>,
}

impl<S: Sink> Worker<S> {
    fn run(mut self) {
        let _delivering = DeliveryGuard::enter();
        loop {
            let closed = self.shared.closed.load(Ordering::SeqCst);
            let requested = self.shared.flush_requested.load(Ordering::SeqCst);
            self.drain();
            if requested > self.shared.flush_completed.load(Ordering::SeqCst) {
                self.flush();
                self.shared
                    .flush_completed
                    .store(requested, Ordering::SeqCst);
            }
            if closed {
                break;
            }
            self.parker.park_timeout(IDLE_PARK);
        }
        self.drain();
        self.flush();
        self.shared.flush_completed.store(u64::MAX, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
    }

    fn drain(&mut self) {
        while let Some(record) = self.shared.queue.pop() {
            if let Err(err) = self.sink.log(&record) {
                self.fail(&err);
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(depth(&self.shared.queue));
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.sink.flush() {
            self.fail(&err);
        }
    }

    fn fail(&self, err: &SinkError) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_sink_error(err.kind());
        }
        (self.on_error)(err);
    }
}

fn log_worker_error(err: &SinkError) {
    error!(error = %err, kind = err.kind(), fatal = err.is_fatal(), "log worker failed to deliver");
}

fn depth(queue: &ArrayQueue<Record>) -> i64 {
    i64::try_from(queue.len()).unwrap_or(i64::MAX)
}
