#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Time-interval rotating log files.
//!
//! A [`RotatingFileSink`] always writes to one base path. When a record's
//! timestamp reaches the end of the current slot, the file is closed, renamed
//! to a name stamped with the slot it covered, and a fresh base file is opened.
//! Slots sit on a grid of `interval` minutes anchored at midnight.
//!
//! The sink is single-threaded; [`SharedRotatingFileSink`] adds a lock and
//! [`AsyncSink`] moves writing onto a worker thread. [`Logger`] assembles a
//! complete pipeline from configuration and doubles as a `tracing` writer.

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod events;
mod file;
pub mod format;
pub mod logger;
pub mod naming;
pub mod record;
pub mod schedule;
pub mod shared;
pub mod sink;
pub mod worker;

pub use bridge::LogWriter;
pub use dispatch::{FanOut, Sink};
pub use error::{SinkError, SinkResult};
pub use events::FileEventHandlers;
pub use format::{JsonFormatter, RecordFormatter, TextFormatter, formatter_for};
pub use logger::{Logger, LoggerBuilder};
pub use naming::{FileNamer, IntervalNamer, MAX_NAME_ATTEMPTS, ResolvedName, resolve_archive_path};
pub use record::{Record, level_name};
pub use schedule::Slot;
pub use shared::SharedRotatingFileSink;
pub use sink::{RotatingFileSink, RotatingFileSinkBuilder, Rotation, WriteOutcome};
pub use worker::{AsyncSink, AsyncSinkBuilder, ErrorHandler};
