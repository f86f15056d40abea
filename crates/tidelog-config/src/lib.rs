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

//! Typed configuration for tidelog sinks and loggers.
//!
//! Layout: `model.rs` (typed config models), `validate.rs` (field parsing
//! helpers), `loader.rs` (JSON documents and `TIDELOG_*` environment loading).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_DURABILITY, ENV_FORMAT, ENV_INTERVAL_MINUTES, ENV_LEVEL, ENV_OVERFLOW, ENV_PATH,
    ENV_QUEUE_CAPACITY, ENV_TRUNCATE, ENV_ZONE,
};
pub use model::{
    Delivery, Durability, IntervalMinutes, LoggerConfig, OverflowPolicy, RecordFormat, SinkConfig,
    Zone, default_queue_capacity, parse_level,
};
pub use tracing::level_filters::LevelFilter;
