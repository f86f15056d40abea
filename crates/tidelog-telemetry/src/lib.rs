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

//! Telemetry primitives for tidelog.
//!
//! This crate wires `tracing` output into any `MakeWriter` (usually a rotating
//! file logger) and keeps the Prometheus counters that describe sink activity.
//! It does not depend on the sink itself, so the sink can report into it.

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, build_subscriber, init_logging,
    log_format_from_config,
};
pub use metrics::{Metrics, MetricsSnapshot};
