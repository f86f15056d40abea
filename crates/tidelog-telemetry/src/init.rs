//! Telemetry initialisation primitives and logging configuration.
//!
//! # Design
//! - One entry point installs the subscriber; the caller supplies the writer.
//! - The writer receives bare messages; timestamps and levels are added downstream.
//! - An optional stderr mirror keeps the usual fmt output for interactive runs.
//! - Records the build SHA once to avoid inconsistencies across modules.

use std::io;

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber writing into `writer`.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging<W>(config: &LoggingConfig<'_>, writer: W) -> Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    BUILD_SHA
        .set(config.build_sha.to_string())
        .ok()
        .or(Some(()));

    build_subscriber(config, writer)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Assemble the subscriber without installing it.
///
/// Useful for scoped installation through `tracing::subscriber::with_default`.
pub fn build_subscriber<W>(
    config: &LoggingConfig<'_>,
    writer: W,
) -> impl Subscriber + Send + Sync + use<W>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let console = config.console.map(|format| match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_ids(false)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_writer(io::stderr)
            .boxed(),
    });

    let file = fmt::layer()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(build_env_filter(config.level))
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level string (e.g., `info`, `debug`), overridden by `RUST_LOG`.
    pub level: &'a str,
    /// Optional stderr mirror and its format.
    pub console: Option<LogFormat>,
    /// Build identifier recorded during initialisation.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            console: None,
            build_sha: build_sha(),
        }
    }
}

/// Available output formats for the stderr mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Derive the console mirror format from a configuration map.
///
/// `"off"` (or a missing key) disables the mirror; unknown names fall back to
/// [`LogFormat::infer`].
#[must_use]
pub fn log_format_from_config(config: Option<&serde_json::Value>) -> Option<LogFormat> {
    config
        .and_then(|value| value.get("console"))
        .and_then(|value| value.as_str())
        .and_then(|value| match value {
            "off" => None,
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => Some(LogFormat::infer()),
        })
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
