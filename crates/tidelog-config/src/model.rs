//! Typed configuration models for sinks and loggers.
//!
//! # Design
//! - Pure data carriers consumed by the sink crate.
//! - Each enum parses from and renders to the lowercase name used in documents.

use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Rotation cadence in whole minutes, between one minute and one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IntervalMinutes(NonZeroU32);

impl IntervalMinutes {
    /// Validate and wrap a minute count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when `minutes` is zero or longer than a day.
    pub fn new(minutes: u32) -> ConfigResult<Self> {
        let Some(value) = NonZeroU32::new(minutes) else {
            return Err(ConfigError::invalid(
                "sink",
                "interval_minutes",
                Some(minutes.to_string()),
                "must be positive",
            ));
        };
        if minutes > defaults::MAX_INTERVAL_MINUTES {
            return Err(ConfigError::invalid(
                "sink",
                "interval_minutes",
                Some(minutes.to_string()),
                "must not exceed 1440",
            ));
        }
        Ok(Self(value))
    }

    /// Minute count as a plain integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for IntervalMinutes {
    fn default() -> Self {
        match NonZeroU32::new(defaults::INTERVAL_MINUTES) {
            Some(value) => Self(value),
            None => Self(NonZeroU32::MIN),
        }
    }
}

impl TryFrom<u32> for IntervalMinutes {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IntervalMinutes> for u32 {
    fn from(value: IntervalMinutes) -> Self {
        value.get()
    }
}

impl fmt::Display for IntervalMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.get())
    }
}

/// How hard the sink pushes each record towards stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Flush userspace buffers after every record.
    Flush,
    /// Flush and `fdatasync` after every record.
    #[default]
    Sync,
}

impl Durability {
    /// Render the policy as its lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flush => "flush",
            Self::Sync => "sync",
        }
    }
}

impl FromStr for Durability {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flush" => Ok(Self::Flush),
            "sync" => Ok(Self::Sync),
            other => Err(ConfigError::invalid(
                "sink",
                "durability",
                Some(other.to_string()),
                "expected flush or sync",
            )),
        }
    }
}

/// Time zone used to align boundaries and stamp archived file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// The host's local time zone.
    #[default]
    Local,
    /// Coordinated universal time.
    Utc,
}

impl Zone {
    /// Render the zone as its lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Utc => "utc",
        }
    }
}

impl FromStr for Zone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(ConfigError::invalid(
                "sink",
                "zone",
                Some(other.to_string()),
                "expected local or utc",
            )),
        }
    }
}

/// Construction parameters for a rotating file sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Canonical path of the active file.
    pub base_path: PathBuf,
    /// Rotation cadence.
    pub interval: IntervalMinutes,
    /// Truncate the active file when it is opened.
    pub truncate: bool,
    /// Per-record durability policy.
    pub durability: Durability,
    /// Zone for boundary alignment and archive names.
    pub zone: Zone,
}

impl SinkConfig {
    /// Build a configuration with default durability and zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the path is empty or the
    /// interval is out of range.
    pub fn new(base_path: impl Into<PathBuf>, interval_minutes: u32) -> ConfigResult<Self> {
        let base_path = base_path.into();
        validate_base_path(&base_path)?;
        Ok(Self {
            base_path,
            interval: IntervalMinutes::new(interval_minutes)?,
            truncate: false,
            durability: Durability::default(),
            zone: Zone::default(),
        })
    }

    /// Set the truncate-on-open flag.
    #[must_use]
    pub const fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Set the durability policy.
    #[must_use]
    pub const fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Set the alignment zone.
    #[must_use]
    pub const fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }
}

pub(crate) fn validate_base_path(path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid(
            "sink",
            "path",
            None,
            "must not be empty",
        ));
    }
    if path.file_name().is_none() {
        return Err(ConfigError::invalid(
            "sink",
            "path",
            Some(path.display().to_string()),
            "must name a file",
        ));
    }
    Ok(())
}

/// Rendering used for records written by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// `[timestamp] [level] [target] message` lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl RecordFormat {
    /// Render the format as its lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl FromStr for RecordFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::invalid(
                "logger",
                "format",
                Some(other.to_string()),
                "expected text or json",
            )),
        }
    }
}

/// What happens when a producer finds the delivery queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the worker frees a slot.
    #[default]
    Block,
    /// Displace the oldest queued record.
    OverrunOldest,
    /// Drop the incoming record.
    DiscardNew,
}

impl OverflowPolicy {
    /// Render the policy as its snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::OverrunOldest => "overrun_oldest",
            Self::DiscardNew => "discard_new",
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "overrun_oldest" => Ok(Self::OverrunOldest),
            "discard_new" => Ok(Self::DiscardNew),
            other => Err(ConfigError::invalid(
                "delivery",
                "overflow",
                Some(other.to_string()),
                "expected block, overrun_oldest or discard_new",
            )),
        }
    }
}

/// How records travel from producers to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Producers write through a shared lock on the caller's thread.
    #[default]
    Direct,
    /// Producers enqueue; a dedicated worker thread writes.
    Queued {
        /// Maximum number of records waiting for the worker.
        capacity: NonZeroUsize,
        /// Behavior when the queue is full.
        overflow: OverflowPolicy,
    },
}

impl Delivery {
    /// Queued delivery with the default capacity.
    #[must_use]
    pub const fn queued(overflow: OverflowPolicy) -> Self {
        Self::Queued {
            capacity: default_queue_capacity(),
            overflow,
        }
    }
}

/// Queue capacity used when a document or builder does not set one.
#[must_use]
pub const fn default_queue_capacity() -> NonZeroUsize {
    match NonZeroUsize::new(defaults::QUEUE_CAPACITY) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    }
}

/// Parse a level name, accepting `critical` as an alias for `error`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unknown names.
pub fn parse_level(value: &str) -> ConfigResult<LevelFilter> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "critical" | "err" => Ok(LevelFilter::ERROR),
        "warning" => Ok(LevelFilter::WARN),
        other => other.parse::<LevelFilter>().map_err(|_| {
            ConfigError::invalid(
                "logger",
                "level",
                Some(value.to_string()),
                "expected trace, debug, info, warn, error, critical or off",
            )
        }),
    }
}

/// Everything needed to assemble one logger pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Logger name, used in diagnostics.
    pub name: String,
    /// Most verbose level that is delivered.
    pub level: LevelFilter,
    /// Rendering of records in the file.
    pub format: RecordFormat,
    /// The rotating file sink.
    pub sink: SinkConfig,
    /// Delivery mode.
    pub delivery: Delivery,
}

impl LoggerConfig {
    /// Logger with default name, level, format and direct delivery.
    #[must_use]
    pub fn new(sink: SinkConfig) -> Self {
        Self {
            name: defaults::LOGGER_NAME.to_string(),
            level: LevelFilter::INFO,
            format: RecordFormat::default(),
            sink,
            delivery: Delivery::default(),
        }
    }
}
