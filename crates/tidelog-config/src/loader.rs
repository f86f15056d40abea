//! Loading logger configuration from JSON documents and the environment.
//!
//! # Design
//! - Documents are validated field by field so errors name the offending field.
//! - Environment lookup is injectable to keep tests free of process-global state.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    Delivery, LoggerConfig, OverflowPolicy, RecordFormat, SinkConfig, default_queue_capacity,
    parse_level,
};
use crate::validate::{
    object, optional_bool, optional_str, optional_u32, parse_bool, parse_capacity, parse_u32,
    reject_unknown,
};

const LOGGER_FIELDS: &[&str] = &["name", "level", "format", "sink", "delivery"];
const SINK_FIELDS: &[&str] = &["path", "interval_minutes", "truncate", "durability", "zone"];
const DELIVERY_FIELDS: &[&str] = &["mode", "capacity", "overflow"];

/// Environment variable naming the active log file.
pub const ENV_PATH: &str = "TIDELOG_PATH";
/// Environment variable holding the rotation cadence in minutes.
pub const ENV_INTERVAL_MINUTES: &str = "TIDELOG_INTERVAL_MINUTES";
/// Environment variable toggling truncate-on-open.
pub const ENV_TRUNCATE: &str = "TIDELOG_TRUNCATE";
/// Environment variable holding the level filter.
pub const ENV_LEVEL: &str = "TIDELOG_LEVEL";
/// Environment variable selecting the record format.
pub const ENV_FORMAT: &str = "TIDELOG_FORMAT";
/// Environment variable selecting the alignment zone.
pub const ENV_ZONE: &str = "TIDELOG_ZONE";
/// Environment variable selecting the durability policy.
pub const ENV_DURABILITY: &str = "TIDELOG_DURABILITY";
/// Environment variable enabling queued delivery with the given capacity.
pub const ENV_QUEUE_CAPACITY: &str = "TIDELOG_QUEUE_CAPACITY";
/// Environment variable selecting the queue overflow policy.
pub const ENV_OVERFLOW: &str = "TIDELOG_OVERFLOW";

impl SinkConfig {
    /// Parse a sink section.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid or unknown field.
    pub fn from_json(value: &Value) -> ConfigResult<Self> {
        let map = object(value, "sink")?;
        reject_unknown(map, "sink", SINK_FIELDS)?;

        let path = optional_str(map, "sink", "path")?
            .ok_or_else(|| ConfigError::invalid("sink", "path", None, "is required"))?;
        let interval = optional_u32(map, "sink", "interval_minutes")?
            .unwrap_or(defaults::INTERVAL_MINUTES);
        let mut config = Self::new(path, interval)?;
        if let Some(truncate) = optional_bool(map, "sink", "truncate")? {
            config.truncate = truncate;
        }
        if let Some(durability) = optional_str(map, "sink", "durability")? {
            config.durability = durability.parse()?;
        }
        if let Some(zone) = optional_str(map, "sink", "zone")? {
            config.zone = zone.parse()?;
        }
        Ok(config)
    }
}

impl Delivery {
    /// Parse a delivery section.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid or unknown field.
    pub fn from_json(value: &Value) -> ConfigResult<Self> {
        let map = object(value, "delivery")?;
        reject_unknown(map, "delivery", DELIVERY_FIELDS)?;

        match optional_str(map, "delivery", "mode")?.unwrap_or("direct") {
            "direct" => Ok(Self::Direct),
            "queued" => {
                let capacity = match map.get("capacity") {
                    None | Some(Value::Null) => default_queue_capacity(),
                    Some(raw) => {
                        let number = raw.as_u64().ok_or_else(|| {
                            ConfigError::invalid(
                                "delivery",
                                "capacity",
                                Some(raw.to_string()),
                                "must be a positive integer",
                            )
                        })?;
                        parse_capacity(number, "delivery", "capacity")?
                    }
                };
                let overflow = optional_str(map, "delivery", "overflow")?
                    .map(str::parse::<OverflowPolicy>)
                    .transpose()?
                    .unwrap_or_default();
                Ok(Self::Queued { capacity, overflow })
            }
            other => Err(ConfigError::invalid(
                "delivery",
                "mode",
                Some(other.to_string()),
                "expected direct or queued",
            )),
        }
    }
}

impl LoggerConfig {
    /// Parse a logger document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid or unknown field.
    pub fn from_json(value: &Value) -> ConfigResult<Self> {
        let map = object(value, "logger")?;
        reject_unknown(map, "logger", LOGGER_FIELDS)?;

        let sink = map
            .get("sink")
            .ok_or_else(|| ConfigError::invalid("logger", "sink", None, "is required"))
            .and_then(SinkConfig::from_json)?;
        let mut config = Self::new(sink);
        apply_logger_fields(&mut config, map)?;
        if let Some(delivery) = map.get("delivery") {
            config.delivery = Delivery::from_json(delivery)?;
        }
        Ok(config)
    }

    /// Parse either one logger document or an array of them.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn many_from_json(value: &Value) -> ConfigResult<Vec<Self>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_json).collect(),
            other => Self::from_json(other).map(|config| vec![config]),
        }
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] for IO and
    /// syntax failures, and a validation error otherwise.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Vec<Self>> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::many_from_json(&value)
    }

    /// Build a logger configuration from `TIDELOG_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when `TIDELOG_PATH` is unset and a
    /// validation error for malformed values.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a logger configuration using an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`LoggerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(ENV_PATH).ok_or(ConfigError::MissingEnv { name: ENV_PATH })?;
        let interval = lookup(ENV_INTERVAL_MINUTES)
            .map(|raw| parse_u32(&raw, "sink", "interval_minutes"))
            .transpose()?
            .unwrap_or(defaults::INTERVAL_MINUTES);

        let mut sink = SinkConfig::new(path, interval)?;
        if let Some(raw) = lookup(ENV_TRUNCATE) {
            sink.truncate = parse_bool(&raw, "sink", "truncate")?;
        }
        if let Some(raw) = lookup(ENV_DURABILITY) {
            sink.durability = raw.trim().parse()?;
        }
        if let Some(raw) = lookup(ENV_ZONE) {
            sink.zone = raw.trim().parse()?;
        }

        let mut config = Self::new(sink);
        if let Some(raw) = lookup(ENV_LEVEL) {
            config.level = parse_level(&raw)?;
        }
        if let Some(raw) = lookup(ENV_FORMAT) {
            config.format = raw.trim().parse::<RecordFormat>()?;
        }
        let overflow = lookup(ENV_OVERFLOW)
            .map(|raw| raw.trim().parse::<OverflowPolicy>())
            .transpose()?;
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            let capacity = parse_u32(&raw, "delivery", "capacity")?;
            config.delivery = Delivery::Queued {
                capacity: parse_capacity(u64::from(capacity), "delivery", "capacity")?,
                overflow: overflow.unwrap_or_default(),
            };
        } else if let Some(overflow) = overflow {
            config.delivery = Delivery::queued(overflow);
        }
        Ok(config)
    }
}

fn apply_logger_fields(config: &mut LoggerConfig, map: &Map<String, Value>) -> ConfigResult<()> {
    if let Some(name) = optional_str(map, "logger", "name")? {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logger",
                "name",
                None,
                "must not be empty",
            ));
        }
        config.name = name.to_string();
    }
    if let Some(level) = optional_str(map, "logger", "level")? {
        config.level = parse_level(level)?;
    }
    if let Some(format) = optional_str(map, "logger", "format")? {
        config.format = format.parse()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Durability, Zone};
    use serde_json::json;
    use std::collections::HashMap;
    use std::error::Error;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn logger_document_parses_every_section() -> ConfigResult<()> {
        let value = json!({
            "name": "traffic",
            "level": "debug",
            "format": "json",
            "sink": {
                "path": "logs/traffic.log",
                "interval_minutes": 5,
                "truncate": true,
                "durability": "flush",
                "zone": "utc"
            },
            "delivery": { "mode": "queued", "capacity": 64, "overflow": "overrun_oldest" }
        });
        let config = LoggerConfig::from_json(&value)?;
        assert_eq!(config.name, "traffic");
        assert_eq!(config.level, LevelFilter::DEBUG);
        assert_eq!(config.format, RecordFormat::Json);
        assert_eq!(config.sink.interval.get(), 5);
        assert!(config.sink.truncate);
        assert_eq!(config.sink.durability, Durability::Flush);
        assert_eq!(config.sink.zone, Zone::Utc);
        match config.delivery {
            Delivery::Queued { capacity, overflow } => {
                assert_eq!(capacity.get(), 64);
                assert_eq!(overflow, OverflowPolicy::OverrunOldest);
            }
            Delivery::Direct => panic!("expected queued delivery"),
        }
        Ok(())
    }

    #[test]
    fn minimal_document_uses_defaults() -> ConfigResult<()> {
        let config = LoggerConfig::from_json(&json!({ "sink": { "path": "app.log" } }))?;
        assert_eq!(config.name, "tidelog");
        assert_eq!(config.level, LevelFilter::INFO);
        assert_eq!(config.sink.interval.get(), 1);
        assert_eq!(config.delivery, Delivery::Direct);
        Ok(())
    }

    #[test]
    fn invalid_documents_name_the_field() {
        let zero = LoggerConfig::from_json(&json!({
            "sink": { "path": "app.log", "interval_minutes": 0 }
        }));
        assert!(matches!(
            zero,
            Err(ConfigError::InvalidField { field: "interval_minutes", .. })
        ));

        let missing = LoggerConfig::from_json(&json!({ "level": "info" }));
        assert!(matches!(
            missing,
            Err(ConfigError::InvalidField { field: "sink", .. })
        ));

        let unknown = LoggerConfig::from_json(&json!({
            "sink": { "path": "app.log", "max_bytes": 10 }
        }));
        assert!(matches!(unknown, Err(ConfigError::UnknownField { .. })));

        let mode = Delivery::from_json(&json!({ "mode": "batched" }));
        assert!(matches!(
            mode,
            Err(ConfigError::InvalidField { field: "mode", .. })
        ));
    }

    #[test]
    fn many_from_json_accepts_arrays() -> ConfigResult<()> {
        let value = json!([
            { "name": "main", "sink": { "path": "log" } },
            { "name": "tt", "sink": { "path": "log_tt" } }
        ]);
        let configs = LoggerConfig::many_from_json(&value)?;
        let names: Vec<_> = configs.iter().map(|config| config.name.as_str()).collect();
        assert_eq!(names, ["main", "tt"]);
        Ok(())
    }

    #[test]
    fn from_path_reports_read_and_parse_failures() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let missing = LoggerConfig::from_path(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json")?;
        assert!(matches!(
            LoggerConfig::from_path(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let valid = dir.path().join("tidelog.json");
        fs::write(&valid, r#"{ "sink": { "path": "app.log", "interval_minutes": 15 } }"#)?;
        let configs = LoggerConfig::from_path(&valid)?;
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].sink.interval.get(), 15);
        Ok(())
    }

    #[test]
    fn lookup_builds_queued_config() -> ConfigResult<()> {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_PATH, "/var/log/app.log"),
            (ENV_INTERVAL_MINUTES, "10"),
            (ENV_TRUNCATE, "true"),
            (ENV_LEVEL, "critical"),
            (ENV_ZONE, "utc"),
            (ENV_QUEUE_CAPACITY, "128"),
            (ENV_OVERFLOW, "discard_new"),
        ]);
        let config = LoggerConfig::from_lookup(|name| vars.get(name).map(ToString::to_string))?;
        assert_eq!(config.sink.interval.get(), 10);
        assert!(config.sink.truncate);
        assert_eq!(config.level, LevelFilter::ERROR);
        assert_eq!(config.sink.zone, Zone::Utc);
        assert!(matches!(
            config.delivery,
            Delivery::Queued { capacity, overflow: OverflowPolicy::DiscardNew } if capacity.get() == 128
        ));
        Ok(())
    }

    #[test]
    fn lookup_requires_a_path() {
        let err = LoggerConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { name: ENV_PATH }));
    }
}
