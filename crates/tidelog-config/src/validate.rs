//! Validation helpers and parsing utilities for configuration documents.

use std::num::NonZeroUsize;

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn object<'a>(
    value: &'a Value,
    section: &'static str,
) -> ConfigResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ConfigError::invalid(section, "<root>", Some(value.to_string()), "must be an object")
    })
}

pub(crate) fn reject_unknown(
    map: &Map<String, Value>,
    section: &'static str,
    known: &[&str],
) -> ConfigResult<()> {
    if let Some(field) = map.keys().find(|key| !known.contains(&key.as_str())) {
        return Err(ConfigError::UnknownField {
            section,
            field: field.clone(),
        });
    }
    Ok(())
}

pub(crate) fn optional_str<'a>(
    map: &'a Map<String, Value>,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<Option<&'a str>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(ConfigError::invalid(
            section,
            field,
            Some(other.to_string()),
            "must be a string",
        )),
    }
}

pub(crate) fn optional_bool(
    map: &Map<String, Value>,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<Option<bool>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(ConfigError::invalid(
            section,
            field,
            Some(other.to_string()),
            "must be a boolean",
        )),
    }
}

pub(crate) fn optional_u32(
    map: &Map<String, Value>,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<Option<u32>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let number = value.as_u64().ok_or_else(|| {
                ConfigError::invalid(
                    section,
                    field,
                    Some(value.to_string()),
                    "must be a non-negative integer",
                )
            })?;
            u32::try_from(number).map(Some).map_err(|_| {
                ConfigError::invalid(
                    section,
                    field,
                    Some(number.to_string()),
                    "must fit within 32 bits",
                )
            })
        }
    }
}

pub(crate) fn parse_bool(
    value: &str,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be a boolean",
        )),
    }
}

pub(crate) fn parse_u32(
    value: &str,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<u32> {
    value.trim().parse::<u32>().map_err(|_| {
        ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be a non-negative integer",
        )
    })
}

pub(crate) fn parse_capacity(
    value: u64,
    section: &'static str,
    field: &'static str,
) -> ConfigResult<NonZeroUsize> {
    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            ConfigError::invalid(section, field, Some(value.to_string()), "must be positive")
        })
}
