use std::fs;

use serde_json::json;
use tidelog_config::{
    ConfigError, Delivery, Durability, LevelFilter, LoggerConfig, OverflowPolicy, RecordFormat,
    Zone,
};

#[test]
fn config_file_with_two_loggers_round_trips_through_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tidelog.json");
    let document = json!([
        {
            "name": "main",
            "level": "warning",
            "sink": { "path": "logs/main.log", "interval_minutes": 60, "zone": "utc" }
        },
        {
            "name": "traffic",
            "format": "json",
            "sink": { "path": "logs/traffic.log", "durability": "flush", "truncate": true },
            "delivery": { "mode": "queued", "overflow": "discard_new" }
        }
    ]);
    fs::write(&path, serde_json::to_vec_pretty(&document)?)?;

    let configs = LoggerConfig::from_path(&path)?;
    assert_eq!(configs.len(), 2);

    let main = &configs[0];
    assert_eq!(main.level, LevelFilter::WARN);
    assert_eq!(main.sink.interval.get(), 60);
    assert_eq!(main.sink.zone, Zone::Utc);
    assert_eq!(main.sink.durability, Durability::Sync);
    assert_eq!(main.delivery, Delivery::Direct);

    let traffic = &configs[1];
    assert_eq!(traffic.format, RecordFormat::Json);
    assert!(traffic.sink.truncate);
    assert_eq!(traffic.sink.interval.get(), 1);
    assert!(matches!(
        traffic.delivery,
        Delivery::Queued { capacity, overflow: OverflowPolicy::DiscardNew } if capacity.get() == 8192
    ));
    Ok(())
}

#[test]
fn one_bad_logger_rejects_the_whole_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tidelog.json");
    fs::write(
        &path,
        r#"[{ "sink": { "path": "a.log" } }, { "sink": { "path": "b.log", "interval_minutes": 2000 } }]"#,
    )?;

    let err = LoggerConfig::from_path(&path).err();
    assert!(matches!(
        err,
        Some(ConfigError::InvalidField {
            section: "sink",
            field: "interval_minutes",
            ..
        })
    ));
    Ok(())
}
