// tests/config_tests.rs

use std::fs;
use std::path::PathBuf;

use datakit_pipeline::config::SoftErrorLogConfig;
use datakit_pipeline::{ConfigError, Engine, EngineConfig, EngineError, Value, Zone};

fn write_config(dir: &std::path::Path, text: &str) -> PathBuf {
    let path = dir.join("pipeline.toml");
    fs::write(&path, text).unwrap();
    path
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.pipeline_dir, PathBuf::from("pipeline"));
    assert!(config.pattern_files.is_empty());
    assert!(config.geo_table.is_none());
    assert_eq!(config.zone().unwrap(), Zone::Local);
    assert_eq!(config.soft_error_log, SoftErrorLogConfig { burst: 10, every: 100 });
}

#[test]
fn test_full_config() {
    let config = EngineConfig::from_toml_str(
        r#"
        pipeline_dir = "/etc/pipelines"
        pattern_files = ["a", "b"]
        geo_table = "geo.csv"
        timezone = "+08:00"

        [soft_error_log]
        burst = 3
        every = 50
        "#,
    )
    .unwrap();

    assert_eq!(config.pipeline_dir, PathBuf::from("/etc/pipelines"));
    assert_eq!(config.pattern_files, vec![PathBuf::from("a"), PathBuf::from("b")]);
    assert_eq!(config.geo_table, Some(PathBuf::from("geo.csv")));
    assert_eq!(config.soft_error_log, SoftErrorLogConfig { burst: 3, every: 50 });
    assert_eq!(config.zone().unwrap(), Zone::parse("+0800").unwrap());
}

#[test]
fn test_named_timezone() {
    let config = EngineConfig::from_toml_str("timezone = \"Asia/Shanghai\"").unwrap();
    let zone = config.zone().unwrap();
    assert_eq!(zone, Zone::Named(chrono_tz::Tz::Asia__Shanghai));

    let naive = chrono::NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    assert_eq!(zone.from_naive(&naive).unwrap().timestamp(), 1_609_459_200);
}

#[test]
fn test_named_timezone_follows_dst() {
    let zone = Zone::parse("Europe/Berlin").unwrap();
    let winter = chrono::NaiveDate::from_ymd_opt(2021, 1, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
    let summer = chrono::NaiveDate::from_ymd_opt(2021, 7, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();

    assert_eq!(zone.from_naive(&winter).unwrap().offset().local_minus_utc(), 3600);
    assert_eq!(zone.from_naive(&summer).unwrap().offset().local_minus_utc(), 7200);
}

#[test]
fn test_engine_zone_from_named_config() {
    let config = EngineConfig {
        timezone: "Asia/Shanghai".to_string(),
        ..EngineConfig::default()
    };
    let engine = Engine::from_config(config).unwrap();
    let outcome = engine
        .compile(r#"add_key(t, "2021-01-01 08:00:00") default_time(t)"#)
        .unwrap()
        .run("");
    assert_eq!(
        outcome.record.get("t"),
        Some(&Value::Integer(1_609_459_200_000_000_000))
    );
}

#[test]
fn test_invalid_toml() {
    let err = EngineConfig::from_toml_str("pattern_files = 3").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_invalid_timezone_is_rejected_on_load() {
    let err = EngineConfig::from_toml_str("timezone = \"Asia/Nowhere\"").unwrap_err();
    assert!(matches!(err, ConfigError::Timezone(ref tz) if tz == "Asia/Nowhere"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_relative_paths_resolve_against_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        pipeline_dir = "scripts"
        pattern_files = ["patterns/custom", "/abs/patterns"]
        geo_table = "geo.csv"
        "#,
    );

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.pipeline_dir, dir.path().join("scripts"));
    assert_eq!(
        config.pattern_files,
        vec![dir.path().join("patterns/custom"), PathBuf::from("/abs/patterns")]
    );
    assert_eq!(config.geo_table, Some(dir.path().join("geo.csv")));
}

// ============================================================================
// Engine from configuration
// ============================================================================

#[test]
fn test_engine_from_config_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("custom"), "TICKET [A-Z]+-[0-9]+\n").unwrap();
    fs::write(
        dir.path().join("geo.csv"),
        "# cidr,country,region,city,isp\n10.0.0.0/8,CN,Zhejiang,Hangzhou,Intranet\n",
    )
    .unwrap();
    let path = write_config(
        dir.path(),
        r#"
        pattern_files = ["custom"]
        geo_table = "geo.csv"
        timezone = "UTC"
        "#,
    );

    let engine = Engine::from_config(EngineConfig::load(&path).unwrap()).unwrap();
    assert_eq!(engine.services().zone, Zone::parse("UTC").unwrap());

    let script = engine
        .compile(
            r#"
            grok(_, "%{IP:ip} %{TICKET:ticket} %{TIMESTAMP_ISO8601:time}")
            geoip(ip)
            default_time(time)
            "#,
        )
        .unwrap();
    let outcome = script.run("10.1.2.3 OPS-7 2021-01-01 00:00:00");
    assert!(outcome.is_ok(), "{:?}", outcome.error);

    let record = outcome.record;
    assert_eq!(record.get("ticket"), Some(&Value::from("OPS-7")));
    assert_eq!(record.get("city"), Some(&Value::from("Hangzhou")));
    assert_eq!(record.get("isp"), Some(&Value::from("Intranet")));
    assert_eq!(record.get("time"), Some(&Value::Integer(1_609_459_200_000_000_000)));
}

#[test]
fn test_engine_from_config_missing_pattern_file() {
    let config = EngineConfig {
        pattern_files: vec![PathBuf::from("/definitely/not/here")],
        ..EngineConfig::default()
    };
    assert!(matches!(
        Engine::from_config(config),
        Err(EngineError::Patterns(_))
    ));
}

#[test]
fn test_engine_from_config_bad_geo_table() {
    let dir = tempfile::tempdir().unwrap();
    let geo = dir.path().join("geo.csv");
    fs::write(&geo, "10.0.0.0/8,CN\n").unwrap();

    let config = EngineConfig {
        geo_table: Some(geo),
        ..EngineConfig::default()
    };
    assert!(matches!(Engine::from_config(config), Err(EngineError::Geo(_))));
}

#[test]
fn test_engine_from_config_bad_timezone() {
    let config = EngineConfig {
        timezone: "nowhere".to_string(),
        ..EngineConfig::default()
    };
    assert!(matches!(
        Engine::from_config(config),
        Err(EngineError::Config(ConfigError::Timezone(_)))
    ));
}
