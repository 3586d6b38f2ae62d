//! Engines built from TOML configuration.

use std::io::Write;

use chrono::{TimeZone, Utc};
use sqlmacro::{
    interpolate_for_datasource, DataQuery, EngineConfig, MacroEngine, MacroError,
    PredicateStyle, TimeRange,
};

const CONFIG: &str = r#"
[defaults]
predicate_style = "literal_list"

[datasources.metrics_ts]
timescaledb = true
predicate_style = "query_string"
"#;

fn range() -> TimeRange {
    let from = Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap();
    TimeRange::new(from, from)
}

#[test]
fn loads_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let cfg = EngineConfig::from_file(file.path()).unwrap();
    let engine = MacroEngine::from_config(&cfg.for_datasource("metrics_ts"));
    assert!(engine.timescaledb());
    assert_eq!(engine.predicate_style(), PredicateStyle::QueryString);

    let engine = MacroEngine::from_config(&cfg.for_datasource("plain_pg"));
    assert!(!engine.timescaledb());
    assert_eq!(engine.predicate_style(), PredicateStyle::LiteralList);
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MacroError::Config(_)));
}

#[test]
fn datasource_settings_drive_expansion() {
    let cfg = EngineConfig::from_toml(CONFIG).unwrap();
    let sql = "$__timeGroup(ts,'1m') $__constructPredicates(\"k: 'a'\")";

    let ts = interpolate_for_datasource(&cfg, "metrics_ts", &mut DataQuery::new("A"), &range(), sql);
    // query_string grammar reads `'a'` as a parameter name with an empty value
    assert_eq!(ts.unwrap(), "time_bucket('60.000s',ts) k in ('')");

    let pg = interpolate_for_datasource(&cfg, "plain_pg", &mut DataQuery::new("A"), &range(), sql);
    assert_eq!(pg.unwrap(), "floor(extract(epoch from ts)/60)*60 k in ('a')");
}
