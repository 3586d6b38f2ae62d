use std::{env, fs};

use chrono::{Duration, Utc};
use sqlmacro::{DataQuery, EngineConfig, MacroEngine, TimeRange};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: interpolate <template_file> [datasource] [range_minutes]");
    eprintln!("Example: RUST_LOG=debug cargo run --example interpolate -- panel.sql metrics_ts 60");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        usage();
        std::process::exit(1);
    }

    let template = fs::read_to_string(args.remove(0))?;
    let datasource = if args.is_empty() {
        "default".to_string()
    } else {
        args.remove(0)
    };
    let minutes: i64 = match args.first() {
        Some(raw) => raw.parse()?,
        None => 60,
    };

    let config = EngineConfig::load_default();
    let engine = MacroEngine::from_config(&config.for_datasource(&datasource));
    let to = Utc::now();
    let range = TimeRange::new(to - Duration::minutes(minutes), to);

    let mut query = DataQuery::new("A");
    let sql = engine.interpolate(&mut query, &range, &template)?;
    println!("{sql}");
    if let Some(mode) = query.fill_mode() {
        eprintln!("fill mode: {mode:?}");
    }
    Ok(())
}
