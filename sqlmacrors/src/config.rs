//! Configuration for macro engines.
//!
//! Supports TOML-based configuration with global defaults and per-datasource overrides.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MacroError, Result};
use crate::predicate::PredicateStyle;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults applied to every datasource unless overridden.
    pub defaults: EngineDefaults,

    /// Per-datasource overrides (keyed by datasource name).
    pub datasources: HashMap<String, DatasourceConfig>,
}

/// Global default settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineDefaults {
    /// Render `time_bucket(...)` for the TimescaleDB extension (default: false).
    pub timescaledb: bool,
    /// Argument grammar of `$__constructPredicates` (default: query_string).
    pub predicate_style: PredicateStyle,
}

/// Per-datasource overrides; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasourceConfig {
    pub timescaledb: Option<bool>,
    pub predicate_style: Option<PredicateStyle>,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MacroError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| MacroError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `SQLMACRO_CONFIG` environment variable
    /// 2. `./sqlmacro.toml` (current directory)
    /// 3. `~/.config/sqlmacro/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("SQLMACRO_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from SQLMACRO_CONFIG");
                    return cfg;
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "ignoring SQLMACRO_CONFIG");
                }
            }
        }

        if let Ok(cfg) = Self::from_file("sqlmacro.toml") {
            tracing::info!("loaded config from ./sqlmacro.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sqlmacro").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Resolved settings for one datasource.
    pub fn for_datasource(&self, name: &str) -> ResolvedEngineConfig {
        ResolvedEngineConfig::merge(&self.defaults, self.datasources.get(name))
    }
}

/// Fully resolved settings (no Option fields).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedEngineConfig {
    pub timescaledb: bool,
    pub predicate_style: PredicateStyle,
}

impl ResolvedEngineConfig {
    fn merge(defaults: &EngineDefaults, override_cfg: Option<&DatasourceConfig>) -> Self {
        match override_cfg {
            Some(ds) => Self {
                timescaledb: ds.timescaledb.unwrap_or(defaults.timescaledb),
                predicate_style: ds.predicate_style.unwrap_or(defaults.predicate_style),
            },
            None => Self {
                timescaledb: defaults.timescaledb,
                predicate_style: defaults.predicate_style,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert!(!cfg.defaults.timescaledb);
        assert_eq!(cfg.defaults.predicate_style, PredicateStyle::QueryString);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[defaults]
predicate_style = "literal_list"

[datasources.metrics_ts]
timescaledb = true
"#;
        let cfg = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.defaults.predicate_style, PredicateStyle::LiteralList);

        let resolved = cfg.for_datasource("metrics_ts");
        assert!(resolved.timescaledb);
        assert_eq!(resolved.predicate_style, PredicateStyle::LiteralList);
    }

    #[test]
    fn test_datasource_override() {
        let toml = r#"
[defaults]
timescaledb = true

[datasources.legacy]
timescaledb = false
predicate_style = "literal_list"
"#;
        let cfg = EngineConfig::from_toml(toml).unwrap();

        let default_resolved = cfg.for_datasource("unknown");
        assert!(default_resolved.timescaledb);
        assert_eq!(default_resolved.predicate_style, PredicateStyle::QueryString);

        let legacy = cfg.for_datasource("legacy");
        assert!(!legacy.timescaledb);
        assert_eq!(legacy.predicate_style, PredicateStyle::LiteralList);
    }

    #[test]
    fn test_invalid_style_is_config_error() {
        let err = EngineConfig::from_toml("[defaults]\npredicate_style = \"csv\"").unwrap_err();
        assert!(matches!(err, MacroError::Config(_)));
    }
}
