//! The query a template belongs to, as far as macros can see it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MacroError, Result};

/// Capability the engine needs from the query being built. Bucketing macros
/// that carry a fill argument call `set_fill_mode` once per occurrence.
pub trait QueryContext {
    fn set_fill_mode(&mut self, interval: Duration, fill: &str) -> Result<()>;
}

/// How gaps between buckets are filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    Null,
    Previous,
    Value(f64),
}

impl FillMode {
    /// `NULL` and `previous` select those modes; anything else must be a number.
    pub fn parse(spec: &str) -> Result<Self> {
        match spec {
            "NULL" => Ok(FillMode::Null),
            "previous" => Ok(FillMode::Previous),
            other => other
                .parse::<f64>()
                .map(FillMode::Value)
                .map_err(|_| MacroError::FillMode(other.to_string())),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            FillMode::Null => "null",
            FillMode::Previous => "previous",
            FillMode::Value(_) => "value",
        }
    }
}

/// A query with its raw JSON model, as handed to a SQL datasource.
///
/// Fill settings are written back into the model under `fill`,
/// `fillInterval`, `fillMode` and (value mode) `fillValue`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    #[serde(rename = "refId", default)]
    pub ref_id: String,
    #[serde(default)]
    pub model: serde_json::Value,
}

impl DataQuery {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            model: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn from_json(ref_id: impl Into<String>, json: &str) -> Result<Self> {
        Ok(Self {
            ref_id: ref_id.into(),
            model: serde_json::from_str(json)?,
        })
    }

    /// The fill mode currently recorded in the model, if any.
    pub fn fill_mode(&self) -> Option<FillMode> {
        if self.model.get("fill")?.as_bool() != Some(true) {
            return None;
        }
        match self.model.get("fillMode")?.as_str()? {
            "null" => Some(FillMode::Null),
            "previous" => Some(FillMode::Previous),
            "value" => self
                .model
                .get("fillValue")
                .and_then(serde_json::Value::as_f64)
                .map(FillMode::Value),
            _ => None,
        }
    }

    pub fn fill_interval(&self) -> Option<f64> {
        self.model.get("fillInterval")?.as_f64()
    }
}

impl QueryContext for DataQuery {
    fn set_fill_mode(&mut self, interval: Duration, fill: &str) -> Result<()> {
        let mode = FillMode::parse(fill)?;
        if !self.model.is_object() {
            self.model = serde_json::Value::Object(serde_json::Map::new());
        }
        let Some(props) = self.model.as_object_mut() else {
            return Ok(());
        };
        props.insert("fill".to_string(), serde_json::Value::Bool(true));
        props.insert(
            "fillInterval".to_string(),
            serde_json::json!(interval.as_secs_f64()),
        );
        props.insert(
            "fillMode".to_string(),
            serde_json::Value::String(mode.mode_name().to_string()),
        );
        if let FillMode::Value(value) = mode {
            props.insert("fillValue".to_string(), serde_json::json!(value));
        }
        tracing::debug!(
            ref_id = self.ref_id.as_str(),
            mode = mode.mode_name(),
            interval_secs = interval.as_secs_f64(),
            "fill mode set"
        );
        Ok(())
    }
}
