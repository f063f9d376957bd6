//! Backing stores of raw parameter descriptions.

use super::kind::ParamKind;
use crate::data::RunId;
use crate::error::{ConfigError, GetterError};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Raw description of one entity, as held by the store.
pub type ParamDescription = Map<String, Value>;

/// Source of raw entity descriptions per run and kind.
pub trait ParamGetter: Send + Sync {
    fn descriptions(
        &self,
        run_id: RunId,
        kind: ParamKind,
    ) -> Result<Vec<ParamDescription>, GetterError>;
}

/// Local JSON parameter database.
///
/// The document maps run ids to per-kind arrays:
///
/// ```json
/// { "17": { "setup": [{"id": 1}], "layer": [{"id": 1, "radius": 42.5, "setup_id": 1}] } }
/// ```
#[derive(Debug, Clone)]
pub struct JsonParamGetter {
    runs: Map<String, Value>,
}

impl JsonParamGetter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let unreachable = |reason: String| ConfigError::StoreUnreachable {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| unreachable(e.to_string()))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| unreachable(e.to_string()))?;
        Self::from_value(value).map_err(|e| unreachable(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self, GetterError> {
        match value {
            Value::Object(runs) => Ok(Self { runs }),
            other => Err(GetterError::Malformed(format!(
                "expected an object of runs, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs.keys().filter_map(|k| k.parse().ok()).collect();
        ids.sort_unstable();
        ids
    }
}

impl ParamGetter for JsonParamGetter {
    fn descriptions(
        &self,
        run_id: RunId,
        kind: ParamKind,
    ) -> Result<Vec<ParamDescription>, GetterError> {
        let run = self
            .runs
            .get(&run_id.to_string())
            .ok_or(GetterError::UnknownRun(run_id))?;

        let entries = run
            .get(kind.name())
            .ok_or(GetterError::MissingKind { run_id, kind })?
            .as_array()
            .ok_or_else(|| GetterError::Malformed(format!("{kind} of run {run_id} is not an array")))?;

        entries
            .iter()
            .map(|entry| match entry {
                Value::Object(map) => Ok(map.clone()),
                other => Err(GetterError::Malformed(format!(
                    "{kind} entry of run {run_id} is {}",
                    type_name(other)
                ))),
            })
            .collect()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
