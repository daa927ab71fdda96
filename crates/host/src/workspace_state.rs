//! Per-workspace key-value slots persisted as JSON
//!
//! File layout: `{ "<workspace>": { "<key>": <value>, ... }, ... }`.
//! A missing or unreadable file starts empty.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub struct WorkspaceState {
    path: PathBuf,
    scope: String,
    values: Map<String, Value>,
}

impl WorkspaceState {
    pub fn load(path: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        let path = path.into();
        let scope = scope.into();
        let values = read_file(&path)
            .remove(&scope)
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            path,
            scope,
            values,
        }
    }

    /// Values that fail to deserialize read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    /// Store `value` under `key`, or remove the key when `None`.
    pub fn update<T: Serialize>(&mut self, key: &str, value: Option<&T>) -> anyhow::Result<()> {
        match value {
            Some(value) => {
                self.values
                    .insert(key.to_string(), serde_json::to_value(value)?);
            }
            None => {
                self.values.remove(key);
            }
        }
        self.flush()
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut all = read_file(&self.path);
        if self.values.is_empty() {
            all.remove(&self.scope);
        } else {
            all.insert(self.scope.clone(), Value::Object(self.values.clone()));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(all))?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn read_file(path: &Path) -> Map<String, Value> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return Map::new(),
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(
                component = "workspace_state",
                event = "workspace_state.corrupt",
                path = %path.display(),
                "Ignoring unreadable workspace state file"
            );
            Map::new()
        }
    }
}
