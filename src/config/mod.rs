//! Configuration repository
//!
//! Values are JSON documents keyed by file name: `config/app.json` becomes the
//! `app` entry and `app.name` reads the `name` member inside it.

use crate::error::{KeystoneError, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::path::Path;
use std::sync::Arc;

/// Configuration service
#[derive(Clone, Default)]
pub struct Config {
    entries: Arc<DashMap<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file in `directory`, one entry per file stem.
    pub fn load_dir(directory: impl AsRef<Path>) -> Result<Self> {
        let config = Self::new();
        let directory = directory.as_ref();

        let mut files: Vec<_> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for path in files {
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let raw = std::fs::read_to_string(&path)?;
            let document: Value = serde_json::from_str(&raw).map_err(|e| KeystoneError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            tracing::debug!(name, path = %path.display(), "Loaded config file");
            config.entries.insert(name.to_string(), document);
        }
        Ok(config)
    }

    /// Value at a dotted path such as `database.connections.primary`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let entry = self.entries.get(root)?;

        let mut current = entry.value();
        for segment in segments {
            current = match current {
                Value::Object(members) => members.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Deserializes the value at `path`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.get(path)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| KeystoneError::Config {
                    path: path.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Sets the value at a dotted path, creating intermediate objects.
    pub fn set(&self, path: &str, value: Value) {
        let mut segments = path.split('.');
        let Some(root) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();

        let mut entry = self
            .entries
            .entry(root.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        let mut current = entry.value_mut();
        for segment in rest {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            let Value::Object(members) = current else {
                return;
            };
            current = members
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
        *current = value;
    }

    /// Reads an environment variable.
    pub fn env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    pub fn env_or(&self, key: &str, default: &str) -> String {
        self.env(key).unwrap_or_else(|| default.to_string())
    }
}
