//! Namespace prefixes backed by a directory on disk.
//!
//! A key such as `App/Models/User` under the prefix `App` maps to
//! `<directory>/Models/User`, falling back to `<directory>/Models/User.json`.
//! Without a custom loader the file is parsed as a JSON document and its
//! export is picked by [`unwrap_export`].

use super::key::Value;
use super::Container;
use crate::error::{KeystoneError, Result};
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Turns a located file into a container value.
pub type Loader = Arc<dyn Fn(&Container, &Path) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct AutoloadEntry {
    pub(crate) directory: PathBuf,
    pub(crate) loader: Option<Loader>,
}

/// Registered prefixes.
#[derive(Default)]
pub(crate) struct AutoloadTable {
    entries: DashMap<String, AutoloadEntry>,
}

/// A namespace matched against a registered prefix.
pub(crate) struct AutoloadMatch {
    pub(crate) entry: AutoloadEntry,
    pub(crate) suffix: String,
}

impl AutoloadTable {
    pub(crate) fn register(&self, prefix: &str, entry: AutoloadEntry) {
        self.entries
            .insert(prefix.trim_end_matches('/').to_string(), entry);
    }

    /// Finds the longest registered prefix covering `namespace`.
    pub(crate) fn matching(&self, namespace: &str) -> Option<AutoloadMatch> {
        let mut best: Option<(usize, AutoloadMatch)> = None;
        for item in self.entries.iter() {
            let prefix = item.key();
            let Some(rest) = namespace.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let suffix = match rest.strip_prefix('/') {
                Some(suffix) => suffix,
                None if rest.is_empty() => rest,
                None => continue,
            };
            if best.as_ref().is_some_and(|(len, _)| *len >= prefix.len()) {
                continue;
            }
            best = Some((
                prefix.len(),
                AutoloadMatch {
                    entry: item.value().clone(),
                    suffix: suffix.to_string(),
                },
            ));
        }
        best.map(|(_, found)| found)
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

/// Parsed documents, cached per path for the container's lifetime.
#[derive(Default)]
pub(crate) struct ModuleCache {
    documents: DashMap<PathBuf, serde_json::Value>,
}

impl ModuleCache {
    pub(crate) fn load(&self, namespace: &str, path: &Path) -> Result<serde_json::Value> {
        if let Some(document) = self.documents.get(path) {
            return Ok(document.clone());
        }

        tracing::debug!(namespace, path = %path.display(), "Loading autoloaded file");
        let raw = std::fs::read_to_string(path).map_err(|source| KeystoneError::Autoload {
            namespace: namespace.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        let document: serde_json::Value =
            serde_json::from_str(&raw).map_err(|source| KeystoneError::AutoloadParse {
                path: path.to_path_buf(),
                source,
            })?;

        self.documents.insert(path.to_path_buf(), document.clone());
        Ok(document)
    }

    pub(crate) fn clear(&self) {
        self.documents.clear();
    }
}

/// Picks the file backing `suffix` inside `directory`.
///
/// When neither candidate exists the extensionless path is returned so the
/// read error names what was asked for. Returns `None` when `suffix` is not a
/// plain relative path (`..`, a root or a drive prefix).
pub(crate) fn locate(directory: &Path, suffix: &str) -> Option<PathBuf> {
    let relative = Path::new(suffix);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }

    let candidate = directory.join(relative);
    if candidate.is_file() {
        return Some(candidate);
    }
    let mut with_extension = candidate.clone().into_os_string();
    with_extension.push(".json");
    let with_extension = PathBuf::from(with_extension);
    if with_extension.is_file() {
        Some(with_extension)
    } else {
        Some(candidate)
    }
}

/// Selects the exported value of a document.
///
/// `default` wins, then a member named after the file stem, then the whole
/// document.
pub fn unwrap_export(document: serde_json::Value, stem: &str) -> serde_json::Value {
    match document {
        serde_json::Value::Object(mut members) => {
            if let Some(default) = members.remove("default") {
                return default;
            }
            if let Some(named) = members.remove(stem) {
                return named;
            }
            serde_json::Value::Object(members)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(directory: &str) -> AutoloadEntry {
        AutoloadEntry {
            directory: PathBuf::from(directory),
            loader: None,
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = AutoloadTable::default();
        table.register("App", entry("/app"));
        table.register("App/Models/", entry("/models"));

        let found = table.matching("App/Models/User").unwrap();
        assert_eq!(found.entry.directory, PathBuf::from("/models"));
        assert_eq!(found.suffix, "User");

        let found = table.matching("App/Services/Mail").unwrap();
        assert_eq!(found.entry.directory, PathBuf::from("/app"));
        assert_eq!(found.suffix, "Services/Mail");

        assert!(table.matching("Application/Foo").is_none());
        assert!(table.matching("Other").is_none());
    }

    #[test]
    fn test_unwrap_export() {
        assert_eq!(unwrap_export(json!({"default": 1, "User": 2}), "User"), json!(1));
        assert_eq!(unwrap_export(json!({"User": 2, "other": 3}), "User"), json!(2));
        assert_eq!(unwrap_export(json!({"other": 3}), "User"), json!({"other": 3}));
        assert_eq!(unwrap_export(json!("App/Foo"), "User"), json!("App/Foo"));
    }

    #[test]
    fn test_locate_prefers_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("User.json"), "{}").unwrap();

        assert_eq!(locate(dir.path(), "User"), Some(dir.path().join("User.json")));
        assert_eq!(locate(dir.path(), "User.json"), Some(dir.path().join("User.json")));
        assert_eq!(locate(dir.path(), "Missing"), Some(dir.path().join("Missing")));
    }

    #[test]
    fn test_locate_stays_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("models");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("secret.json"), "{}").unwrap();

        assert_eq!(locate(&inner, "../secret"), None);
        assert_eq!(locate(&inner, "Nested/../../secret"), None);
        assert_eq!(locate(&inner, "/etc/passwd"), None);
        assert_eq!(locate(&inner, "Nested/User"), Some(inner.join("Nested/User")));
    }
}
