//! Persisted, editable cluster list (`clusters.json`).

use std::path::{Path, PathBuf};

use natswatch_core::{ClusterAuth, ClusterConfig};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, validate_url};

pub const CLUSTERS_FILE: &str = "clusters.json";

/// A cluster as submitted by a user, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDraft {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub auth: ClusterAuth,
    #[serde(default)]
    pub is_default: bool,
}

impl ClusterDraft {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth: ClusterAuth::Anonymous,
            is_default: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }
        validate_url(&self.url)?;
        if let ClusterAuth::UsernamePassword { username, .. } = &self.auth {
            if username.is_empty() {
                return Err(ConfigError::Validation {
                    field: "auth.username".into(),
                    reason: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    fn into_config(self, id: String) -> ClusterConfig {
        ClusterConfig {
            id,
            name: self.name,
            url: self.url,
            auth: self.auth,
            is_default: self.is_default,
        }
    }
}

/// JSON file holding the stored clusters, read fresh on every call.
#[derive(Debug, Clone)]
pub struct ClusterStore {
    path: PathBuf,
}

impl ClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored clusters in file order. A missing file is an empty list.
    pub fn list(&self) -> Result<Vec<ClusterConfig>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, clusters: &[ClusterConfig]) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(clusters)?;
        std::fs::write(&self.path, rendered)?;
        tracing::debug!(path = %self.path.display(), count = clusters.len(), "cluster list saved");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<ClusterConfig, ConfigError> {
        self.list()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ConfigError::ClusterNotFound { id: id.to_owned() })
    }

    /// Append a new cluster under a fresh id.
    pub fn add(&self, draft: ClusterDraft) -> Result<ClusterConfig, ConfigError> {
        draft.validate()?;
        let mut clusters = self.list()?;
        let cluster = draft.into_config(uuid::Uuid::new_v4().to_string());
        if cluster.is_default {
            clear_defaults(&mut clusters);
        }
        clusters.push(cluster.clone());
        self.save(&clusters)?;
        tracing::info!(id = %cluster.id, name = %cluster.name, "cluster added");
        Ok(cluster)
    }

    /// Replace every field of `id` except the id itself.
    pub fn update(&self, id: &str, draft: ClusterDraft) -> Result<ClusterConfig, ConfigError> {
        draft.validate()?;
        let mut clusters = self.list()?;
        let index = clusters
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ConfigError::ClusterNotFound { id: id.to_owned() })?;
        let cluster = draft.into_config(id.to_owned());
        if cluster.is_default {
            clear_defaults(&mut clusters);
        }
        clusters[index] = cluster.clone();
        self.save(&clusters)?;
        tracing::info!(id, "cluster updated");
        Ok(cluster)
    }

    pub fn remove(&self, id: &str) -> Result<ClusterConfig, ConfigError> {
        let mut clusters = self.list()?;
        let index = clusters
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ConfigError::ClusterNotFound { id: id.to_owned() })?;
        let removed = clusters.remove(index);
        self.save(&clusters)?;
        tracing::info!(id, "cluster removed");
        Ok(removed)
    }

    /// Merge by name: a matching name is replaced in place (keeping its id),
    /// anything else is appended under a fresh id.
    pub fn import(&self, drafts: Vec<ClusterDraft>) -> Result<Vec<ClusterConfig>, ConfigError> {
        for draft in &drafts {
            draft.validate()?;
        }
        let mut clusters = self.list()?;
        for draft in drafts {
            let is_default = draft.is_default;
            if is_default {
                clear_defaults(&mut clusters);
            }
            match clusters.iter().position(|c| c.name == draft.name) {
                Some(index) => {
                    let id = clusters[index].id.clone();
                    clusters[index] = draft.into_config(id);
                }
                None => clusters.push(draft.into_config(uuid::Uuid::new_v4().to_string())),
            }
        }
        self.save(&clusters)?;
        tracing::info!(count = clusters.len(), "clusters imported");
        Ok(clusters)
    }
}

fn clear_defaults(clusters: &mut [ClusterConfig]) {
    for cluster in clusters {
        cluster.is_default = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, ClusterStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ClusterStore::new(dir.path().join("data").join(CLUSTERS_FILE));
        (dir, store)
    }

    fn defaulted(name: &str) -> ClusterDraft {
        ClusterDraft {
            is_default: true,
            ..ClusterDraft::new(name, format!("nats://{name}:4222"))
        }
    }

    #[test]
    fn missing_file_lists_empty() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn add_assigns_ids_and_persists() {
        let (_dir, store) = store();
        let a = store.add(ClusterDraft::new("prod", "nats://prod:4222")).unwrap();
        let b = store.add(ClusterDraft::new("staging", "nats://staging:4222")).unwrap();
        assert_ne!(a.id, b.id);

        let reopened = ClusterStore::new(store.path());
        let names: Vec<String> = reopened.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["prod", "staging"]);
    }

    #[test]
    fn only_one_default_survives() {
        let (_dir, store) = store();
        let a = store.add(defaulted("prod")).unwrap();
        let b = store.add(defaulted("staging")).unwrap();

        let listed = store.list().unwrap();
        assert!(!listed.iter().find(|c| c.id == a.id).unwrap().is_default);
        assert!(listed.iter().find(|c| c.id == b.id).unwrap().is_default);

        store.update(&a.id, defaulted("prod")).unwrap();
        let defaults: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .filter(|c| c.is_default)
            .map(|c| c.id)
            .collect();
        assert_eq!(defaults, vec![a.id]);
    }

    #[test]
    fn update_and_remove_unknown_ids() {
        let (_dir, store) = store();
        assert!(matches!(
            store.update("nope", ClusterDraft::new("x", "nats://x:4222")),
            Err(ConfigError::ClusterNotFound { .. })
        ));
        assert!(matches!(
            store.remove("nope"),
            Err(ConfigError::ClusterNotFound { .. })
        ));
    }

    #[test]
    fn remove_drops_entry() {
        let (_dir, store) = store();
        let a = store.add(ClusterDraft::new("prod", "nats://prod:4222")).unwrap();
        store.add(ClusterDraft::new("dev", "nats://dev:4222")).unwrap();
        assert_eq!(store.remove(&a.id).unwrap().name, "prod");
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.get(&a.id).is_err());
    }

    #[test]
    fn import_merges_by_name() {
        let (_dir, store) = store();
        let prod = store.add(ClusterDraft::new("prod", "nats://old:4222")).unwrap();

        let merged = store
            .import(vec![
                ClusterDraft::new("prod", "nats://new:4222"),
                ClusterDraft::new("edge", "nats://edge:4222"),
            ])
            .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, prod.id);
        assert_eq!(merged[0].url, "nats://new:4222");
        assert_eq!(merged[1].name, "edge");
    }

    #[test]
    fn invalid_drafts_are_rejected_without_writing() {
        let (_dir, store) = store();
        assert!(store.add(ClusterDraft::new("", "nats://x:4222")).is_err());
        assert!(store.add(ClusterDraft::new("bad", "not a url")).is_err());
        assert!(
            store
                .import(vec![
                    ClusterDraft::new("ok", "nats://ok:4222"),
                    ClusterDraft::new("bad", "::"),
                ])
                .is_err()
        );
        assert!(!store.path().exists());
    }

    #[test]
    fn file_format_is_camel_case() {
        let (_dir, store) = store();
        store
            .add(ClusterDraft {
                auth: ClusterAuth::CredsFile {
                    creds_file: "/etc/app.creds".into(),
                },
                ..defaulted("prod")
            })
            .unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"isDefault\": true"));
        assert!(raw.contains("\"credsFile\": \"/etc/app.creds\""));
    }
}
