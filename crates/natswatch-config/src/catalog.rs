//! File-backed cluster catalog.

use natswatch_core::cluster::ClusterCatalog;
use natswatch_core::{ClusterConfig, CoreError};

use crate::store::ClusterStore;
use crate::{ConfigError, Settings};

/// Clusters from the environment plus, when multi-cluster mode is on,
/// the stored cluster list.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    multicluster: bool,
    env_cluster: Option<ClusterConfig>,
    store: ClusterStore,
}

impl FileCatalog {
    pub fn new(multicluster: bool, env_cluster: Option<ClusterConfig>, store: ClusterStore) -> Self {
        Self {
            multicluster,
            env_cluster,
            store,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.multicluster,
            settings.env_cluster(),
            ClusterStore::new(settings.clusters_file()),
        )
    }

    pub fn multicluster(&self) -> bool {
        self.multicluster
    }

    /// The editable store. Mutations require multi-cluster mode.
    pub fn store(&self) -> Result<&ClusterStore, ConfigError> {
        if self.multicluster {
            Ok(&self.store)
        } else {
            Err(ConfigError::MulticlusterDisabled)
        }
    }
}

impl ClusterCatalog for FileCatalog {
    fn clusters(&self) -> Result<Vec<ClusterConfig>, CoreError> {
        if !self.multicluster {
            return Ok(self.env_cluster.iter().cloned().collect());
        }

        let mut clusters = self.store.list()?;
        if let Some(env) = &self.env_cluster {
            if !clusters.iter().any(|c| c.id == env.id) {
                clusters.push(env.clone());
            }
        }
        Ok(clusters)
    }
}
