//! Cluster resolution and credential collaborators.
//!
//! The core never decides where clusters come from. A [`ClusterCatalog`]
//! lists them and picks the default; a [`CredentialProvider`] turns one
//! [`ClusterConfig`] into transport credentials.

use natswatch_api::{Credentials, Endpoint};
use secrecy::SecretString;

use crate::config::{ClusterAuth, ClusterConfig};
use crate::error::CoreError;

/// Source of configured clusters.
pub trait ClusterCatalog: Send + Sync {
    /// Every configured cluster, in display order.
    fn clusters(&self) -> Result<Vec<ClusterConfig>, CoreError>;

    fn find(&self, id: &str) -> Result<ClusterConfig, CoreError> {
        self.clusters()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::ClusterNotFound { id: id.to_owned() })
    }

    /// The cluster flagged default, else the first one.
    fn default_cluster(&self) -> Result<ClusterConfig, CoreError> {
        pick_default(self.clusters()?)
    }

    /// An explicit id when given (and non-empty), otherwise the default.
    fn resolve(&self, requested: Option<&str>) -> Result<ClusterConfig, CoreError> {
        match requested.filter(|id| !id.is_empty()) {
            Some(id) => self.find(id),
            None => self.default_cluster(),
        }
    }
}

/// Apply the default-cluster rule to an ordered list.
pub fn pick_default(clusters: Vec<ClusterConfig>) -> Result<ClusterConfig, CoreError> {
    let flagged = clusters.iter().position(|c| c.is_default).unwrap_or(0);
    clusters
        .into_iter()
        .nth(flagged)
        .ok_or(CoreError::NoClusters)
}

/// Supplies authentication material for a cluster.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, cluster: &ClusterConfig) -> Result<Credentials, CoreError>;

    fn endpoint(&self, cluster: &ClusterConfig) -> Result<Endpoint, CoreError> {
        Ok(Endpoint::new(cluster.url.clone(), self.credentials(cluster)?))
    }
}

// ── In-memory catalog ────────────────────────────────────────────────

/// A fixed cluster list.
#[derive(Debug, Clone, Default)]
pub struct StaticClusters {
    clusters: Vec<ClusterConfig>,
}

impl StaticClusters {
    pub fn new(clusters: Vec<ClusterConfig>) -> Self {
        Self { clusters }
    }
}

impl ClusterCatalog for StaticClusters {
    fn clusters(&self) -> Result<Vec<ClusterConfig>, CoreError> {
        Ok(self.clusters.clone())
    }
}

// ── Plain credentials ────────────────────────────────────────────────

/// Credentials taken from the cluster config as-is.
///
/// Creds files are read from disk; passwords must be present in the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCredentials;

impl CredentialProvider for PlainCredentials {
    fn credentials(&self, cluster: &ClusterConfig) -> Result<Credentials, CoreError> {
        match &cluster.auth {
            ClusterAuth::Anonymous => Ok(Credentials::Anonymous),
            ClusterAuth::CredsFile { creds_file } => read_creds_file(&cluster.id, creds_file),
            ClusterAuth::UsernamePassword { username, password } => {
                let password = password.clone().ok_or_else(|| {
                    CoreError::connection(&cluster.id, "no password configured")
                })?;
                Ok(Credentials::UserPassword {
                    username: username.clone(),
                    password: SecretString::from(password),
                })
            }
        }
    }
}

/// Load a `.creds` file into transport credentials.
pub fn read_creds_file(cluster_id: &str, path: &str) -> Result<Credentials, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CoreError::connection(cluster_id, format!("cannot read creds file {path}: {e}"))
    })?;
    if contents.trim().is_empty() {
        return Err(CoreError::connection(
            cluster_id,
            format!("creds file {path} is empty"),
        ));
    }
    Ok(Credentials::CredsFile(SecretString::from(contents)))
}
