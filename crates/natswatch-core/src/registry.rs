//! Connection Registry: one pooled broker session per cluster.
//!
//! Sessions are established lazily on first use and reused afterwards.
//! Each cluster id owns a slot holding a [`OnceCell`]: concurrent `get`
//! calls for the same id wait on a single establishment, while different
//! ids never block each other. Failed attempts leave the slot empty, so
//! nothing is cached on failure. Only an explicit close, or the transport
//! reporting itself closed, removes a connection.

use std::sync::Arc;

use dashmap::DashMap;
use natswatch_api::{Broker, Session, TransportConfig};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterCatalog, CredentialProvider};
use crate::config::ClusterConfig;
use crate::error::CoreError;

/// Attempts made when a cached session turns out to be closed.
const MAX_ESTABLISH_ATTEMPTS: usize = 2;

type Slot<S> = Arc<OnceCell<ClusterConnection<S>>>;

/// One live, authenticated session to a cluster.
#[derive(Debug, Clone)]
pub struct ClusterConnection<S> {
    cluster_id: String,
    session: S,
}

impl<S: Session> ClusterConnection<S> {
    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_live(&self) -> bool {
        !self.session.is_closed()
    }
}

/// Owner of every pooled cluster connection in the process.
pub struct ConnectionRegistry<B: Broker> {
    broker: B,
    catalog: Arc<dyn ClusterCatalog>,
    credentials: Arc<dyn CredentialProvider>,
    transport: TransportConfig,
    slots: DashMap<String, Slot<B::Session>>,
}

impl<B: Broker> ConnectionRegistry<B> {
    pub fn new(
        broker: B,
        catalog: Arc<dyn ClusterCatalog>,
        credentials: Arc<dyn CredentialProvider>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            broker,
            catalog,
            credentials,
            transport,
            slots: DashMap::new(),
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn catalog(&self) -> &dyn ClusterCatalog {
        self.catalog.as_ref()
    }

    pub fn credentials(&self) -> &dyn CredentialProvider {
        self.credentials.as_ref()
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Validate a requested cluster id, or pick the default one.
    pub fn resolve(&self, requested: Option<&str>) -> Result<ClusterConfig, CoreError> {
        self.catalog.resolve(requested)
    }

    /// Return the live connection for `cluster_id`, establishing it if needed.
    pub async fn get(&self, cluster_id: &str) -> Result<ClusterConnection<B::Session>, CoreError> {
        for attempt in 0..MAX_ESTABLISH_ATTEMPTS {
            let slot = self.slot(cluster_id);
            let conn = match slot.get_or_try_init(|| self.establish(cluster_id)).await {
                Ok(conn) => conn,
                Err(e) => {
                    self.slots.remove_if(cluster_id, |_, current| {
                        Arc::ptr_eq(current, &slot) && current.get().is_none()
                    });
                    return Err(e);
                }
            };
            if conn.is_live() {
                return Ok(conn.clone());
            }

            debug!(cluster = cluster_id, attempt, "evicting closed connection");
            self.slots
                .remove_if(cluster_id, |_, current| Arc::ptr_eq(current, &slot));
        }

        Err(CoreError::connection(
            cluster_id,
            "connection closed immediately after establishment",
        ))
    }

    /// Drain and remove one cluster's connection. No-op if none exists.
    pub async fn close(&self, cluster_id: &str) {
        let Some((_, slot)) = self.slots.remove(cluster_id) else {
            return;
        };
        if let Some(conn) = slot.get() {
            info!(cluster = cluster_id, "closing connection");
            conn.session.close().await;
        }
    }

    /// Drain and remove every pooled connection.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.close(&id).await;
        }
    }

    /// Ids of clusters with an established connection.
    pub fn connected_clusters(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .iter()
            .filter(|e| e.value().get().is_some_and(ClusterConnection::is_live))
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Open a fresh, uncached session. The caller owns and closes it.
    pub async fn connect_uncached(
        &self,
        cluster: &ClusterConfig,
        transport: &TransportConfig,
    ) -> Result<B::Session, CoreError> {
        let endpoint = self.credentials.endpoint(cluster)?;
        self.broker
            .connect(&endpoint, transport)
            .await
            .map_err(|e| CoreError::connection(&cluster.id, e))
    }

    fn slot(&self, cluster_id: &str) -> Slot<B::Session> {
        self.slots
            .entry(cluster_id.to_owned())
            .or_default()
            .value()
            .clone()
    }

    async fn establish(
        &self,
        cluster_id: &str,
    ) -> Result<ClusterConnection<B::Session>, CoreError> {
        let cluster = self.catalog.find(cluster_id)?;
        info!(cluster = cluster_id, url = %cluster.url, "connecting to cluster");

        let session = self
            .connect_uncached(&cluster, &self.transport)
            .await
            .inspect_err(|e| warn!(cluster = cluster_id, error = %e, "connection failed"))?;

        Ok(ClusterConnection {
            cluster_id: cluster_id.to_owned(),
            session,
        })
    }
}
