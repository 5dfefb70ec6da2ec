// ── Monitoring read-through ──
//
// Thin pass-throughs to the broker's management API over pooled
// connections, plus a reachability probe on a throwaway connection.

use std::sync::Arc;

use natswatch_api::{Broker, ConsumerInfo, Session, StreamInfo, StreamMessage, TransportConfig};
use tracing::debug;

use crate::config::{ClusterConfig, ClusterStatus, Health};
use crate::error::CoreError;
use crate::registry::ConnectionRegistry;

/// Prefix of streams backing key-value buckets; hidden from stream lists.
const KV_STREAM_PREFIX: &str = "KV_";

pub struct Monitor<B: Broker> {
    registry: Arc<ConnectionRegistry<B>>,
}

impl<B: Broker> Clone for Monitor<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: Broker> Monitor<B> {
    pub fn new(registry: Arc<ConnectionRegistry<B>>) -> Self {
        Self { registry }
    }

    pub async fn list_streams(&self, cluster_id: &str) -> Result<Vec<StreamInfo>, CoreError> {
        let conn = self.registry.get(cluster_id).await?;
        let mut streams: Vec<StreamInfo> = conn
            .session()
            .list_streams()
            .await?
            .into_iter()
            .filter(|s| !s.name.starts_with(KV_STREAM_PREFIX))
            .collect();
        streams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(streams)
    }

    pub async fn list_consumers(
        &self,
        cluster_id: &str,
        stream: &str,
    ) -> Result<Vec<ConsumerInfo>, CoreError> {
        let conn = self.registry.get(cluster_id).await?;
        Ok(conn.session().list_consumers(stream).await?)
    }

    pub async fn get_message(
        &self,
        cluster_id: &str,
        stream: &str,
        seq: u64,
    ) -> Result<StreamMessage, CoreError> {
        let conn = self.registry.get(cluster_id).await?;
        Ok(conn.session().get_message(stream, seq).await?)
    }

    /// Probe a cluster on a fresh connection that is closed afterwards.
    ///
    /// Never fails; unreachable clusters report `unhealthy` with the reason.
    pub async fn test_connection(&self, cluster: &ClusterConfig) -> ClusterStatus {
        let probe = self
            .registry
            .connect_uncached(cluster, &TransportConfig::probe())
            .await;

        let (status, error) = match probe {
            Ok(session) => {
                session.close().await;
                (Health::Healthy, None)
            }
            Err(e) => (Health::Unhealthy, Some(e.to_string())),
        };
        debug!(cluster = %cluster.id, status = %status, "connection probe finished");

        ClusterStatus {
            name: cluster.name.clone(),
            url: cluster.url.clone(),
            status,
            error,
        }
    }
}
