//! Cluster listing, probing and pooled-connection cleanup.

use axum::extract::{Path, State};
use natswatch_core::{Broker, ClusterConfig, ClusterStatus};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiResult, ok};
use crate::state::AppState;

/// Configured clusters with passwords stripped.
pub async fn list_clusters<B: Broker>(
    State(state): State<AppState<B>>,
) -> ApiResult<Vec<ClusterConfig>> {
    let clusters = state.registry.catalog().clusters()?;
    ok(clusters.iter().map(ClusterConfig::redacted).collect())
}

pub async fn test_cluster<B: Broker>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> ApiResult<ClusterStatus> {
    let cluster = state.registry.catalog().find(&id)?;
    ok(state.monitor.test_connection(&cluster).await)
}

#[derive(Debug, Serialize)]
pub struct Closed {
    pub closed: Vec<String>,
}

/// Close every pooled connection; the next request reconnects.
pub async fn close_connections<B: Broker>(State(state): State<AppState<B>>) -> ApiResult<Closed> {
    let closed = state.registry.connected_clusters();
    state.registry.close_all().await;
    info!(count = closed.len(), "closed pooled connections on request");
    ok(Closed { closed })
}
