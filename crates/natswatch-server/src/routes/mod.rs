//! Route table.

pub mod clusters;
pub mod streams;
pub mod subscribe;

use axum::Router;
use axum::routing::{get, post};
use natswatch_core::Broker;

use crate::state::AppState;

/// Build the full application router.
pub fn build_router<B: Broker>(state: AppState<B>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/subscribe", get(subscribe::subscribe::<B>))
        .route("/api/streams", get(streams::list_streams::<B>))
        .route(
            "/api/streams/{stream}/consumers",
            get(streams::list_consumers::<B>),
        )
        .route(
            "/api/streams/{stream}/messages/{seq}",
            get(streams::get_message::<B>),
        )
        .route("/api/streams/{stream}/range", get(streams::read_range::<B>))
        .route("/api/clusters", get(clusters::list_clusters::<B>))
        .route("/api/clusters/{id}/test", post(clusters::test_cluster::<B>))
        .route(
            "/api/connections/close",
            post(clusters::close_connections::<B>),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
