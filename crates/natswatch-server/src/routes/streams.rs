//! Stream, consumer and stored-message actions.

use axum::extract::{Path, Query, State};
use natswatch_core::{Broker, ConsumerInfo, RangeRequest, StreamInfo, StreamMessage};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult, ok};
use crate::state::AppState;

/// Page size when the viewer does not ask for one.
pub const DEFAULT_PAGE: usize = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterParams {
    pub cluster_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    #[serde(default = "first_sequence")]
    pub start_seq: u64,
    #[serde(default = "default_page")]
    pub limit: usize,
    pub cluster_id: Option<String>,
    pub filter_subject: Option<String>,
}

fn first_sequence() -> u64 {
    1
}

fn default_page() -> usize {
    DEFAULT_PAGE
}

fn cluster_id<B: Broker>(state: &AppState<B>, requested: Option<&str>) -> Result<String, ApiError> {
    Ok(state.registry.resolve(requested)?.id)
}

pub async fn list_streams<B: Broker>(
    State(state): State<AppState<B>>,
    Query(params): Query<ClusterParams>,
) -> ApiResult<Vec<StreamInfo>> {
    let cluster = cluster_id(&state, params.cluster_id.as_deref())?;
    ok(state.monitor.list_streams(&cluster).await?)
}

pub async fn list_consumers<B: Broker>(
    State(state): State<AppState<B>>,
    Path(stream): Path<String>,
    Query(params): Query<ClusterParams>,
) -> ApiResult<Vec<ConsumerInfo>> {
    let cluster = cluster_id(&state, params.cluster_id.as_deref())?;
    ok(state.monitor.list_consumers(&cluster, &stream).await?)
}

pub async fn get_message<B: Broker>(
    State(state): State<AppState<B>>,
    Path((stream, seq)): Path<(String, u64)>,
    Query(params): Query<ClusterParams>,
) -> ApiResult<StreamMessage> {
    let cluster = cluster_id(&state, params.cluster_id.as_deref())?;
    ok(state.monitor.get_message(&cluster, &stream, seq).await?)
}

pub async fn read_range<B: Broker>(
    State(state): State<AppState<B>>,
    Path(stream): Path<String>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Vec<StreamMessage>> {
    let cluster = cluster_id(&state, params.cluster_id.as_deref())?;
    let mut request = RangeRequest::new(stream, params.start_seq, params.limit);
    if let Some(subject) = params.filter_subject {
        request = request.with_subject(subject);
    }
    ok(state.range.read_range(&cluster, &request).await?)
}
