//! Server-Sent Events subscription endpoint.
//!
//! Each request runs one Event Bridge. The SSE body owns the receiving end
//! of the bridge's channel; when the viewer disconnects axum drops the body,
//! the bridge sees its sender close and tears the subscription down.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use natswatch_core::{Broker, EventEnvelope, SubscribeRequest};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::state::AppState;

/// Envelopes buffered between the bridge and the HTTP body.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    pub subject: Option<String>,
    pub stream: Option<String>,
    pub cluster_id: Option<String>,
}

pub async fn subscribe<B: Broker>(
    State(state): State<AppState<B>>,
    Query(params): Query<SubscribeParams>,
) -> Response {
    let Some(subject) = params.subject.filter(|s| !s.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Subject is required").into_response();
    };

    // Cluster resolution happens up front so a bad id never opens a stream.
    let cluster = match state.registry.resolve(params.cluster_id.as_deref()) {
        Ok(cluster) => cluster,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let mut request = SubscribeRequest::new(cluster.id, subject);
    if let Some(stream) = params.stream {
        request = request.on_stream(stream);
    }
    debug!(
        cluster = %request.cluster_id,
        subject = %request.subject,
        stream = ?request.stream(),
        "viewer subscribed"
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    // Detached: the bridge ends on its own once the body is dropped.
    drop(state.bridge.spawn(request, tx));

    let events =
        ReceiverStream::new(rx).map(|envelope: EventEnvelope| Event::default().json_data(envelope));
    Sse::new(events).into_response()
}
