//! Range Reader: bounded historical slices of a stream.
//!
//! Each read opens a short-lived replay consumer at the requested sequence,
//! collects until the limit or the stream's last sequence is reached, and
//! deletes the consumer on every exit path.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use natswatch_api::{Broker, ConsumerSpec, MessageStream, Session, StartPosition, StreamMessage};
use tracing::{debug, warn};

use crate::consumer::{ConsumerGuard, range_consumer_name, resource_error};
use crate::error::CoreError;
use crate::registry::ConnectionRegistry;

pub const MIN_RANGE_LIMIT: usize = 1;
pub const MAX_RANGE_LIMIT: usize = 1000;

/// How long a range read waits for the next delivery before returning
/// what it has.
pub const DEFAULT_RANGE_IDLE: Duration = Duration::from_secs(2);

/// Clamp a requested page size into `[1, 1000]`.
pub fn clamp_limit(requested: usize) -> usize {
    requested.clamp(MIN_RANGE_LIMIT, MAX_RANGE_LIMIT)
}

/// Parameters of one range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub stream: String,
    /// First sequence to return; 0 is read as 1.
    pub start_seq: u64,
    pub limit: usize,
    /// Optional subject filter applied server-side.
    pub subject: Option<String>,
}

impl RangeRequest {
    pub fn new(stream: impl Into<String>, start_seq: u64, limit: usize) -> Self {
        Self {
            stream: stream.into(),
            start_seq,
            limit,
            subject: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into()).filter(|s: &String| !s.is_empty());
        self
    }
}

pub struct RangeReader<B: Broker> {
    registry: Arc<ConnectionRegistry<B>>,
    idle: Duration,
}

impl<B: Broker> Clone for RangeReader<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            idle: self.idle,
        }
    }
}

impl<B: Broker> RangeReader<B> {
    pub fn new(registry: Arc<ConnectionRegistry<B>>) -> Self {
        Self {
            registry,
            idle: DEFAULT_RANGE_IDLE,
        }
    }

    #[must_use]
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Read up to `limit` stored messages starting at `start_seq`.
    ///
    /// Returns an empty list, without creating anything server-side, when
    /// `start_seq` lies beyond the stream's last sequence.
    pub async fn read_range(
        &self,
        cluster_id: &str,
        request: &RangeRequest,
    ) -> Result<Vec<StreamMessage>, CoreError> {
        let stream = request.stream.as_str();
        let limit = clamp_limit(request.limit);
        let start_seq = request.start_seq.max(1);

        let conn = self.registry.get(cluster_id).await?;
        let session = conn.session();

        let info = session.stream_info(stream).await?;
        if start_seq > info.last_sequence {
            debug!(stream, start_seq, last_seq = info.last_sequence, "range starts past end of stream");
            return Ok(Vec::new());
        }

        let consumer = range_consumer_name();
        let mut spec = ConsumerSpec::new(&consumer, StartPosition::Sequence(start_seq));
        if let Some(subject) = request.subject.as_deref() {
            spec = spec.with_filter_subject(subject);
        }

        let guard = ConsumerGuard::new(session.clone(), stream, &consumer);
        if let Err(e) = session.create_consumer(stream, &spec).await {
            guard.disarm();
            return Err(resource_error(stream, &consumer, &e));
        }

        let messages = match session.consume(stream, &consumer).await {
            Ok(messages) => messages,
            Err(e) => {
                guard.release().await;
                return Err(resource_error(stream, &consumer, &e));
            }
        };

        let collected = collect(messages, limit, info.last_sequence, self.idle).await;
        guard.release().await;

        if let Ok(page) = &collected {
            debug!(stream, start_seq, limit, returned = page.len(), "range read complete");
        }
        collected
    }
}

/// Pull until `limit` messages, the last sequence, the end of deliveries,
/// or `idle` without a delivery, whichever comes first.
async fn collect(
    mut messages: MessageStream,
    limit: usize,
    last_seq: u64,
    idle: Duration,
) -> Result<Vec<StreamMessage>, CoreError> {
    let mut page = Vec::with_capacity(limit.min(64));

    loop {
        let Ok(next) = tokio::time::timeout(idle, messages.next()).await else {
            debug!(collected = page.len(), "range read idle, returning partial page");
            break;
        };
        let Some(delivery) = next else { break };

        let Some(msg) = delivery?.into_stream_message() else {
            warn!("range consumer delivered a core message, skipping");
            continue;
        };

        let seq = msg.seq;
        page.push(msg);
        if page.len() >= limit || seq >= last_seq {
            break;
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(5000), MAX_RANGE_LIMIT);
    }

    #[test]
    fn empty_subject_means_whole_stream() {
        assert_eq!(RangeRequest::new("ORDERS", 1, 10).with_subject("").subject, None);
        assert_eq!(
            RangeRequest::new("ORDERS", 1, 10)
                .with_subject("orders.created")
                .subject
                .as_deref(),
            Some("orders.created")
        );
    }
}
