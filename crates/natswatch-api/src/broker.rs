//! The broker seam.
//!
//! Everything above this crate is generic over [`Broker`] and its
//! [`Session`], so the registry, subscription factory, bridge and range
//! reader never name a concrete client library. [`crate::nats::NatsBroker`]
//! is the production implementation.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::{BrokerMessage, StreamMessage};
use crate::transport::{Endpoint, TransportConfig};

/// Delivered messages of one subscription or consumer, in arrival order.
///
/// Dropping the stream releases the local subscription (unsubscribe / stop
/// pulling). Server-side consumers are *not* deleted by dropping; that is
/// an explicit [`Session::delete_consumer`] call.
pub type MessageStream = BoxStream<'static, Result<BrokerMessage, Error>>;

/// Establishes sessions to broker clusters.
pub trait Broker: Send + Sync + 'static {
    type Session: Session;

    fn connect(
        &self,
        endpoint: &Endpoint,
        transport: &TransportConfig,
    ) -> impl Future<Output = Result<Self::Session, Error>> + Send;
}

/// One live, authenticated connection to a cluster.
///
/// Cheap to clone; clones share the underlying connection.
pub trait Session: Clone + Send + Sync + 'static {
    /// Whether the transport has reported itself closed for good.
    fn is_closed(&self) -> bool;

    /// Open a core (non-durable, at-most-once) subscription.
    fn subscribe(&self, subject: &str) -> impl Future<Output = Result<MessageStream, Error>> + Send;

    /// Metadata and state of one stream.
    fn stream_info(&self, stream: &str) -> impl Future<Output = Result<StreamInfo, Error>> + Send;

    /// Register a consumer server-side. Does not start delivery.
    fn create_consumer(
        &self,
        stream: &str,
        spec: &ConsumerSpec,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Start pulling from a previously created consumer.
    fn consume(
        &self,
        stream: &str,
        consumer: &str,
    ) -> impl Future<Output = Result<MessageStream, Error>> + Send;

    /// Delete a consumer server-side.
    fn delete_consumer(
        &self,
        stream: &str,
        consumer: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn list_streams(&self) -> impl Future<Output = Result<Vec<StreamInfo>, Error>> + Send;

    fn list_consumers(
        &self,
        stream: &str,
    ) -> impl Future<Output = Result<Vec<ConsumerInfo>, Error>> + Send;

    /// Fetch one stored message by sequence.
    fn get_message(
        &self,
        stream: &str,
        seq: u64,
    ) -> impl Future<Output = Result<StreamMessage, Error>> + Send;

    /// Flush and close the connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

// ── Consumer specification ───────────────────────────────────────────

/// Where a new consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Only messages published after the consumer is created.
    New,
    /// From this stream sequence onward.
    Sequence(u64),
}

/// Configuration of an ephemeral, unacknowledged, instant-replay consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSpec {
    /// Globally unique consumer name.
    pub name: String,
    /// Subject filters; empty means the whole stream.
    pub filter_subjects: Vec<String>,
    pub start: StartPosition,
    /// The server deletes the consumer after this long without activity.
    pub inactive_threshold: Duration,
}

/// Inactivity window after which the server reaps an abandoned consumer.
pub const DEFAULT_INACTIVE_THRESHOLD: Duration = Duration::from_secs(30 * 60);

impl ConsumerSpec {
    pub fn new(name: impl Into<String>, start: StartPosition) -> Self {
        Self {
            name: name.into(),
            filter_subjects: Vec::new(),
            start,
            inactive_threshold: DEFAULT_INACTIVE_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_filter_subject(mut self, subject: impl Into<String>) -> Self {
        self.filter_subjects.push(subject.into());
        self
    }
}

// ── Management metadata ──────────────────────────────────────────────

/// Summary of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub name: String,
    pub subject_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sequence of the newest stored message (0 for an empty stream).
    pub last_sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Durable,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Push,
    Pull,
}

/// Summary of one consumer on a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerInfo {
    pub name: String,
    pub stream: String,
    pub durability: Durability,
    pub flow: Flow,
    pub filter_subjects: Vec<String>,
    pub unprocessed_count: u64,
    pub ack_pending_count: u64,
    pub ack_floor: u64,
    pub last_delivered: u64,
    pub pending_count: u64,
    pub redelivered_count: u64,
    pub waiting_count: u64,
}
