//! `async-nats` implementation of the broker seam.
//!
//! [`NatsBroker`] opens one [`async_nats::Client`] per call to
//! [`Broker::connect`]; the returned [`NatsSession`] wraps that client and a
//! JetStream context bound to it. Pooling is the registry's job, not ours.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, DeliverPolicy, ReplayPolicy, pull},
};
use async_nats::{ConnectOptions, Event, HeaderMap};
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use secrecy::ExposeSecret;

use crate::broker::{
    Broker, ConsumerInfo, ConsumerSpec, Durability, Flow, MessageStream, Session, StartPosition,
    StreamInfo,
};
use crate::error::Error;
use crate::message::{BrokerMessage, CoreMessage, Headers, StreamMessage, decode_payload};
use crate::transport::{Credentials, Endpoint, TransportConfig};

// ── NatsBroker ───────────────────────────────────────────────────────

/// Connects to NATS servers with `async-nats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsBroker;

impl Broker for NatsBroker {
    type Session = NatsSession;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        transport: &TransportConfig,
    ) -> Result<NatsSession, Error> {
        tracing::debug!(url = %endpoint.url, "connecting to NATS");

        let closed = Arc::new(AtomicBool::new(false));
        let watched = Arc::clone(&closed);
        let options = connect_options(&endpoint.credentials)?
            .name(&transport.client_name)
            .connection_timeout(transport.connect_timeout)
            .ping_interval(transport.ping_interval)
            .event_callback(move |event| {
                record_event(&event, &watched);
                async {}
            });

        let client = options
            .connect(endpoint.url.as_str())
            .await
            .map_err(|e| Error::Connect {
                url: endpoint.url.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(url = %endpoint.url, "connected to NATS");
        Ok(NatsSession::with_closed_flag(client, closed))
    }
}

/// Log a connection event; `Closed` means the client gave up for good.
fn record_event(event: &Event, closed: &AtomicBool) {
    match event {
        Event::Closed => {
            tracing::warn!("NATS connection closed by the client");
            closed.store(true, Ordering::Release);
        }
        Event::Disconnected => tracing::info!(event = %event, "NATS connection event"),
        _ => tracing::debug!(event = %event, "NATS connection event"),
    }
}

fn connect_options(credentials: &Credentials) -> Result<ConnectOptions, Error> {
    match credentials {
        Credentials::Anonymous => Ok(ConnectOptions::new()),
        Credentials::CredsFile(contents) => ConnectOptions::with_credentials(contents.expose_secret())
            .map_err(|e| Error::Credentials(e.to_string())),
        Credentials::UserPassword { username, password } => Ok(
            ConnectOptions::with_user_and_password(
                username.clone(),
                password.expose_secret().to_owned(),
            ),
        ),
    }
}

// ── NatsSession ──────────────────────────────────────────────────────

/// A live NATS connection plus its JetStream context.
#[derive(Clone)]
pub struct NatsSession {
    client: async_nats::Client,
    js: jetstream::Context,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for NatsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsSession")
            .field("state", &self.client.connection_state())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl NatsSession {
    pub fn new(client: async_nats::Client) -> Self {
        Self::with_closed_flag(client, Arc::new(AtomicBool::new(false)))
    }

    /// Wrap `client`, sharing `closed` with its event callback.
    fn with_closed_flag(client: async_nats::Client, closed: Arc<AtomicBool>) -> Self {
        let js = jetstream::new(client.clone());
        Self { client, js, closed }
    }

    /// The underlying client, for callers that need raw access.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    async fn stream_handle(&self, stream: &str) -> Result<jetstream::stream::Stream, Error> {
        self.js
            .get_stream(stream)
            .await
            .map_err(|e| lookup_error(stream, &e))
    }
}

impl Session for NatsSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, Error> {
        let subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| Error::Subscribe {
                subject: subject.to_owned(),
                reason: e.to_string(),
            })?;

        tracing::debug!(subject, "core subscription open");
        Ok(subscriber
            .map(|msg| Ok(BrokerMessage::Core(core_message(&msg))))
            .boxed())
    }

    async fn stream_info(&self, stream: &str) -> Result<StreamInfo, Error> {
        let mut handle = self.stream_handle(stream).await?;
        let info = handle
            .info()
            .await
            .map_err(|e| Error::jetstream("stream info", e))?;
        Ok(stream_info(info))
    }

    async fn create_consumer(&self, stream: &str, spec: &ConsumerSpec) -> Result<(), Error> {
        let config = pull::Config {
            name: Some(spec.name.clone()),
            filter_subjects: spec.filter_subjects.clone(),
            deliver_policy: match spec.start {
                StartPosition::New => DeliverPolicy::New,
                StartPosition::Sequence(start_sequence) => {
                    DeliverPolicy::ByStartSequence { start_sequence }
                }
            },
            ack_policy: AckPolicy::None,
            replay_policy: ReplayPolicy::Instant,
            inactive_threshold: spec.inactive_threshold,
            ..Default::default()
        };

        let handle = self.stream_handle(stream).await?;
        handle
            .create_consumer(config)
            .await
            .map_err(|e| Error::ConsumerCreate {
                stream: stream.to_owned(),
                consumer: spec.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(stream, consumer = %spec.name, "ephemeral consumer created");
        Ok(())
    }

    async fn consume(&self, stream: &str, consumer: &str) -> Result<MessageStream, Error> {
        let consume_err = |reason: String| Error::Consume {
            stream: stream.to_owned(),
            consumer: consumer.to_owned(),
            reason,
        };

        let handle = self.stream_handle(stream).await?;
        let pull_consumer: jetstream::consumer::Consumer<pull::Config> = handle
            .get_consumer(consumer)
            .await
            .map_err(|e| consume_err(e.to_string()))?;
        let messages = pull_consumer
            .messages()
            .await
            .map_err(|e| consume_err(e.to_string()))?;

        let stream_name = stream.to_owned();
        let consumer_name = consumer.to_owned();

        Ok(async_stream::stream! {
            futures_util::pin_mut!(messages);
            while let Some(item) = messages.next().await {
                match item {
                    Ok(msg) => yield Ok(BrokerMessage::Stream(jetstream_message(&stream_name, &msg))),
                    Err(e) => {
                        yield Err(Error::Consume {
                            stream: stream_name.clone(),
                            consumer: consumer_name.clone(),
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }
        .boxed())
    }

    async fn delete_consumer(&self, stream: &str, consumer: &str) -> Result<(), Error> {
        let handle = self.stream_handle(stream).await?;
        handle
            .delete_consumer(consumer)
            .await
            .map_err(|e| Error::ConsumerDelete {
                stream: stream.to_owned(),
                consumer: consumer.to_owned(),
                reason: e.to_string(),
            })?;
        tracing::debug!(stream, consumer, "consumer deleted");
        Ok(())
    }

    async fn list_streams(&self) -> Result<Vec<StreamInfo>, Error> {
        let mut streams = self.js.streams();
        let mut out = Vec::new();
        while let Some(info) = streams
            .try_next()
            .await
            .map_err(|e| Error::jetstream("list streams", e))?
        {
            out.push(stream_info(&info));
        }
        Ok(out)
    }

    async fn list_consumers(&self, stream: &str) -> Result<Vec<ConsumerInfo>, Error> {
        let handle = self.stream_handle(stream).await?;
        let mut consumers = handle.consumers();
        let mut out = Vec::new();
        while let Some(info) = consumers
            .try_next()
            .await
            .map_err(|e| Error::jetstream("list consumers", e))?
        {
            out.push(consumer_info(stream, &info));
        }
        Ok(out)
    }

    async fn get_message(&self, stream: &str, seq: u64) -> Result<StreamMessage, Error> {
        let handle = self.stream_handle(stream).await?;
        let raw = handle.get_raw_message(seq).await.map_err(|e| {
            if is_not_found(&e.to_string()) {
                Error::MessageNotFound {
                    stream: stream.to_owned(),
                    seq,
                }
            } else {
                Error::jetstream("get message", e)
            }
        })?;

        let timestamp = DateTime::from_timestamp(raw.time.unix_timestamp(), raw.time.nanosecond())
            .unwrap_or_else(Utc::now);

        Ok(StreamMessage {
            subject: raw.subject.to_string(),
            payload: decode_payload(&raw.payload),
            timestamp,
            headers: convert_headers(&raw.headers),
            stream: stream.to_owned(),
            seq: raw.sequence,
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.client.drain().await {
            tracing::warn!(error = %e, "draining NATS connection failed");
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

fn convert_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, values)| {
            (
                name.to_string(),
                values.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

fn core_message(msg: &async_nats::Message) -> CoreMessage {
    CoreMessage {
        subject: msg.subject.to_string(),
        payload: decode_payload(&msg.payload),
        timestamp: Utc::now(),
        headers: msg.headers.as_ref().map(convert_headers).unwrap_or_default(),
        reply: msg.reply.as_ref().map(ToString::to_string),
    }
}

fn jetstream_message(stream: &str, msg: &jetstream::Message) -> StreamMessage {
    let (stream_name, seq) = msg.info().map_or_else(
        |_| (stream.to_owned(), 0),
        |info| (info.stream.to_owned(), info.stream_sequence),
    );

    StreamMessage {
        subject: msg.message.subject.to_string(),
        payload: decode_payload(&msg.message.payload),
        timestamp: Utc::now(),
        headers: msg
            .message
            .headers
            .as_ref()
            .map(convert_headers)
            .unwrap_or_default(),
        stream: stream_name,
        seq,
    }
}

fn stream_info(info: &jetstream::stream::Info) -> StreamInfo {
    StreamInfo {
        name: info.config.name.clone(),
        subject_prefixes: info.config.subjects.clone(),
        description: info.config.description.clone(),
        last_sequence: info.state.last_sequence,
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn consumer_info(stream: &str, info: &jetstream::consumer::Info) -> ConsumerInfo {
    let config = &info.config;
    let push = config.deliver_subject.is_some() || info.push_bound;
    let filter_subjects = if config.filter_subject.is_empty() {
        config.filter_subjects.clone()
    } else {
        vec![config.filter_subject.clone()]
    };

    ConsumerInfo {
        name: info.name.clone(),
        stream: stream.to_owned(),
        durability: if config.durable_name.is_some() {
            Durability::Durable
        } else {
            Durability::Ephemeral
        },
        flow: if push { Flow::Push } else { Flow::Pull },
        filter_subjects,
        unprocessed_count: info.num_pending,
        ack_pending_count: count(info.num_ack_pending),
        ack_floor: info.ack_floor.stream_sequence,
        last_delivered: info.delivered.stream_sequence,
        pending_count: info.num_pending,
        redelivered_count: count(info.num_redelivered),
        waiting_count: count(info.num_waiting),
    }
}

fn is_not_found(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("not found")
}

fn lookup_error(stream: &str, err: &impl std::fmt::Display) -> Error {
    let reason = err.to_string();
    if is_not_found(&reason) {
        Error::StreamNotFound(stream.to_owned())
    } else {
        Error::JetStream {
            operation: "stream lookup",
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_conversion_keeps_every_value() {
        let mut map = HeaderMap::new();
        map.insert("X-Trace", "a");
        map.append("X-Trace", "b");
        map.insert("Content-Type", "application/json");

        let headers = convert_headers(&map);
        assert_eq!(headers["X-Trace"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(headers["Content-Type"], vec!["application/json".to_string()]);
    }

    #[test]
    fn lookup_error_detects_missing_stream() {
        let err = lookup_error("ORDERS", &"jetstream error: stream not found (code 404)");
        assert!(matches!(err, Error::StreamNotFound(ref s) if s == "ORDERS"));

        let err = lookup_error("ORDERS", &"timed out");
        assert!(matches!(err, Error::JetStream { operation: "stream lookup", .. }));
    }

    #[test]
    fn closed_event_marks_session_closed() {
        let closed = AtomicBool::new(false);
        record_event(&Event::Disconnected, &closed);
        record_event(&Event::Connected, &closed);
        assert!(!closed.load(Ordering::Acquire));

        record_event(&Event::Closed, &closed);
        assert!(closed.load(Ordering::Acquire));
    }

    #[test]
    fn anonymous_options_build() {
        assert!(connect_options(&Credentials::Anonymous).is_ok());
    }
}
