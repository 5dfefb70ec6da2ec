//! In-memory broker used by the integration tests.
//!
//! Counts connections, subscriptions and consumer lifecycle calls, stores
//! stream messages, and lets tests publish live traffic or inject failures.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use natswatch_api::{
    Broker, BrokerMessage, ConsumerInfo, ConsumerSpec, CoreMessage, Durability, Endpoint, Error,
    Flow, Headers, MessageStream, Session, StartPosition, StreamInfo, StreamMessage,
    TransportConfig,
};
use natswatch_core::{
    ClusterConfig, ConnectionRegistry, PlainCredentials, StaticClusters,
};
use tokio::sync::mpsc;

type Delivery = Result<BrokerMessage, Error>;

#[derive(Default)]
pub struct FakeState {
    pub connects: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub consumer_streams_dropped: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_consume: AtomicBool,
    pub fail_delete: AtomicBool,
    connect_delay: Mutex<Duration>,
    create_delay: Mutex<Duration>,
    connected_urls: Mutex<Vec<String>>,
    sessions: Mutex<Vec<Arc<AtomicBool>>>,
    streams: Mutex<BTreeMap<String, StoredStream>>,
    created: Mutex<Vec<(String, ConsumerSpec)>>,
    deleted: Mutex<Vec<String>>,
    core_subscribers: Mutex<Vec<(String, mpsc::UnboundedSender<Delivery>)>>,
    live_consumers: Mutex<Vec<LiveConsumer>>,
}

#[derive(Default)]
struct StoredStream {
    subjects: Vec<String>,
    messages: Vec<StreamMessage>,
}

struct LiveConsumer {
    stream: String,
    filters: Vec<String>,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Increments a counter when dropped; rides along inside delivery streams.
struct DropCounter {
    state: Arc<FakeState>,
    core: bool,
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        if self.core {
            self.state.unsubscribes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.state
                .consumer_streams_dropped
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeBroker {
    pub state: Arc<FakeState>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.state.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.state.connected_urls.lock().unwrap().clone()
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    /// Hold `create_consumer` open for `delay` after the consumer is registered.
    pub fn set_create_delay(&self, delay: Duration) {
        *self.state.create_delay.lock().unwrap() = delay;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_consume(&self, fail: bool) {
        self.state.fail_consume.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Mark every session handed out so far as closed by the transport.
    pub fn close_all_sessions(&self) {
        for flag in self.state.sessions.lock().unwrap().iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn add_stream(&self, name: &str, subjects: &[&str]) {
        self.state.streams.lock().unwrap().insert(
            name.to_owned(),
            StoredStream {
                subjects: subjects.iter().map(|s| (*s).to_owned()).collect(),
                messages: Vec::new(),
            },
        );
    }

    /// Consumers created so far, as `(stream, spec)`.
    pub fn created(&self) -> Vec<(String, ConsumerSpec)> {
        self.state.created.lock().unwrap().clone()
    }

    /// Names passed to `delete_consumer`, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    /// Publish on a core subject.
    pub fn publish(&self, subject: &str, payload: &str) {
        let msg = BrokerMessage::Core(CoreMessage {
            subject: subject.to_owned(),
            payload: payload.to_owned(),
            timestamp: Utc::now(),
            headers: Headers::new(),
            reply: None,
        });
        let subscribers = self.state.core_subscribers.lock().unwrap();
        for (pattern, tx) in subscribers.iter() {
            if subject_matches(pattern, subject) {
                let _ = tx.send(Ok(msg.clone()));
            }
        }
    }

    /// Store a message on a stream and deliver it to live consumers.
    pub fn publish_to_stream(&self, stream: &str, subject: &str, payload: &str) -> u64 {
        let msg = {
            let mut streams = self.state.streams.lock().unwrap();
            let stored = streams.entry(stream.to_owned()).or_default();
            let seq = stored.messages.len() as u64 + 1;
            let msg = StreamMessage {
                subject: subject.to_owned(),
                payload: payload.to_owned(),
                timestamp: Utc::now(),
                headers: Headers::new(),
                stream: stream.to_owned(),
                seq,
            };
            stored.messages.push(msg.clone());
            msg
        };

        let live = self.state.live_consumers.lock().unwrap();
        for consumer in live.iter().filter(|c| c.stream == stream) {
            if filter_matches(&consumer.filters, subject) {
                let _ = consumer.tx.send(Ok(BrokerMessage::Stream(msg.clone())));
            }
        }
        msg.seq
    }

    /// End every live delivery sequence, as a broker restart would.
    pub fn end_all_deliveries(&self) {
        self.state.core_subscribers.lock().unwrap().clear();
        self.state.live_consumers.lock().unwrap().clear();
    }

    /// Push a delivery error to every core subscriber.
    pub fn fail_deliveries(&self, reason: &str) {
        let subscribers = self.state.core_subscribers.lock().unwrap();
        for (pattern, tx) in subscribers.iter() {
            let _ = tx.send(Err(Error::Subscribe {
                subject: pattern.clone(),
                reason: reason.to_owned(),
            }));
        }
    }
}

impl Broker for FakeBroker {
    type Session = FakeSession;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        _transport: &TransportConfig,
    ) -> Result<FakeSession, Error> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Connect {
                url: endpoint.url.clone(),
                reason: "connection refused".into(),
            });
        }

        self.state
            .connected_urls
            .lock()
            .unwrap()
            .push(endpoint.url.clone());
        let closed = Arc::new(AtomicBool::new(false));
        self.state.sessions.lock().unwrap().push(Arc::clone(&closed));
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            closed,
        })
    }
}

#[derive(Clone)]
pub struct FakeSession {
    state: Arc<FakeState>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for FakeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeSession")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FakeSession {
    fn stream_exists(&self, stream: &str) -> Result<(), Error> {
        if self.state.streams.lock().unwrap().contains_key(stream) {
            Ok(())
        } else {
            Err(Error::StreamNotFound(stream.to_owned()))
        }
    }

    fn channel_stream(&self, rx: mpsc::UnboundedReceiver<Delivery>, core: bool) -> MessageStream {
        let counter = DropCounter {
            state: Arc::clone(&self.state),
            core,
        };
        futures_util::stream::unfold((rx, counter), |(mut rx, counter)| async move {
            rx.recv().await.map(|item| (item, (rx, counter)))
        })
        .boxed()
    }
}

impl Session for FakeSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .core_subscribers
            .lock()
            .unwrap()
            .push((subject.to_owned(), tx));
        Ok(self.channel_stream(rx, true))
    }

    async fn stream_info(&self, stream: &str) -> Result<StreamInfo, Error> {
        let streams = self.state.streams.lock().unwrap();
        let stored = streams
            .get(stream)
            .ok_or_else(|| Error::StreamNotFound(stream.to_owned()))?;
        Ok(StreamInfo {
            name: stream.to_owned(),
            subject_prefixes: stored.subjects.clone(),
            description: None,
            last_sequence: stored.messages.last().map_or(0, |m| m.seq),
        })
    }

    async fn create_consumer(&self, stream: &str, spec: &ConsumerSpec) -> Result<(), Error> {
        self.stream_exists(stream)?;
        self.state
            .created
            .lock()
            .unwrap()
            .push((stream.to_owned(), spec.clone()));
        let delay = *self.state.create_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn consume(&self, stream: &str, consumer: &str) -> Result<MessageStream, Error> {
        if self.state.fail_consume.load(Ordering::SeqCst) {
            return Err(Error::Consume {
                stream: stream.to_owned(),
                consumer: consumer.to_owned(),
                reason: "consumer info request timed out".into(),
            });
        }
        let spec = self
            .state
            .created
            .lock()
            .unwrap()
            .iter()
            .find(|(s, spec)| s == stream && spec.name == consumer)
            .map(|(_, spec)| spec.clone())
            .ok_or_else(|| Error::Consume {
                stream: stream.to_owned(),
                consumer: consumer.to_owned(),
                reason: "consumer not found".into(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        match spec.start {
            StartPosition::New => {
                self.state.live_consumers.lock().unwrap().push(LiveConsumer {
                    stream: stream.to_owned(),
                    filters: spec.filter_subjects.clone(),
                    tx,
                });
            }
            StartPosition::Sequence(start) => {
                let streams = self.state.streams.lock().unwrap();
                if let Some(stored) = streams.get(stream) {
                    for msg in stored
                        .messages
                        .iter()
                        .filter(|m| m.seq >= start && filter_matches(&spec.filter_subjects, &m.subject))
                    {
                        let _ = tx.send(Ok(BrokerMessage::Stream(msg.clone())));
                    }
                }
                // Keep the sender alive so the sequence stays open, like a
                // real consumer waiting for new messages.
                self.state.live_consumers.lock().unwrap().push(LiveConsumer {
                    stream: stream.to_owned(),
                    filters: spec.filter_subjects.clone(),
                    tx,
                });
            }
        }
        Ok(self.channel_stream(rx, false))
    }

    async fn delete_consumer(&self, stream: &str, consumer: &str) -> Result<(), Error> {
        self.state.deleted.lock().unwrap().push(consumer.to_owned());
        if self.state.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::ConsumerDelete {
                stream: stream.to_owned(),
                consumer: consumer.to_owned(),
                reason: "server unavailable".into(),
            });
        }
        Ok(())
    }

    async fn list_streams(&self) -> Result<Vec<StreamInfo>, Error> {
        let names: Vec<String> = self.state.streams.lock().unwrap().keys().cloned().collect();
        let mut out = Vec::new();
        for name in names {
            out.push(self.stream_info(&name).await?);
        }
        Ok(out)
    }

    async fn list_consumers(&self, stream: &str) -> Result<Vec<ConsumerInfo>, Error> {
        self.stream_exists(stream)?;
        let deleted = self.deleted();
        Ok(self
            .state
            .created
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, spec)| s == stream && !deleted.contains(&spec.name))
            .map(|(s, spec)| ConsumerInfo {
                name: spec.name.clone(),
                stream: s.clone(),
                durability: Durability::Ephemeral,
                flow: Flow::Pull,
                filter_subjects: spec.filter_subjects.clone(),
                unprocessed_count: 0,
                ack_pending_count: 0,
                ack_floor: 0,
                last_delivered: 0,
                pending_count: 0,
                redelivered_count: 0,
                waiting_count: 0,
            })
            .collect())
    }

    async fn get_message(&self, stream: &str, seq: u64) -> Result<StreamMessage, Error> {
        let streams = self.state.streams.lock().unwrap();
        let stored = streams
            .get(stream)
            .ok_or_else(|| Error::StreamNotFound(stream.to_owned()))?;
        stored
            .messages
            .iter()
            .find(|m| m.seq == seq)
            .cloned()
            .ok_or_else(|| Error::MessageNotFound {
                stream: stream.to_owned(),
                seq,
            })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl FakeSession {
    fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }
}

/// Subject wildcard match: `*` is one token, a trailing `>` is the rest.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    for token in pattern.split('.') {
        match (token, subject_tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (t, Some(s)) if t == s => {}
            _ => return false,
        }
    }
    subject_tokens.next().is_none()
}

fn filter_matches(filters: &[String], subject: &str) -> bool {
    filters.is_empty() || filters.iter().any(|f| subject_matches(f, subject))
}

// ── Wiring helpers ───────────────────────────────────────────────────

pub fn cluster(id: &str) -> ClusterConfig {
    ClusterConfig::new(id, id.to_uppercase(), format!("nats://{id}.example:4222"))
}

pub fn registry_with(broker: &FakeBroker, clusters: Vec<ClusterConfig>) -> Arc<ConnectionRegistry<FakeBroker>> {
    Arc::new(ConnectionRegistry::new(
        broker.clone(),
        Arc::new(StaticClusters::new(clusters)),
        Arc::new(PlainCredentials),
        TransportConfig::default(),
    ))
}

/// Registry with a single default cluster `a`.
pub fn registry(broker: &FakeBroker) -> Arc<ConnectionRegistry<FakeBroker>> {
    registry_with(broker, vec![cluster("a").as_default()])
}
