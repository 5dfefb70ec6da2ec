//! Event Bridge: one viewer-facing envelope stream per subscription.
//!
//! The bridge opens a [`SubscriptionHandle`], announces `connected`, then
//! forwards every delivery as a `message` envelope in arrival order,
//! interleaved with heartbeats on a fixed period. An idle deadline is armed
//! on entry and pushed back each time a heartbeat is successfully queued;
//! if it passes, the viewer gets `disconnected` and the subscription stops.
//!
//! The viewer side is an [`mpsc::Sender`]. Dropping the receiver is the
//! disconnect signal and is observed through [`mpsc::Sender::closed`],
//! without waiting for the next write.

use std::time::Duration;

use natswatch_api::Broker;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::envelope::{ConnectionStatus, EventEnvelope, connected_message};
use crate::subscription::{SubscriptionFactory, SubscriptionHandle};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const TIMED_OUT_MESSAGE: &str = "Subscription timed out";
pub const BROKER_CLOSED_MESSAGE: &str = "Subscription closed by broker";

/// Timer settings of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// One viewer's subscription request, with the cluster already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub cluster_id: String,
    pub subject: String,
    pub stream: Option<String>,
}

impl SubscribeRequest {
    pub fn new(cluster_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            subject: subject.into(),
            stream: None,
        }
    }

    #[must_use]
    pub fn on_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }
}

/// How a bridge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BridgeExit {
    /// The subscription could not be opened.
    OpenFailed,
    /// The viewer went away or stopped accepting writes.
    ViewerGone,
    /// The idle deadline passed.
    TimedOut,
    /// The broker ended the delivery sequence.
    BrokerClosed,
    /// The broker reported a delivery error.
    BrokerError,
}

/// Result of queueing one envelope for the viewer.
enum Emit {
    Sent,
    Gone,
    TimedOut,
}

/// Spawns and runs bridges against one subscription factory.
pub struct EventBridge<B: Broker> {
    factory: SubscriptionFactory<B>,
    config: BridgeConfig,
}

impl<B: Broker> Clone for EventBridge<B> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            config: self.config,
        }
    }
}

impl<B: Broker> EventBridge<B> {
    pub fn new(factory: SubscriptionFactory<B>, config: BridgeConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> BridgeConfig {
        self.config
    }

    /// Run a bridge on a background task.
    pub fn spawn(
        &self,
        request: SubscribeRequest,
        tx: mpsc::Sender<EventEnvelope>,
    ) -> JoinHandle<BridgeExit> {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.run(request, tx).await })
    }

    /// Drive one subscription until it terminates.
    pub async fn run(&self, request: SubscribeRequest, tx: mpsc::Sender<EventEnvelope>) -> BridgeExit {
        let subject = request.subject.as_str();
        let stream = request.stream();

        let opened = tokio::select! {
            biased;
            () = tx.closed() => {
                debug!(subject, "viewer left before subscription opened");
                return BridgeExit::ViewerGone;
            }
            opened = self.factory.open(&request.cluster_id, subject, stream) => opened,
        };

        let mut handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                warn!(cluster = %request.cluster_id, subject, error = %e, "subscription failed to open");
                let _ = tx
                    .send(EventEnvelope::status(ConnectionStatus::Error, subject, stream, e.to_string()))
                    .await;
                return BridgeExit::OpenFailed;
            }
        };

        let exit = self.stream_until_done(&request, &mut handle, &tx).await;
        handle.stop().await;
        info!(cluster = %request.cluster_id, subject, exit = %exit, "subscription bridge terminated");
        exit
    }

    async fn stream_until_done(
        &self,
        request: &SubscribeRequest,
        handle: &mut SubscriptionHandle,
        tx: &mpsc::Sender<EventEnvelope>,
    ) -> BridgeExit {
        let subject = request.subject.as_str();
        let stream = request.stream();
        let BridgeConfig {
            heartbeat_interval,
            idle_timeout,
        } = self.config;

        let mut idle_deadline = Instant::now() + idle_timeout;
        let connected = EventEnvelope::status(
            ConnectionStatus::Connected,
            subject,
            stream,
            connected_message(subject, stream),
        );
        match emit(tx, connected, idle_deadline).await {
            Emit::Sent => {}
            Emit::Gone => return BridgeExit::ViewerGone,
            Emit::TimedOut => return time_out(tx, subject, stream),
        }

        let mut heartbeat = tokio::time::interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = tx.closed() => {
                    debug!(subject, "viewer disconnected");
                    return BridgeExit::ViewerGone;
                }
                () = tokio::time::sleep_until(idle_deadline) => {
                    return time_out(tx, subject, stream);
                }
                _ = heartbeat.tick() => {
                    match emit(tx, EventEnvelope::heartbeat(), idle_deadline).await {
                        Emit::Sent => idle_deadline = Instant::now() + idle_timeout,
                        Emit::Gone => return BridgeExit::ViewerGone,
                        Emit::TimedOut => return time_out(tx, subject, stream),
                    }
                }
                delivery = handle.next() => match delivery {
                    Some(Ok(msg)) => match emit(tx, EventEnvelope::message(msg), idle_deadline).await {
                        Emit::Sent => {}
                        Emit::Gone => return BridgeExit::ViewerGone,
                        Emit::TimedOut => return time_out(tx, subject, stream),
                    },
                    Some(Err(e)) => {
                        warn!(subject, error = %e, "delivery failed");
                        let _ = tx.try_send(EventEnvelope::status(
                            ConnectionStatus::Error,
                            subject,
                            stream,
                            e.to_string(),
                        ));
                        return BridgeExit::BrokerError;
                    }
                    None => {
                        let _ = tx.try_send(EventEnvelope::status(
                            ConnectionStatus::Disconnected,
                            subject,
                            stream,
                            BROKER_CLOSED_MESSAGE,
                        ));
                        return BridgeExit::BrokerClosed;
                    }
                },
            }
        }
    }
}

/// Queue one envelope, giving up at the idle deadline.
async fn emit(tx: &mpsc::Sender<EventEnvelope>, envelope: EventEnvelope, deadline: Instant) -> Emit {
    match tokio::time::timeout_at(deadline, tx.send(envelope)).await {
        Ok(Ok(())) => Emit::Sent,
        Ok(Err(_)) => Emit::Gone,
        Err(_) => Emit::TimedOut,
    }
}

/// Best-effort `disconnected` notice; the viewer may no longer be reading.
fn time_out(tx: &mpsc::Sender<EventEnvelope>, subject: &str, stream: Option<&str>) -> BridgeExit {
    info!(subject, "subscription idle deadline passed");
    let _ = tx.try_send(EventEnvelope::status(
        ConnectionStatus::Disconnected,
        subject,
        stream,
        TIMED_OUT_MESSAGE,
    ));
    BridgeExit::TimedOut
}
