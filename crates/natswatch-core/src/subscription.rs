//! Subscription Factory and the uniform [`SubscriptionHandle`].
//!
//! A handle wraps either a core subscription or an ephemeral replay
//! consumer on a stream. Deliveries are pumped by a background task into
//! a bounded channel; the task races every pull against a
//! [`CancellationToken`] so [`SubscriptionHandle::stop`] interrupts the
//! pull side promptly instead of waiting for the next message.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use natswatch_api::{Broker, BrokerMessage, ConsumerSpec, MessageStream, Session, StartPosition};
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consumer::{ConsumerGuard, live_consumer_name, resource_error};
use crate::error::CoreError;
use crate::registry::ConnectionRegistry;

// ── Delivery channel capacity ────────────────────────────────────────

const DELIVERY_CHANNEL_CAPACITY: usize = 256;

/// What a handle is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    Core,
    Stream { stream: String, consumer: String },
}

impl SubscriptionKind {
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Core => None,
            Self::Stream { stream, .. } => Some(stream),
        }
    }

    pub fn consumer(&self) -> Option<&str> {
        match self {
            Self::Core => None,
            Self::Stream { consumer, .. } => Some(consumer),
        }
    }
}

// ── SubscriptionHandle ───────────────────────────────────────────────

/// Cancellable source of delivered messages.
///
/// Exclusively owned by whoever opened it. [`stop`](Self::stop) is
/// idempotent; dropping an unstopped handle cancels the pump and schedules
/// any server-side cleanup on the current runtime.
pub struct SubscriptionHandle {
    subject: String,
    kind: SubscriptionKind,
    deliveries: mpsc::Receiver<Result<BrokerMessage, CoreError>>,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
    cleanup: Mutex<Option<BoxFuture<'static, ()>>>,
    stopped: OnceCell<()>,
}

impl SubscriptionHandle {
    /// Start pumping `messages`. `cleanup` runs once when the handle stops.
    pub fn spawn(
        subject: impl Into<String>,
        kind: SubscriptionKind,
        messages: MessageStream,
        cleanup: Option<BoxFuture<'static, ()>>,
    ) -> Self {
        let (tx, deliveries) = mpsc::channel(DELIVERY_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump_loop(messages, tx, cancel.clone()));

        Self {
            subject: subject.into(),
            kind,
            deliveries,
            cancel,
            pump: Mutex::new(Some(pump)),
            cleanup: Mutex::new(cleanup),
            stopped: OnceCell::new(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn kind(&self) -> &SubscriptionKind {
        &self.kind
    }

    /// Next delivery in arrival order. `None` once the source has ended
    /// or the handle has been stopped.
    pub async fn next(&mut self) -> Option<Result<BrokerMessage, CoreError>> {
        self.deliveries.recv().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.initialized()
    }

    /// Stop the pump, release the local subscription, then run cleanup.
    ///
    /// Safe to call repeatedly and from racing triggers; teardown runs once.
    pub async fn stop(&self) {
        self.stopped.get_or_init(|| self.teardown()).await;
    }

    async fn teardown(&self) {
        self.cancel.cancel();

        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                warn!(subject = %self.subject, error = %e, "subscription pump ended abnormally");
            }
        }

        // Own task, so a caller dropping `stop` midway cannot lose the deletion.
        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(tokio::spawn);
        if let Some(cleanup) = cleanup {
            if let Err(e) = cleanup.await {
                warn!(subject = %self.subject, error = %e, "subscription cleanup ended abnormally");
            }
        }

        debug!(subject = %self.subject, kind = ?self.kind, "subscription stopped");
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("subject", &self.subject)
            .field("kind", &self.kind)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.stopped.initialized() {
            return;
        }
        let cleanup = self
            .cleanup
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cleanup) = cleanup {
            match tokio::runtime::Handle::try_current() {
                Ok(rt) => {
                    rt.spawn(cleanup);
                }
                Err(_) => warn!(subject = %self.subject, "subscription dropped outside a runtime"),
            }
        }
    }
}

/// Pull from the broker and push into the channel until cancelled,
/// the source ends, the receiver goes away, or a delivery error occurs.
async fn pump_loop(
    mut messages: MessageStream,
    tx: mpsc::Sender<Result<BrokerMessage, CoreError>>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = messages.next() => match next {
                Some(item) => item.map_err(CoreError::from),
                None => break,
            },
        };

        let failed = item.is_err();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = tx.send(item) => if sent.is_err() { break },
        }
        if failed {
            break;
        }
    }
    // Dropping `messages` releases the broker-side subscription.
}

// ── SubscriptionFactory ──────────────────────────────────────────────

/// Opens core subscriptions and stream replay consumers.
pub struct SubscriptionFactory<B: Broker> {
    registry: Arc<ConnectionRegistry<B>>,
}

impl<B: Broker> Clone for SubscriptionFactory<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: Broker> SubscriptionFactory<B> {
    pub fn new(registry: Arc<ConnectionRegistry<B>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry<B>> {
        &self.registry
    }

    /// Open a subscription on `subject`.
    ///
    /// Without a stream this is a core subscription. With one, an
    /// ephemeral consumer filtered to `subject` delivers only messages
    /// published after it was created.
    pub async fn open(
        &self,
        cluster_id: &str,
        subject: &str,
        stream: Option<&str>,
    ) -> Result<SubscriptionHandle, CoreError> {
        if subject.trim().is_empty() {
            return Err(CoreError::InvalidRequest("Subject is required".into()));
        }

        let conn = self.registry.get(cluster_id).await?;
        let session = conn.session().clone();

        match stream.filter(|s| !s.is_empty()) {
            None => {
                let messages = session.subscribe(subject).await?;
                info!(cluster = cluster_id, subject, "opened core subscription");
                Ok(SubscriptionHandle::spawn(
                    subject,
                    SubscriptionKind::Core,
                    messages,
                    None,
                ))
            }
            Some(stream) => open_stream(&session, cluster_id, subject, stream).await,
        }
    }
}

async fn open_stream<S: Session>(
    session: &S,
    cluster_id: &str,
    subject: &str,
    stream: &str,
) -> Result<SubscriptionHandle, CoreError> {
    let consumer = live_consumer_name();
    let spec = ConsumerSpec::new(&consumer, StartPosition::New).with_filter_subject(subject);

    let guard = ConsumerGuard::new(session.clone(), stream, &consumer);
    if let Err(e) = session.create_consumer(stream, &spec).await {
        guard.disarm();
        return Err(resource_error(stream, &consumer, &e));
    }

    let messages = match session.consume(stream, &consumer).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(stream, consumer = %consumer, error = %e, "consume failed after consumer creation");
            guard.release().await;
            return Err(resource_error(stream, &consumer, &e));
        }
    };

    info!(cluster = cluster_id, stream, subject, consumer = %consumer, "opened stream subscription");
    Ok(SubscriptionHandle::spawn(
        subject,
        SubscriptionKind::Stream {
            stream: stream.to_owned(),
            consumer,
        },
        messages,
        Some(guard.into_cleanup()),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures_util::stream;
    use natswatch_api::CoreMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn idle() -> MessageStream {
        stream::pending::<Result<BrokerMessage, natswatch_api::Error>>().boxed()
    }

    fn core(subject: &str) -> Result<BrokerMessage, natswatch_api::Error> {
        Ok(BrokerMessage::Core(CoreMessage {
            subject: subject.into(),
            payload: String::new(),
            timestamp: Utc::now(),
            headers: natswatch_api::Headers::new(),
            reply: None,
        }))
    }

    #[tokio::test]
    async fn delivers_in_order_then_ends() {
        let messages = stream::iter(vec![core("a.1"), core("a.2")]).boxed();
        let mut handle = SubscriptionHandle::spawn("a.*", SubscriptionKind::Core, messages, None);

        assert_eq!(handle.next().await.unwrap().unwrap().subject(), "a.1");
        assert_eq!(handle.next().await.unwrap().unwrap().subject(), "a.2");
        assert!(handle.next().await.is_none());
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_runs_cleanup_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let cleanup: BoxFuture<'static, ()> = Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handle = SubscriptionHandle::spawn(
            "a",
            SubscriptionKind::Core,
            idle(),
            Some(cleanup),
        );
        tokio::join!(handle.stop(), handle.stop());
        handle.stop().await;

        assert!(handle.is_stopped());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_without_stop_schedules_cleanup() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let cleanup: BoxFuture<'static, ()> = Box::pin(async move {
            let _ = done_tx.send(());
        });

        let handle = SubscriptionHandle::spawn(
            "a",
            SubscriptionKind::Core,
            idle(),
            Some(cleanup),
        );
        drop(handle);

        assert!(done_rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_stop_still_completes_cleanup() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let cleanup: BoxFuture<'static, ()> = Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handle = SubscriptionHandle::spawn(
            "a",
            SubscriptionKind::Core,
            idle(),
            Some(cleanup),
        );
        let stopped =
            tokio::time::timeout(std::time::Duration::from_millis(10), handle.stop()).await;
        assert!(stopped.is_err());
        drop(handle);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delivery_error_is_forwarded_and_ends_the_pump() {
        let messages = stream::iter(vec![
            Err(natswatch_api::Error::Closed),
            core("never"),
        ])
        .boxed();
        let mut handle = SubscriptionHandle::spawn("a", SubscriptionKind::Core, messages, None);

        assert!(matches!(handle.next().await, Some(Err(_))));
        assert!(handle.next().await.is_none());
    }
}
