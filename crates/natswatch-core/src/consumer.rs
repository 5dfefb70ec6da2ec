// Ephemeral consumer bookkeeping shared by live subscriptions and range reads.
//
// Acquisition is two-phase: the consumer is registered server-side, then
// a delivery handle is requested. A `ConsumerGuard` is armed before the
// registration request goes out, so every exit path deletes the consumer
// exactly once, including a caller dropping the future mid-request.

use futures_util::future::BoxFuture;
use natswatch_api::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;

const LIVE_PREFIX: &str = "_natswatch_";
const RANGE_PREFIX: &str = "_natswatch_range_";

/// Collision-free name for a live-tail consumer.
pub fn live_consumer_name() -> String {
    format!("{LIVE_PREFIX}{}", Uuid::new_v4())
}

/// Collision-free name for a range-read consumer.
pub fn range_consumer_name() -> String {
    format!("{RANGE_PREFIX}{}", Uuid::new_v4())
}

/// Delete a consumer, logging instead of raising on failure.
///
/// The server reaps abandoned consumers after their inactivity threshold,
/// so a failed delete is not fatal.
pub(crate) async fn delete_consumer<S: Session>(session: &S, stream: &str, consumer: &str) {
    match session.delete_consumer(stream, consumer).await {
        Ok(()) => debug!(stream, consumer, "deleted ephemeral consumer"),
        Err(e) => warn!(stream, consumer, error = %e, "failed to delete ephemeral consumer"),
    }
}

/// Map a consumer setup failure onto the core taxonomy.
pub(crate) fn resource_error(stream: &str, consumer: &str, err: &natswatch_api::Error) -> CoreError {
    match err {
        natswatch_api::Error::StreamNotFound(_) => CoreError::NotFound {
            entity: "Stream".into(),
            identifier: stream.to_owned(),
        },
        _ => CoreError::ResourceCreation {
            resource: format!("consumer {consumer} on stream {stream}"),
            reason: err.to_string(),
        },
    }
}

/// Ownership of a registered consumer that has not been handed off yet.
///
/// Dropping an armed guard schedules the deletion on the current runtime.
pub(crate) struct ConsumerGuard<S: Session> {
    session: S,
    stream: String,
    consumer: String,
    armed: bool,
}

impl<S: Session> ConsumerGuard<S> {
    pub(crate) fn new(session: S, stream: &str, consumer: &str) -> Self {
        Self {
            session,
            stream: stream.to_owned(),
            consumer: consumer.to_owned(),
            armed: true,
        }
    }

    /// Registration was rejected, so there is nothing to delete.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }

    /// Delete the consumer now.
    pub(crate) async fn release(mut self) {
        self.armed = false;
        delete_consumer(&self.session, &self.stream, &self.consumer).await;
    }

    /// Hand the deletion to a later owner as a boxed future.
    pub(crate) fn into_cleanup(mut self) -> BoxFuture<'static, ()> {
        self.armed = false;
        let session = self.session.clone();
        let stream = std::mem::take(&mut self.stream);
        let consumer = std::mem::take(&mut self.consumer);
        Box::pin(async move { delete_consumer(&session, &stream, &consumer).await })
    }
}

impl<S: Session> Drop for ConsumerGuard<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let session = self.session.clone();
        let stream = std::mem::take(&mut self.stream);
        let consumer = std::mem::take(&mut self.consumer);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move { delete_consumer(&session, &stream, &consumer).await });
            }
            Err(_) => warn!(
                stream = %stream,
                consumer = %consumer,
                "no runtime to delete ephemeral consumer; left to inactivity threshold"
            ),
        }
    }
}
