use thiserror::Error;

/// Top-level error type for the `natswatch-api` crate.
///
/// Covers every failure mode of the broker seam: connecting and
/// authenticating, core subscriptions, JetStream management calls and
/// ephemeral consumer lifecycle. `natswatch-core` maps these into its
/// own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The server could not be reached or refused the handshake.
    #[error("Cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Credential material could not be turned into an authenticator.
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// The connection has been closed and can no longer be used.
    #[error("Connection closed")]
    Closed,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Core subscriptions ──────────────────────────────────────────
    /// Subscribing to a subject failed.
    #[error("Subscribe to '{subject}' failed: {reason}")]
    Subscribe { subject: String, reason: String },

    // ── JetStream ───────────────────────────────────────────────────
    /// The named stream does not exist.
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// No message stored at the requested sequence.
    #[error("Message not found in stream {stream} at sequence {seq}")]
    MessageNotFound { stream: String, seq: u64 },

    /// Creating an ephemeral consumer failed.
    #[error("Failed to create consumer {consumer} on stream {stream}: {reason}")]
    ConsumerCreate {
        stream: String,
        consumer: String,
        reason: String,
    },

    /// Deleting a consumer failed.
    #[error("Failed to delete consumer {consumer} on stream {stream}: {reason}")]
    ConsumerDelete {
        stream: String,
        consumer: String,
        reason: String,
    },

    /// Opening or reading a consumer's delivery sequence failed.
    #[error("Consume from {consumer} on stream {stream} failed: {reason}")]
    Consume {
        stream: String,
        consumer: String,
        reason: String,
    },

    /// Any other JetStream API failure.
    #[error("JetStream {operation} failed: {reason}")]
    JetStream {
        operation: &'static str,
        reason: String,
    },
}

impl Error {
    /// Returns `true` if this error means the connection itself is unusable
    /// and a fresh one should be established.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Closed | Self::Connect { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StreamNotFound(_) | Self::MessageNotFound { .. })
    }

    pub(crate) fn jetstream(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::JetStream {
            operation,
            reason: err.to_string(),
        }
    }
}
