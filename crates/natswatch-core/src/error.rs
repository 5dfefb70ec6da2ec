// ── Core error types ──
//
// User-facing errors from natswatch-core. Consumers never see raw client
// library failures; the `From<natswatch_api::Error>` impl translates
// transport-layer errors into the taxonomy below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Cannot reach or authenticate to a cluster. Never retried here.
    #[error("Cannot connect to cluster '{cluster}': {reason}")]
    Connection { cluster: String, reason: String },

    // ── Resource errors ──────────────────────────────────────────────
    /// A server-side resource (ephemeral consumer) could not be created.
    #[error("Failed to create {resource}: {reason}")]
    ResourceCreation { resource: String, reason: String },

    // ── Viewer transport ─────────────────────────────────────────────
    /// Writing to the viewer failed; equivalent to the viewer leaving.
    #[error("Viewer transport failed: {0}")]
    Transport(String),

    // ── Request errors ───────────────────────────────────────────────
    /// Rejected before any resource was created.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cluster {id} not found")]
    ClusterNotFound { id: String },

    #[error("No NATS clusters configured")]
    NoClusters,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    // ── Broker errors (wrapped, not exposed raw) ─────────────────────
    #[error("Broker error: {message}")]
    Broker { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the request itself was at fault (maps to HTTP 400).
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::ClusterNotFound { .. } | Self::NoClusters
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn connection(cluster: &str, err: impl std::fmt::Display) -> Self {
        Self::Connection {
            cluster: cluster.to_owned(),
            reason: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<natswatch_api::Error> for CoreError {
    fn from(err: natswatch_api::Error) -> Self {
        use natswatch_api::Error as Api;

        match err {
            Api::Connect { url, reason } => CoreError::Connection {
                cluster: url,
                reason,
            },
            Api::Credentials(reason) => CoreError::Connection {
                cluster: String::new(),
                reason: format!("invalid credentials: {reason}"),
            },
            Api::Closed => CoreError::Connection {
                cluster: String::new(),
                reason: "connection closed".into(),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::StreamNotFound(name) => CoreError::NotFound {
                entity: "Stream".into(),
                identifier: name,
            },
            Api::MessageNotFound { stream, seq } => CoreError::NotFound {
                entity: "Message".into(),
                identifier: format!("{stream}#{seq}"),
            },
            Api::ConsumerCreate {
                stream,
                consumer,
                reason,
            } => CoreError::ResourceCreation {
                resource: format!("consumer {consumer} on stream {stream}"),
                reason,
            },
            e @ (Api::Subscribe { .. }
            | Api::ConsumerDelete { .. }
            | Api::Consume { .. }
            | Api::JetStream { .. }) => CoreError::Broker {
                message: e.to_string(),
            },
        }
    }
}
