//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use natswatch_config::ConfigError;
use natswatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to cluster '{cluster}'")]
    #[diagnostic(
        code(natswatch::connection_failed),
        help(
            "{reason}\n\
             Check the server URL and that the broker is running.\n\
             Try: natswatch clusters test {cluster}"
        )
    )]
    ConnectionFailed { cluster: String, reason: String },

    #[error("No password available for cluster '{cluster}'")]
    #[diagnostic(
        code(natswatch::no_credentials),
        help("Set NATSWATCH_PASSWORD or store one with: natswatch clusters add --username")
    )]
    NoCredentials { cluster: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(natswatch::not_found),
        help("Run: natswatch {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No NATS clusters configured")]
    #[diagnostic(
        code(natswatch::no_clusters),
        help(
            "Set NATS_URL, or enable multi-cluster mode and add one:\n\
             NATSWATCH_MULTICLUSTER=true natswatch clusters add <name> <url>"
        )
    )]
    NoClusters,

    // ── Broker ───────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(natswatch::broker))]
    Broker { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(natswatch::validation))]
    Validation { field: String, reason: String },

    #[error("Multi-cluster support is not enabled")]
    #[diagnostic(
        code(natswatch::multicluster_disabled),
        help("Set `multicluster = true` in the config file or NATSWATCH_MULTICLUSTER=true.")
    )]
    MulticlusterDisabled,

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(natswatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration error: {message}")]
    #[diagnostic(code(natswatch::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Subscription timed out")]
    #[diagnostic(
        code(natswatch::timeout),
        help("Subscriptions close after the idle timeout; raise idle_timeout_secs to keep them open longer.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(natswatch::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::NoClusters => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::MulticlusterDisabled
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connection { cluster, reason } => {
                if reason.contains("no password") {
                    CliError::NoCredentials { cluster }
                } else {
                    CliError::ConnectionFailed { cluster, reason }
                }
            }

            CoreError::ClusterNotFound { id } => CliError::NotFound {
                resource_type: "cluster".into(),
                identifier: id,
                list_command: "clusters list".into(),
            },

            CoreError::NoClusters => CliError::NoClusters,

            CoreError::NotFound { entity, identifier } => CliError::NotFound {
                list_command: if entity.eq_ignore_ascii_case("stream") {
                    "streams".into()
                } else {
                    "messages range <stream>".into()
                },
                resource_type: entity,
                identifier,
            },

            CoreError::InvalidRequest(reason) => CliError::Validation {
                field: "request".into(),
                reason,
            },

            CoreError::Config { message } => CliError::Config { message },

            other @ (CoreError::ResourceCreation { .. }
            | CoreError::Transport(_)
            | CoreError::Broker { .. }
            | CoreError::Internal(_)) => CliError::Broker {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::MulticlusterDisabled => CliError::MulticlusterDisabled,
            ConfigError::ClusterNotFound { id } => CliError::NotFound {
                resource_type: "cluster".into(),
                identifier: id,
                list_command: "clusters list".into(),
            },
            ConfigError::NoCredentials { cluster } => CliError::NoCredentials { cluster },
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Json(e) => CliError::Json(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let not_found: CliError = CoreError::ClusterNotFound { id: "x".into() }.into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let refused: CliError = CoreError::Connection {
            cluster: "a".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert_eq!(refused.exit_code(), exit_code::CONNECTION);

        let disabled: CliError = ConfigError::MulticlusterDisabled.into();
        assert_eq!(disabled.exit_code(), exit_code::USAGE);

        assert_eq!(CliError::Timeout.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn missing_password_is_an_auth_error() {
        let err: CliError = CoreError::Connection {
            cluster: "prod".into(),
            reason: "no password available for cluster 'prod'".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
