//! Shared configuration for the natswatch server and CLI.
//!
//! Settings loading (TOML + environment), the persisted cluster list,
//! credential resolution (env + keyring + plaintext) and the file-backed
//! [`ClusterCatalog`](natswatch_core::ClusterCatalog) implementation.

pub mod catalog;
pub mod store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use natswatch_api::{Credentials, TransportConfig};
use natswatch_core::cluster::{CredentialProvider, read_creds_file};
use natswatch_core::{BridgeConfig, ClusterAuth, ClusterConfig, CoreError};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use catalog::FileCatalog;
pub use store::{ClusterDraft, ClusterStore};

/// Keyring service name for stored cluster passwords.
pub const KEYRING_SERVICE: &str = "natswatch";

/// Environment variable consulted first for any cluster password.
pub const PASSWORD_ENV: &str = "NATSWATCH_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Multi-cluster support is not enabled")]
    MulticlusterDisabled,

    #[error("Cluster {id} not found")]
    ClusterNotFound { id: String },

    #[error("no password available for cluster '{cluster}'")]
    NoCredentials { cluster: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to read cluster list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ClusterNotFound { id } => CoreError::ClusterNotFound { id },
            other => CoreError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub listen: String,

    /// Allow a stored, editable cluster list in addition to the env cluster.
    pub multicluster: bool,

    /// URL of the env-derived `default` cluster.
    pub nats_url: Option<String>,

    /// Creds file for the env-derived cluster.
    pub nats_creds_path: Option<String>,

    /// Directory holding `clusters.json`.
    pub data_dir: Option<PathBuf>,

    pub heartbeat_secs: u64,
    pub idle_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub range_idle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            multicluster: false,
            nats_url: None,
            nats_creds_path: None,
            data_dir: None,
            heartbeat_secs: 15,
            idle_timeout_secs: 300,
            connect_timeout_secs: 10,
            range_idle_ms: 2000,
        }
    }
}

impl Settings {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.max(1)),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            ..TransportConfig::default()
        }
    }

    pub fn range_idle(&self) -> Duration {
        Duration::from_millis(self.range_idle_ms.max(1))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn clusters_file(&self) -> PathBuf {
        self.data_dir().join(store::CLUSTERS_FILE)
    }

    /// The cluster synthesized from `nats_url` / `nats_creds_path`.
    pub fn env_cluster(&self) -> Option<ClusterConfig> {
        let url = self.nats_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let auth = match self.nats_creds_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => ClusterAuth::CredsFile {
                creds_file: path.to_owned(),
            },
            None => ClusterAuth::Anonymous,
        };
        Some(
            ClusterConfig::new(natswatch_core::DEFAULT_CLUSTER_ID, "Default", url)
                .with_auth(auth)
                .as_default(),
        )
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "natswatch", "natswatch")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where `clusters.json` lives unless `data_dir` says otherwise.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("natswatch");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the canonical config file + environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings from `path` (missing file is fine) + environment.
///
/// Precedence, lowest first: defaults, TOML file, `NATSWATCH_*`,
/// then the bare `NATS_URL` / `NATS_CREDS_PATH` variables.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NATSWATCH_").ignore(&["password"]))
        .merge(Env::raw().only(&["NATS_URL", "NATS_CREDS_PATH"]))
        .extract()?;

    if let Some(url) = settings.nats_url.as_deref().filter(|u| !u.is_empty()) {
        validate_url(url)?;
    }
    Ok(settings)
}

/// Write settings to `path` as TOML, creating parent directories.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = toml::to_string_pretty(settings)?;
    std::fs::write(path, rendered)?;
    tracing::debug!(path = %path.display(), "settings written");
    Ok(())
}

/// Check every comma-separated server address parses as a URL.
pub fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let servers: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if servers.is_empty() {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: "at least one server URL is required".into(),
        });
    }
    for server in servers {
        url::Url::parse(server).map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: format!("{server}: {e}"),
        })?;
    }
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(cluster_id: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{cluster_id}/password"),
    )?)
}

/// Resolve a cluster password: env var, then keyring, then plaintext.
pub fn resolve_password(cluster_id: &str, plaintext: Option<&str>) -> Option<SecretString> {
    // 1. Env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(pw));
    }

    // 2. Keyring
    if let Ok(entry) = keyring_entry(cluster_id) {
        if let Ok(pw) = entry.get_password() {
            return Some(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    plaintext.map(|pw| SecretString::from(pw.to_owned()))
}

/// Store a cluster password in the system keyring.
pub fn store_password(cluster_id: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(cluster_id)?.set_password(password)?;
    Ok(())
}

/// Remove a stored password. Missing entries are not an error.
pub fn forget_password(cluster_id: &str) -> Result<(), ConfigError> {
    match keyring_entry(cluster_id)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Credentials with passwords resolved through env, keyring and plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedCredentials;

impl CredentialProvider for ResolvedCredentials {
    fn credentials(&self, cluster: &ClusterConfig) -> Result<Credentials, CoreError> {
        match &cluster.auth {
            ClusterAuth::Anonymous => Ok(Credentials::Anonymous),
            ClusterAuth::CredsFile { creds_file } => read_creds_file(&cluster.id, creds_file),
            ClusterAuth::UsernamePassword { username, password } => {
                let password = resolve_password(&cluster.id, password.as_deref()).ok_or_else(
                    || CoreError::Connection {
                        cluster: cluster.id.clone(),
                        reason: ConfigError::NoCredentials {
                            cluster: cluster.id.clone(),
                        }
                        .to_string(),
                    },
                )?;
                Ok(Credentials::UserPassword {
                    username: username.clone(),
                    password,
                })
            }
        }
    }
}
