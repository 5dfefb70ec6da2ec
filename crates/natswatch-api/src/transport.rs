// Shared transport configuration for establishing broker connections.
//
// Every connection natswatch opens (pooled, health-check, CLI one-shot)
// goes through `TransportConfig` + `Endpoint`, so timeout and client-name
// settings are never duplicated at call sites.

use std::time::Duration;

use secrecy::SecretString;

/// What the server needs to authenticate this client.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No authentication.
    Anonymous,
    /// Contents of a `.creds` file (user JWT + NKey seed).
    CredsFile(SecretString),
    /// Plain username/password.
    UserPassword {
        username: String,
        password: SecretString,
    },
}

/// A resolved server address plus the credentials to present.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Server URL(s), comma separated (e.g. `nats://127.0.0.1:4222`).
    pub url: String,
    pub credentials: Credentials,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
        }
    }

    pub fn anonymous(url: impl Into<String>) -> Self {
        Self::new(url, Credentials::Anonymous)
    }

    /// Split the URL field into individual server addresses.
    pub fn servers(&self) -> Vec<&str> {
        self.url
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Connection tuning applied to every established session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Give up on the initial handshake after this long.
    pub connect_timeout: Duration,
    /// Client-side keepalive ping cadence.
    pub ping_interval: Duration,
    /// Name announced to the server (visible in server connection lists).
    pub client_name: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(60),
            client_name: format!("natswatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Tighter settings for one-off reachability probes.
    pub fn probe() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(5),
            ..Self::default()
        }
    }
}
