// ── Cluster configuration ──
//
// These types describe *where* a cluster lives and how to authenticate.
// They never touch disk; natswatch-config reads and writes them.

use serde::{Deserialize, Serialize};

/// Identifier of the cluster synthesized from environment settings.
pub const DEFAULT_CLUSTER_ID: &str = "default";

/// One configured broker cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub id: String,
    pub name: String,
    /// Server URL(s), comma separated.
    pub url: String,
    #[serde(default)]
    pub auth: ClusterAuth,
    #[serde(default)]
    pub is_default: bool,
}

/// How to authenticate with a cluster.
///
/// Passwords may be absent here when they live in the keyring or the
/// environment; the credential provider resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClusterAuth {
    #[default]
    Anonymous,
    /// Path to a `.creds` file (user JWT + NKey seed).
    #[serde(rename = "credsfile", rename_all = "camelCase")]
    CredsFile { creds_file: String },
    UsernamePassword {
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

impl ClusterConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            auth: ClusterAuth::Anonymous,
            is_default: false,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: ClusterAuth) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Copy safe to hand to a viewer: plaintext passwords removed.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if let ClusterAuth::UsernamePassword { password, .. } = &mut out.auth {
            *password = None;
        }
        out
    }
}

/// Outcome of a one-off reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub name: String,
    pub url: String,
    pub status: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
}
