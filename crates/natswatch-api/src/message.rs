//! Delivered broker messages.
//!
//! A delivery is either a core message (live subject traffic, no replay)
//! or a stream message (read from a persisted stream, carries its sequence).
//! The discriminant is explicit on the wire as `"type": "core" | "jetstream"`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header name → every value sent under that name, in arrival order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// One delivered message, core or stream flavored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrokerMessage {
    Core(CoreMessage),
    #[serde(rename = "jetstream")]
    Stream(StreamMessage),
}

/// A message received on a core (at-most-once) subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMessage {
    pub subject: String,
    /// Body decoded as UTF-8 (lossy).
    pub payload: String,
    /// When natswatch received the message.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// A message read from a persisted stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub subject: String,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
    pub stream: String,
    pub seq: u64,
}

impl BrokerMessage {
    pub fn subject(&self) -> &str {
        match self {
            Self::Core(m) => &m.subject,
            Self::Stream(m) => &m.subject,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::Core(m) => &m.payload,
            Self::Stream(m) => &m.payload,
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Self::Core(m) => &m.headers,
            Self::Stream(m) => &m.headers,
        }
    }

    /// Values sent under `key`, or `None` if the header is absent.
    pub fn header_values(&self, key: &str) -> Option<&[String]> {
        self.headers().get(key).map(Vec::as_slice)
    }

    /// The stream-flavored message, if this is one.
    pub fn into_stream_message(self) -> Option<StreamMessage> {
        match self {
            Self::Stream(m) => Some(m),
            Self::Core(_) => None,
        }
    }
}

impl From<CoreMessage> for BrokerMessage {
    fn from(msg: CoreMessage) -> Self {
        Self::Core(msg)
    }
}

impl From<StreamMessage> for BrokerMessage {
    fn from(msg: StreamMessage) -> Self {
        Self::Stream(msg)
    }
}

/// Decode a raw body for display. Invalid UTF-8 is replaced, never rejected.
pub fn decode_payload(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
