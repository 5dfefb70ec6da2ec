// ── Event envelope ──
//
// The wire unit pushed to a viewer. Outer tag `type` is `message` or
// `control`; the body sits under `payload`.

use chrono::{DateTime, Utc};
use natswatch_api::BrokerMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum EventEnvelope {
    Message(BrokerMessage),
    Control(ControlEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    ConnectionStatus(ConnectionStatusEvent),
    Heartbeat { timestamp: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatusEvent {
    pub status: ConnectionStatus,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

impl EventEnvelope {
    pub fn message(msg: BrokerMessage) -> Self {
        Self::Message(msg)
    }

    pub fn heartbeat() -> Self {
        Self::Control(ControlEvent::Heartbeat {
            timestamp: Utc::now(),
        })
    }

    pub fn status(
        status: ConnectionStatus,
        subject: &str,
        stream: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Control(ControlEvent::ConnectionStatus(ConnectionStatusEvent {
            status,
            subject: subject.to_owned(),
            stream: stream.map(str::to_owned),
            timestamp: Utc::now(),
            message: Some(message.into()),
        }))
    }

    /// Status carried by a `connection_status` control envelope.
    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        match self {
            Self::Control(ControlEvent::ConnectionStatus(ev)) => Some(ev.status),
            _ => None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Control(ControlEvent::Heartbeat { .. }))
    }

    /// Whether no further envelopes follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.connection_status(),
            Some(ConnectionStatus::Disconnected | ConnectionStatus::Error)
        )
    }
}

/// Text of the `connected` status for a subscription.
pub fn connected_message(subject: &str, stream: Option<&str>) -> String {
    match stream {
        Some(stream) => format!("Connected to JetStream {stream} on subject {subject}"),
        None => format!("Connected to NATS on subject {subject}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use natswatch_api::CoreMessage;
    use pretty_assertions::assert_eq;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn connection_status_wire_shape() {
        let env = EventEnvelope::Control(ControlEvent::ConnectionStatus(ConnectionStatusEvent {
            status: ConnectionStatus::Connected,
            subject: "orders.created".into(),
            stream: Some("ORDERS".into()),
            timestamp: ts(),
            message: Some(connected_message("orders.created", Some("ORDERS"))),
        }));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            serde_json::json!({
                "type": "control",
                "payload": {
                    "type": "connection_status",
                    "status": "connected",
                    "subject": "orders.created",
                    "stream": "ORDERS",
                    "timestamp": "2026-03-01T10:00:00Z",
                    "message": "Connected to JetStream ORDERS on subject orders.created"
                }
            })
        );
    }

    #[test]
    fn heartbeat_wire_shape() {
        let env = EventEnvelope::Control(ControlEvent::Heartbeat { timestamp: ts() });
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            serde_json::json!({
                "type": "control",
                "payload": { "type": "heartbeat", "timestamp": "2026-03-01T10:00:00Z" }
            })
        );
    }

    #[test]
    fn message_envelope_nests_broker_message() {
        let env = EventEnvelope::message(BrokerMessage::Core(CoreMessage {
            subject: "foo.bar".into(),
            payload: "hi".into(),
            timestamp: ts(),
            headers: natswatch_api::Headers::new(),
            reply: None,
        }));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["payload"]["type"], "core");
        assert_eq!(json["payload"]["subject"], "foo.bar");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn terminal_statuses() {
        let core_text = connected_message("a", None);
        assert_eq!(core_text, "Connected to NATS on subject a");
        assert!(!EventEnvelope::status(ConnectionStatus::Connected, "a", None, core_text).is_terminal());
        assert!(EventEnvelope::status(ConnectionStatus::Error, "a", None, "x").is_terminal());
        assert!(!EventEnvelope::heartbeat().is_terminal());
        assert!(EventEnvelope::heartbeat().is_heartbeat());
    }
}
