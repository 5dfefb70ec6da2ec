// natswatch-api: Broker transport layer (NATS core + JetStream) behind async traits

pub mod broker;
pub mod error;
pub mod message;
pub mod nats;
pub mod transport;

pub use broker::{
    Broker, ConsumerInfo, ConsumerSpec, DEFAULT_INACTIVE_THRESHOLD, Durability, Flow,
    MessageStream, Session, StartPosition, StreamInfo,
};
pub use error::Error;
pub use message::{BrokerMessage, CoreMessage, Headers, StreamMessage};
pub use nats::{NatsBroker, NatsSession};
pub use transport::{Credentials, Endpoint, TransportConfig};
