// natswatch-core: Subscription bridge, filter engine and connection registry
//
// Layers, leaf-first: `filter` (pure) → `registry` (pooled sessions) →
// `subscription` (uniform cancellable handles) → `bridge` (viewer event
// stream) and `range` (bounded history reads). Everything is generic over
// `natswatch_api::Broker`.

pub mod bridge;
pub mod cluster;
pub mod config;
mod consumer;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod monitor;
pub mod range;
pub mod registry;
pub mod subscription;

pub use bridge::{BridgeConfig, BridgeExit, EventBridge, SubscribeRequest};
pub use cluster::{ClusterCatalog, CredentialProvider, PlainCredentials, StaticClusters};
pub use config::{ClusterAuth, ClusterConfig, ClusterStatus, DEFAULT_CLUSTER_ID, Health};
pub use consumer::{live_consumer_name, range_consumer_name};
pub use envelope::{ConnectionStatus, ConnectionStatusEvent, ControlEvent, EventEnvelope};
pub use error::CoreError;
pub use filter::{Filter, Logic};
pub use monitor::Monitor;
pub use range::{MAX_RANGE_LIMIT, RangeReader, RangeRequest};
pub use registry::{ClusterConnection, ConnectionRegistry};
pub use subscription::{SubscriptionFactory, SubscriptionHandle, SubscriptionKind};

// Re-export the transport types callers need to wire things up.
pub use natswatch_api::{
    Broker, BrokerMessage, ConsumerInfo, CoreMessage, NatsBroker, Session, StreamInfo,
    StreamMessage, TransportConfig,
};
