use std::sync::Arc;
use std::time::Duration;

use natswatch_core::{
    BridgeConfig, Broker, ConnectionRegistry, EventBridge, Monitor, RangeReader,
    SubscriptionFactory,
};

/// Shared handler state. Cloning is cheap; everything sits behind `Arc`s.
pub struct AppState<B: Broker> {
    pub registry: Arc<ConnectionRegistry<B>>,
    pub bridge: EventBridge<B>,
    pub range: RangeReader<B>,
    pub monitor: Monitor<B>,
}

impl<B: Broker> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            bridge: self.bridge.clone(),
            range: self.range.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<B: Broker> AppState<B> {
    /// Wire every component onto one shared registry.
    pub fn new(
        registry: Arc<ConnectionRegistry<B>>,
        bridge_config: BridgeConfig,
        range_idle: Duration,
    ) -> Self {
        let factory = SubscriptionFactory::new(Arc::clone(&registry));
        Self {
            bridge: EventBridge::new(factory, bridge_config),
            range: RangeReader::new(Arc::clone(&registry)).with_idle(range_idle),
            monitor: Monitor::new(Arc::clone(&registry)),
            registry,
        }
    }
}
