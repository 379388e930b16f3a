use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::models::Platform;
use crate::transport::{PushTransport, TransportFactory};

/// Memoized transport per platform, owned by the composition root
///
/// **Thread-safety**: construction happens inside the DashMap entry lock, so
/// concurrent misses for one platform build exactly one transport.
pub struct DispatcherRegistry {
    factory: Arc<dyn TransportFactory>,
    dispatchers: DashMap<Platform, Arc<dyn PushTransport>>,
}

impl DispatcherRegistry {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            dispatchers: DashMap::new(),
        }
    }

    pub fn get_dispatcher(&self, platform: Platform) -> Arc<dyn PushTransport> {
        if let Some(existing) = self.dispatchers.get(&platform) {
            return existing.value().clone();
        }

        self.dispatchers
            .entry(platform)
            .or_insert_with(|| {
                debug!(platform = %platform, "Creating push transport");
                self.factory.create(platform)
            })
            .value()
            .clone()
    }

    pub fn cached_platforms(&self) -> usize {
        self.dispatchers.len()
    }
}
