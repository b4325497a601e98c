use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::core::reflector::error::ReflectorError;
use crate::core::reflector::stats::ReflectorStats;
use crate::core::reflector::sync_state::SyncState;

/// Type-erased view of a reflector, as held by the registry.
#[async_trait]
pub trait ReflectorHandle: Send + Sync {
    fn resource_type(&self) -> &str;

    fn stats(&self) -> ReflectorStats;

    async fn sync_state(&self) -> SyncState;

    /// Non-blocking push onto the abort channel; a pending signal is kept.
    fn abort_resync(&self);

    /// Force the unsynced state so live writes stop immediately.
    async fn stop_store_updates(&self);

    /// Discard any pending abort signal.
    async fn drain_abort(&self);

    /// Launch a resync unless one is running or the store is already synced.
    async fn start_resync(&self) -> bool;
}

/// Every live reflector, keyed by resource type.
///
/// Membership is expected to change only at startup and shutdown; the
/// broadcasts iterate over a copy taken when they begin.
#[derive(Default)]
pub struct ReflectorRegistry {
    reflectors: RwLock<HashMap<String, Arc<dyn ReflectorHandle>>>,
}

impl ReflectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub async fn register(&self, reflector: Arc<dyn ReflectorHandle>) -> Result<(), ReflectorError> {
        let mut reflectors = self.reflectors.write().await;
        let name = reflector.resource_type().to_string();
        if reflectors.contains_key(&name) {
            return Err(ReflectorError::AlreadyRegistered(name));
        }
        reflectors.insert(name, reflector);
        Ok(())
    }

    pub async fn unregister(&self, resource_type: &str) -> Result<Arc<dyn ReflectorHandle>, ReflectorError> {
        self.reflectors
            .write()
            .await
            .remove(resource_type)
            .ok_or_else(|| ReflectorError::NotRegistered(resource_type.to_string()))
    }

    pub async fn get(&self, resource_type: &str) -> Option<Arc<dyn ReflectorHandle>> {
        self.reflectors.read().await.get(resource_type).cloned()
    }

    /// Registered reflectors ordered by resource type.
    pub async fn list(&self) -> Vec<Arc<dyn ReflectorHandle>> {
        let mut all: Vec<Arc<dyn ReflectorHandle>> =
            self.reflectors.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.resource_type().cmp(b.resource_type()));
        all
    }

    pub async fn len(&self) -> usize {
        self.reflectors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reflectors.read().await.is_empty()
    }

    /// The backing store went down: abort in-flight resyncs and stop all
    /// live writes until the store is back and reconciled.
    pub async fn store_unavailable(&self) {
        info!("Data store down, stopping updates on all reflectors");
        for reflector in self.list().await {
            reflector.abort_resync();
            reflector.stop_store_updates().await;
        }
    }

    /// The backing store is reachable again: resync every reflector.
    pub async fn store_available(&self) {
        info!("Data store up, resyncing all reflectors");
        for reflector in self.list().await {
            reflector.drain_abort().await;
            reflector.start_resync().await;
        }
    }
}
