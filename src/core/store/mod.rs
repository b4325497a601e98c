pub mod etcd_store;
pub mod memory_store;
pub mod store_trait;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::core::config::settings::{Settings, StoreBackend};
use etcd_store::EtcdStore;
use memory_store::MemoryStore;
pub use store_trait::{KeyValueStore, StoreError};

/// Builds the backing store selected by `KSR_STORE_BACKEND`.
pub fn build_store(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    match settings.store_backend {
        StoreBackend::Etcd => {
            info!(endpoint = %settings.etcd_endpoint, "Using etcd backing store");
            Ok(Arc::new(EtcdStore::new(&settings.etcd_endpoint)?))
        }
        StoreBackend::Memory => {
            info!("Using in-memory backing store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
