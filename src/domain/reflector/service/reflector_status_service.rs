use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::api::dto::reflector_dto::{ReflectorListDto, ReflectorStatusDto};
use crate::core::reflector::{ReflectorHandle, ReflectorRegistry};

async fn status_of(reflector: &dyn ReflectorHandle) -> ReflectorStatusDto {
    let sync = reflector.sync_state().await;
    ReflectorStatusDto {
        resource_type: reflector.resource_type().to_string(),
        synced: sync.is_synced(),
        sync,
        stats: reflector.stats(),
    }
}

/// Status of every registered reflector, ordered by resource type.
pub async fn list_reflectors(registry: &ReflectorRegistry) -> Result<ReflectorListDto> {
    let mut reflectors = Vec::new();
    for reflector in registry.list().await {
        reflectors.push(status_of(reflector.as_ref()).await);
    }

    Ok(ReflectorListDto {
        generated_at: Utc::now(),
        total: reflectors.len(),
        synced: reflectors.iter().filter(|r| r.synced).count(),
        reflectors,
    })
}

pub async fn get_reflector(registry: &ReflectorRegistry, resource_type: &str) -> Option<ReflectorStatusDto> {
    let reflector = registry.get(resource_type).await?;
    Some(status_of(reflector.as_ref()).await)
}

#[derive(Clone)]
pub struct ReflectorService {
    registry: Arc<ReflectorRegistry>,
}

impl ReflectorService {
    pub fn new(registry: Arc<ReflectorRegistry>) -> Self {
        Self { registry }
    }

    pub async fn list_reflectors(&self) -> Result<ReflectorListDto> {
        list_reflectors(&self.registry).await
    }

    pub async fn get_reflector(&self, resource_type: &str) -> Option<ReflectorStatusDto> {
        get_reflector(&self.registry, resource_type).await
    }
}
