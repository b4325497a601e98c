use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::reflector::ReflectorRegistry;
use crate::core::store::KeyValueStore;

/// Last observed health of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreHealth {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// What the registry must be told after a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    Available,
    Unavailable,
}

impl StoreHealth {
    /// Record a probe result, returning the broadcast it calls for.
    ///
    /// The first healthy probe counts as a transition so that reflectors get
    /// their initial resync. An unhealthy first probe changes nothing since
    /// reflectors start unsynced.
    pub fn observe(&mut self, healthy: bool) -> Option<HealthTransition> {
        let previous = *self;
        *self = if healthy { Self::Healthy } else { Self::Unhealthy };
        match (previous, healthy) {
            (Self::Unknown | Self::Unhealthy, true) => Some(HealthTransition::Available),
            (Self::Healthy, false) => Some(HealthTransition::Unavailable),
            _ => None,
        }
    }
}

/// Probe the store every `interval` and broadcast availability changes to
/// the registry until `shutdown` fires.
pub async fn run_store_health_monitor(
    store: Arc<dyn KeyValueStore>,
    registry: Arc<ReflectorRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut health = StoreHealth::default();

    info!(interval_ms = interval.as_millis() as u64, "Store health monitor started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let probe = tokio::select! {
            _ = shutdown.cancelled() => break,
            probe = store.health_check() => probe,
        };

        if let Err(e) = &probe {
            debug!(error = %e, "Store health probe failed");
        }

        match health.observe(probe.is_ok()) {
            Some(HealthTransition::Available) => registry.store_available().await,
            Some(HealthTransition::Unavailable) => {
                warn!("Backing store became unreachable");
                registry.store_unavailable().await;
            }
            None => {}
        }
    }

    info!("Store health monitor stopped");
}
