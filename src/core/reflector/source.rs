use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A change observed in the source cache, delivered in per-object order.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent<K> {
    Added(K),
    Updated { old: K, new: K },
    Deleted(K),
}

/// Source of truth for one resource type: a locally cached view of the
/// orchestration API plus a stream of changes to it.
#[async_trait]
pub trait SourceWatcher: Send + Sync + 'static {
    type Object: Clone + Send + Sync + 'static;

    /// True once the local cache reflects a complete initial listing.
    fn has_synced(&self) -> bool;

    /// Every object currently held in the local cache.
    fn list(&self) -> Vec<Arc<Self::Object>>;

    /// Drive the watch, pushing events onto `events` until `shutdown` fires
    /// or the receiver goes away.
    async fn run(&self, events: mpsc::Sender<SourceEvent<Self::Object>>, shutdown: CancellationToken);
}
