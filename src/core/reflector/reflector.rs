use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::core::reflector::converter::Converter;
use crate::core::reflector::error::ReflectorError;
use crate::core::reflector::mark_and_sweep::{delete_record, mark_and_sweep, write_record, Snapshot, WriteKind};
use crate::core::reflector::registry::{ReflectorHandle, ReflectorRegistry};
use crate::core::reflector::source::{SourceEvent, SourceWatcher};
use crate::core::reflector::stats::{ReflectorStats, StatsCounters};
use crate::core::reflector::sync_state::SyncState;
use crate::core::store::KeyValueStore;

const DEFAULT_RESYNC_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    pub resource_type: String,
    /// Fixed wait between resync attempts.
    pub resync_backoff: Duration,
    /// Capacity of the watcher -> reflector event channel.
    pub event_buffer: usize,
}

impl ReflectorConfig {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resync_backoff: DEFAULT_RESYNC_BACKOFF,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_resync_backoff(mut self, backoff: Duration) -> Self {
        self.resync_backoff = backoff;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}

/// Mirrors one resource type from a [`SourceWatcher`] cache into a
/// [`KeyValueStore`].
///
/// Live events are applied only while the state is [`SyncState::Synced`].
/// Any write failure demotes the reflector and schedules a full
/// mark-and-sweep resync, retried until it succeeds or is aborted.
pub struct Reflector<W, C>
where
    W: SourceWatcher,
    C: Converter<Object = W::Object>,
{
    config: ReflectorConfig,
    watcher: Arc<W>,
    converter: Arc<C>,
    store: Arc<dyn KeyValueStore>,
    registry: Arc<ReflectorRegistry>,
    shutdown: CancellationToken,

    /// Guards the state and serializes every store mutation.
    status: Mutex<SyncState>,
    epochs: AtomicU64,
    stats: StatsCounters,

    abort_tx: mpsc::Sender<()>,
    abort_rx: Mutex<mpsc::Receiver<()>>,

    this: Weak<Self>,
}

impl<W, C> Reflector<W, C>
where
    W: SourceWatcher,
    C: Converter<Object = W::Object>,
{
    /// Create the reflector and register it under its resource type.
    ///
    /// Events are not processed until [`Reflector::start`] is called, and
    /// nothing is written until the first resync completes.
    pub async fn init(
        config: ReflectorConfig,
        watcher: Arc<W>,
        converter: Arc<C>,
        store: Arc<dyn KeyValueStore>,
        registry: Arc<ReflectorRegistry>,
        shutdown: CancellationToken,
    ) -> Result<Arc<Self>, ReflectorError> {
        let (abort_tx, abort_rx) = mpsc::channel(1);

        let reflector = Arc::new_cyclic(|this| Self {
            config,
            watcher,
            converter,
            store,
            registry: Arc::clone(&registry),
            shutdown,
            status: Mutex::new(SyncState::Unsynced),
            epochs: AtomicU64::new(0),
            stats: StatsCounters::default(),
            abort_tx,
            abort_rx: Mutex::new(abort_rx),
            this: this.clone(),
        });

        registry.register(reflector.clone()).await?;
        info!(resource_type = %reflector.config.resource_type, prefix = reflector.converter.prefix(), "Reflector initialized");
        Ok(reflector)
    }

    pub fn resource_type(&self) -> &str {
        &self.config.resource_type
    }

    /// Run the watch and the event loop on a background task.
    ///
    /// Not guarded against being called twice. The task ends when the
    /// shutdown token is cancelled.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let (tx, rx) = mpsc::channel(this.config.event_buffer);
            info!(resource_type = %this.config.resource_type, "Reflector is now running");

            tokio::join!(
                this.watcher.run(tx, this.shutdown.clone()),
                this.process_events(rx),
            );

            info!(resource_type = %this.config.resource_type, "Reflector stopped");
        })
    }

    /// Unregister from the registry. The event loop keeps running until the
    /// shutdown token fires.
    pub async fn close(&self) -> Result<(), ReflectorError> {
        self.registry.unregister(&self.config.resource_type).await?;
        info!(resource_type = %self.config.resource_type, "Reflector closed");
        Ok(())
    }

    /// Approximate counters, read without the status lock.
    pub fn stats(&self) -> ReflectorStats {
        self.stats.snapshot()
    }

    pub async fn sync_state(&self) -> SyncState {
        *self.status.lock().await
    }

    pub async fn has_synced(&self) -> bool {
        self.status.lock().await.is_synced()
    }

    /// Start a resync if the reflector is unsynced and none is running.
    pub async fn request_resync(&self) -> bool {
        let mut status = self.status.lock().await;
        let current = *status;
        match current {
            SyncState::Unsynced => self.spawn_resync(&mut status),
            SyncState::Resyncing { epoch } => {
                debug!(resource_type = %self.config.resource_type, epoch, "Resync already in progress");
                false
            }
            SyncState::Synced => {
                debug!(resource_type = %self.config.resource_type, "Data store already in sync");
                false
            }
        }
    }

    async fn process_events(&self, mut rx: mpsc::Receiver<SourceEvent<W::Object>>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
    }

    /// Apply one live event. The status lock is held for the whole call so
    /// the gate check and the write are atomic with respect to resync.
    async fn handle_event(&self, event: SourceEvent<W::Object>) {
        let mut status = self.status.lock().await;
        if !status.is_synced() {
            trace!(resource_type = %self.config.resource_type, "Data store not synced, event dropped");
            return;
        }

        let result = match &event {
            SourceEvent::Added(obj) => self.apply_add(obj).await,
            SourceEvent::Updated { old, new } => self.apply_update(old, new).await,
            SourceEvent::Deleted(obj) => self.apply_delete(obj).await,
        };

        if let Err(err) = result {
            warn!(resource_type = %self.config.resource_type, error = %err, "Data store write failed, resyncing");
            *status = SyncState::Unsynced;
            self.spawn_resync(&mut status);
        }
    }

    async fn apply_add(&self, obj: &W::Object) -> Result<(), ReflectorError> {
        let Some((key, record)) = self.converter.convert(obj) else {
            return Ok(());
        };
        write_record(&*self.store, &*self.converter, &self.stats, WriteKind::Add, &key, &record).await
    }

    async fn apply_update(&self, old: &W::Object, new: &W::Object) -> Result<(), ReflectorError> {
        let previous = self.converter.convert(old);
        let Some((key, record)) = self.converter.convert(new) else {
            // No longer mirrored.
            return match previous {
                Some((old_key, _)) => delete_record(&*self.store, &self.stats, &old_key).await,
                None => Ok(()),
            };
        };

        match previous {
            Some((old_key, old_record)) if old_key == key => {
                if old_record == record {
                    return Ok(());
                }
                write_record(&*self.store, &*self.converter, &self.stats, WriteKind::Update, &key, &record).await
            }
            Some((old_key, _)) => {
                write_record(&*self.store, &*self.converter, &self.stats, WriteKind::Update, &key, &record).await?;
                delete_record(&*self.store, &self.stats, &old_key).await
            }
            None => write_record(&*self.store, &*self.converter, &self.stats, WriteKind::Add, &key, &record).await,
        }
    }

    async fn apply_delete(&self, obj: &W::Object) -> Result<(), ReflectorError> {
        let Some((key, _)) = self.converter.convert(obj) else {
            return Ok(());
        };
        delete_record(&*self.store, &self.stats, &key).await
    }

    /// Move to `Resyncing` with a fresh epoch and launch the resync task.
    /// Caller holds the status lock.
    fn spawn_resync(&self, status: &mut SyncState) -> bool {
        let Some(this) = self.this.upgrade() else {
            return false;
        };
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        *status = SyncState::Resyncing { epoch };
        tokio::spawn(this.run_resync(epoch));
        true
    }

    /// Retry until the store is reconciled, the process terminates or the
    /// resync is aborted. A snapshot, once fetched, is reused by every retry
    /// of the mark-and-sweep pass.
    async fn run_resync(self: Arc<Self>, epoch: u64) {
        let resource_type = self.config.resource_type.clone();
        debug!(%resource_type, epoch, "Starting data sync");
        StatsCounters::incr(&self.stats.resyncs);

        loop {
            match self.fetch_snapshot().await {
                Ok(mut snapshot) => loop {
                    match self.sync_with_snapshot(&mut snapshot, epoch).await {
                        Ok(true) => {
                            info!(%resource_type, epoch, stats = ?self.stats(), "Data sync done");
                            return;
                        }
                        Ok(false) => {
                            debug!(%resource_type, epoch, "Resync superseded");
                            return;
                        }
                        Err(err) => {
                            debug!(%resource_type, epoch, error = %err, remaining = snapshot.len(), "Mark-and-sweep failed");
                        }
                    }

                    StatsCounters::incr(&self.stats.res_errors);
                    if self.wait_before_retry(epoch).await.is_break() {
                        return;
                    }
                },
                Err(err) => {
                    debug!(%resource_type, epoch, error = %err, "Error listing data store items");
                }
            }

            StatsCounters::incr(&self.stats.res_errors);
            if self.wait_before_retry(epoch).await.is_break() {
                return;
            }
        }
    }

    /// Read every record under the converter's prefix. Fails while the
    /// source cache has not completed its initial sync.
    async fn fetch_snapshot(&self) -> Result<Snapshot<C::Record>, ReflectorError> {
        if !self.watcher.has_synced() {
            return Err(ReflectorError::SourceNotSynced(self.config.resource_type.clone()));
        }

        let items = self
            .store
            .list_by_prefix(self.converter.prefix())
            .await
            .map_err(ReflectorError::Snapshot)?;

        let mut snapshot = Snapshot::with_capacity(items.len());
        for (key, raw) in items {
            match self.converter.decode(&raw) {
                Ok(record) => {
                    snapshot.insert(key, record);
                }
                Err(err) => {
                    error!(resource_type = %self.config.resource_type, key, error = %err, "Failed to decode object from data store");
                }
            }
        }
        Ok(snapshot)
    }

    /// One mark-and-sweep pass under the status lock. `Ok(false)` when this
    /// resync is no longer the current one.
    async fn sync_with_snapshot(&self, snapshot: &mut Snapshot<C::Record>, epoch: u64) -> Result<bool, ReflectorError> {
        let mut status = self.status.lock().await;
        if !status.is_resyncing_with(epoch) {
            return Ok(false);
        }

        let objects = self.watcher.list();
        mark_and_sweep(&objects, &*self.converter, &*self.store, snapshot, &self.stats).await?;

        *status = SyncState::Synced;
        Ok(true)
    }

    async fn wait_before_retry(&self, epoch: u64) -> ControlFlow<()> {
        {
            let mut abort = self.abort_rx.lock().await;
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(resource_type = %self.config.resource_type, "Resync aborted due to process termination");
                    return ControlFlow::Break(());
                }
                _ = abort.recv() => {
                    debug!(resource_type = %self.config.resource_type, "Resync aborted due to data store down");
                    return ControlFlow::Break(());
                }
                _ = tokio::time::sleep(self.config.resync_backoff) => {}
            }
        }

        if self.status.lock().await.is_resyncing_with(epoch) {
            ControlFlow::Continue(())
        } else {
            debug!(resource_type = %self.config.resource_type, epoch, "Resync superseded");
            ControlFlow::Break(())
        }
    }
}

#[async_trait]
impl<W, C> ReflectorHandle for Reflector<W, C>
where
    W: SourceWatcher,
    C: Converter<Object = W::Object>,
{
    fn resource_type(&self) -> &str {
        &self.config.resource_type
    }

    fn stats(&self) -> ReflectorStats {
        self.stats.snapshot()
    }

    async fn sync_state(&self) -> SyncState {
        *self.status.lock().await
    }

    fn abort_resync(&self) {
        match self.abort_tx.try_send(()) {
            Ok(()) => info!(resource_type = %self.config.resource_type, "Sent resync abort signal"),
            Err(TrySendError::Full(())) => {
                info!(resource_type = %self.config.resource_type, "Resync abort signal already pending")
            }
            Err(TrySendError::Closed(())) => {
                warn!(resource_type = %self.config.resource_type, "Resync abort channel closed")
            }
        }
    }

    async fn stop_store_updates(&self) {
        *self.status.lock().await = SyncState::Unsynced;
    }

    async fn drain_abort(&self) {
        match self.abort_rx.lock().await.try_recv() {
            Ok(()) => info!(resource_type = %self.config.resource_type, "Resync abort signal flushed"),
            Err(_) => debug!(resource_type = %self.config.resource_type, "No resync abort signal to flush"),
        }
    }

    async fn start_resync(&self) -> bool {
        self.request_resync().await
    }
}
