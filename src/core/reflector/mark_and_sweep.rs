use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::reflector::converter::Converter;
use crate::core::reflector::error::ReflectorError;
use crate::core::reflector::stats::StatsCounters;
use crate::core::store::KeyValueStore;

/// Records read from the store at the start of a resync, keyed by storage key.
///
/// Reconciliation removes entries as they are matched, so a retried pass only
/// sees what the failed one left behind.
pub type Snapshot<R> = HashMap<String, R>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Add,
    Update,
}

/// Put one record, counting the outcome under `kind`.
///
/// A record that fails to encode is counted as an argument error and skipped.
pub(crate) async fn write_record<C: Converter>(
    store: &dyn KeyValueStore,
    converter: &C,
    stats: &StatsCounters,
    kind: WriteKind,
    key: &str,
    record: &C::Record,
) -> Result<(), ReflectorError> {
    let value = match converter.encode(record) {
        Ok(value) => value,
        Err(err) => {
            StatsCounters::incr(&stats.arg_errors);
            warn!(key, error = %err, "failed to encode record, skipping");
            return Ok(());
        }
    };

    match (kind, store.put(key, value).await) {
        (WriteKind::Add, Ok(())) => {
            StatsCounters::incr(&stats.adds);
            debug!(key, "added item to data store");
            Ok(())
        }
        (WriteKind::Update, Ok(())) => {
            StatsCounters::incr(&stats.updates);
            debug!(key, "updated item in data store");
            Ok(())
        }
        (WriteKind::Add, Err(source)) => {
            StatsCounters::incr(&stats.add_errors);
            Err(ReflectorError::Add {
                key: key.to_string(),
                source,
            })
        }
        (WriteKind::Update, Err(source)) => {
            StatsCounters::incr(&stats.upd_errors);
            Err(ReflectorError::Update {
                key: key.to_string(),
                source,
            })
        }
    }
}

pub(crate) async fn delete_record(
    store: &dyn KeyValueStore,
    stats: &StatsCounters,
    key: &str,
) -> Result<(), ReflectorError> {
    match store.delete(key).await {
        Ok(existed) => {
            StatsCounters::incr(&stats.deletes);
            debug!(key, existed, "removed item from data store");
            Ok(())
        }
        Err(source) => {
            StatsCounters::incr(&stats.del_errors);
            Err(ReflectorError::Delete {
                key: key.to_string(),
                source,
            })
        }
    }
}

/// Reconcile the store with the source cache.
///
/// Mark: every cached object is converted and compared with its snapshot
/// entry; changed or missing records are written and matched keys removed
/// from `snapshot`. Sweep: whatever is left in `snapshot` no longer exists in
/// the cache and is deleted from the store.
///
/// Stops at the first failed write, leaving the unprocessed keys in
/// `snapshot`. Must run with the reflector's status lock held.
pub async fn mark_and_sweep<C: Converter>(
    objects: &[Arc<C::Object>],
    converter: &C,
    store: &dyn KeyValueStore,
    snapshot: &mut Snapshot<C::Record>,
    stats: &StatsCounters,
) -> Result<(), ReflectorError> {
    for obj in objects {
        let Some((key, record)) = converter.convert(obj) else {
            continue;
        };

        match snapshot.get(&key) {
            Some(stored) if *stored == record => {}
            Some(_) => write_record(store, converter, stats, WriteKind::Update, &key, &record).await?,
            None => write_record(store, converter, stats, WriteKind::Add, &key, &record).await?,
        }
        snapshot.remove(&key);
    }

    let stale: Vec<String> = snapshot.keys().cloned().collect();
    for key in stale {
        delete_record(store, stats, &key).await?;
        snapshot.remove(&key);
    }

    Ok(())
}
