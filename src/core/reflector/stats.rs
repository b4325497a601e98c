use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of a reflector's usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReflectorStats {
    pub adds: u64,
    pub deletes: u64,
    pub updates: u64,
    pub resyncs: u64,

    pub arg_errors: u64,
    pub add_errors: u64,
    pub del_errors: u64,
    pub upd_errors: u64,
    pub res_errors: u64,
}

/// Monotonic counters. Relaxed ordering: readers get an approximate view.
#[derive(Debug, Default)]
pub struct StatsCounters {
    pub(crate) adds: AtomicU64,
    pub(crate) deletes: AtomicU64,
    pub(crate) updates: AtomicU64,
    pub(crate) resyncs: AtomicU64,

    pub(crate) arg_errors: AtomicU64,
    pub(crate) add_errors: AtomicU64,
    pub(crate) del_errors: AtomicU64,
    pub(crate) upd_errors: AtomicU64,
    pub(crate) res_errors: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReflectorStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ReflectorStats {
            adds: load(&self.adds),
            deletes: load(&self.deletes),
            updates: load(&self.updates),
            resyncs: load(&self.resyncs),
            arg_errors: load(&self.arg_errors),
            add_errors: load(&self.add_errors),
            del_errors: load(&self.del_errors),
            upd_errors: load(&self.upd_errors),
            res_errors: load(&self.res_errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let counters = StatsCounters::default();
        StatsCounters::incr(&counters.adds);
        StatsCounters::incr(&counters.adds);
        StatsCounters::incr(&counters.res_errors);

        let stats = counters.snapshot();
        assert_eq!(stats.adds, 2);
        assert_eq!(stats.res_errors, 1);
        assert_eq!(stats.deletes, 0);
    }
}
