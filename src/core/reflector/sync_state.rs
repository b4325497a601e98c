use serde::Serialize;

/// Whether the backing store is believed consistent with the source cache.
///
/// Transitions:
/// `Unsynced -> Resyncing` when a resync is requested,
/// `Resyncing -> Synced` when a mark-and-sweep pass succeeds,
/// `Synced -> Unsynced` on a write failure or store outage,
/// `Resyncing -> Unsynced` when the resync is aborted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unsynced,
    /// `epoch` identifies the resync task allowed to complete.
    Resyncing { epoch: u64 },
    Synced,
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced)
    }

    /// True when the resync task started with `epoch` is still the current one.
    pub fn is_resyncing_with(&self, epoch: u64) -> bool {
        matches!(self, SyncState::Resyncing { epoch: e } if *e == epoch)
    }
}
