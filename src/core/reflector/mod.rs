//! Per-resource-type reconciliation engine mirroring a source cache into a
//! key-value store.

pub mod converter;
pub mod error;
pub mod mark_and_sweep;
pub mod reflector;
pub mod registry;
pub mod source;
pub mod stats;
pub mod sync_state;

#[cfg(test)]
pub(crate) mod test_support;

pub use converter::Converter;
pub use error::ReflectorError;
pub use reflector::{Reflector, ReflectorConfig};
pub use registry::{ReflectorHandle, ReflectorRegistry};
pub use source::{SourceEvent, SourceWatcher};
pub use stats::ReflectorStats;
pub use sync_state::SyncState;
