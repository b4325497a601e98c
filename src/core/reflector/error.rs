use thiserror::Error;

use crate::core::store::StoreError;

#[derive(Debug, Error)]
pub enum ReflectorError {
    #[error("{0} reflector type already exists")]
    AlreadyRegistered(String),

    #[error("{0} reflector type does not exist")]
    NotRegistered(String),

    #[error("{0}: source cache not synced")]
    SourceNotSynced(String),

    #[error("listing data store items failed: {0}")]
    Snapshot(#[source] StoreError),

    #[error("add for key '{key}' failed: {source}")]
    Add { key: String, source: StoreError },

    #[error("update for key '{key}' failed: {source}")]
    Update { key: String, source: StoreError },

    #[error("delete for key '{key}' failed: {source}")]
    Delete { key: String, source: StoreError },
}
