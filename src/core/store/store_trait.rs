use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a backing key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected store response: {0}")]
    Protocol(String),

    #[error("invalid base64 payload: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// Minimal key-value contract the reflectors write through.
///
/// Values are opaque bytes; encoding records is the caller's concern.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Create or overwrite `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All `(key, raw value)` pairs whose key starts with `prefix`.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Cheap liveness probe used by the store-health monitor.
    async fn health_check(&self) -> Result<(), StoreError>;
}
