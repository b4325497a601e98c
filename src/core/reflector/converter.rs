use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maps source objects of one resource type to storage keys and records.
///
/// Implementations are pure. Every key returned by [`Converter::convert`]
/// must start with [`Converter::prefix`], since resync lists the store by
/// that prefix.
pub trait Converter: Send + Sync + 'static {
    type Object: Send + Sync + 'static;
    type Record: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Key prefix shared by every record of this type.
    fn prefix(&self) -> &str;

    /// `None` when the object is not mirrored.
    fn convert(&self, obj: &Self::Object) -> Option<(String, Self::Record)>;

    fn encode(&self, record: &Self::Record) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(record)
    }

    fn decode(&self, raw: &[u8]) -> Result<Self::Record, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
