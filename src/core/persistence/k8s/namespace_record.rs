use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stored at: `{base}k8s/namespace/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
