use serde::{Deserialize, Serialize};

/// Mirrored view of a Kubernetes Node.
///
/// Stored at: `{base}k8s/node/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    pub pod_cidr: Option<String>,
    #[serde(default)]
    pub addresses: Vec<NodeAddressRecord>,

    // --- System info ---
    pub kubelet_version: Option<String>,
    pub os_image: Option<String>,
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddressRecord {
    /// Hostname, InternalIP, ExternalIP, ...
    pub address_type: String,
    pub address: String,
}
