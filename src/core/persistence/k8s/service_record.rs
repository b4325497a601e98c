use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mirrored view of a Kubernetes Service.
///
/// Stored at: `{base}k8s/service/{name}/namespace/{namespace}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    // --- Spec ---
    pub service_type: Option<String>,
    pub cluster_ip: Option<String>,
    #[serde(default)]
    pub external_ips: Vec<String>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePortRecord>,
    pub session_affinity: Option<String>,
    pub external_traffic_policy: Option<String>,
    pub load_balancer_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortRecord {
    pub name: Option<String>,
    pub protocol: String,
    pub port: i32,
    /// Port number or named container port.
    pub target_port: Option<String>,
    pub node_port: Option<i32>,
}
