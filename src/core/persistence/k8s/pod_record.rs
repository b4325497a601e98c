use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mirrored view of a Kubernetes Pod.
///
/// Stored at: `{base}k8s/pod/{name}/namespace/{namespace}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub ip_address: Option<String>,
    pub host_ip_address: Option<String>,
    pub node_name: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ContainerPortRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortRecord {
    pub name: Option<String>,
    pub container_port: i32,
    pub host_port: Option<i32>,
    pub host_ip_address: Option<String>,
    /// TCP, UDP or SCTP. Defaults to TCP.
    pub protocol: String,
}
