//! Records mirrored into the backing store, one module per resource type.
//!
//! Key layout: `{base}k8s/{type}/{name}` for cluster-scoped objects and
//! `{base}k8s/{type}/{name}/namespace/{namespace}` for namespaced ones.

pub mod namespace_record;
pub mod node_record;
pub mod pod_record;
pub mod service_record;

/// Key prefix of every record of `resource_type` under `base`.
pub fn type_prefix(base: &str, resource_type: &str) -> String {
    format!("{base}k8s/{resource_type}/")
}

pub fn namespaced_key(type_prefix: &str, name: &str, namespace: &str) -> String {
    format!("{type_prefix}{name}/namespace/{namespace}")
}

pub fn cluster_key(type_prefix: &str, name: &str) -> String {
    format!("{type_prefix}{name}")
}
