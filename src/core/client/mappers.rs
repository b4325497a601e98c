/// Maps kube-rs / k8s-openapi types → mirrored store records
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::core::client::kube_resources::{Namespace, Node, ObjectMeta, Pod, Service};
use crate::core::persistence::k8s::namespace_record::NamespaceRecord;
use crate::core::persistence::k8s::node_record::{NodeAddressRecord, NodeRecord};
use crate::core::persistence::k8s::pod_record::{ContainerPortRecord, ContainerRecord, PodRecord};
use crate::core::persistence::k8s::service_record::{ServicePortRecord, ServiceRecord};
use crate::core::persistence::k8s::{cluster_key, namespaced_key, type_prefix};
use crate::core::reflector::Converter;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_PROTOCOL: &str = "TCP";

fn labels_of(metadata: &ObjectMeta) -> BTreeMap<String, String> {
    metadata.labels.clone().unwrap_or_default()
}

/// Name and namespace of a namespaced object; `None` when unnamed.
fn namespaced_identity(metadata: &ObjectMeta) -> Option<(String, String)> {
    let name = metadata.name.clone().filter(|n| !n.is_empty())?;
    let namespace = metadata
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    Some((name, namespace))
}

fn cluster_identity(metadata: &ObjectMeta) -> Option<String> {
    metadata.name.clone().filter(|n| !n.is_empty())
}

/// Converts a k8s-openapi Pod into a PodRecord
pub fn map_pod_to_record(pod: &Pod) -> Option<PodRecord> {
    let (name, namespace) = namespaced_identity(&pod.metadata)?;
    let spec = pod.spec.as_ref();
    let status = pod.status.as_ref();

    let containers = spec
        .map(|s| {
            s.containers
                .iter()
                .map(|c| ContainerRecord {
                    name: c.name.clone(),
                    ports: c
                        .ports
                        .iter()
                        .flatten()
                        .map(|p| ContainerPortRecord {
                            name: p.name.clone(),
                            container_port: p.container_port,
                            host_port: p.host_port,
                            host_ip_address: p.host_ip.clone(),
                            protocol: p.protocol.clone().unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(PodRecord {
        name,
        namespace,
        labels: labels_of(&pod.metadata),
        ip_address: status.and_then(|s| s.pod_ip.clone()),
        host_ip_address: status.and_then(|s| s.host_ip.clone()),
        node_name: spec.and_then(|s| s.node_name.clone()),
        containers,
    })
}

pub fn map_namespace_to_record(ns: &Namespace) -> Option<NamespaceRecord> {
    Some(NamespaceRecord {
        name: cluster_identity(&ns.metadata)?,
        labels: labels_of(&ns.metadata),
    })
}

/// Converts a k8s-openapi Node into a NodeRecord
pub fn map_node_to_record(node: &Node) -> Option<NodeRecord> {
    let name = cluster_identity(&node.metadata)?;
    let status = node.status.as_ref();
    let node_info = status.and_then(|s| s.node_info.as_ref());

    let addresses = status
        .and_then(|s| s.addresses.as_ref())
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| NodeAddressRecord {
                    address_type: a.type_.clone(),
                    address: a.address.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(NodeRecord {
        name,
        pod_cidr: node.spec.as_ref().and_then(|s| s.pod_cidr.clone()),
        addresses,
        kubelet_version: node_info.map(|i| i.kubelet_version.clone()),
        os_image: node_info.map(|i| i.os_image.clone()),
        architecture: node_info.map(|i| i.architecture.clone()),
    })
}

/// Converts a k8s-openapi Service into a ServiceRecord
pub fn map_service_to_record(svc: &Service) -> Option<ServiceRecord> {
    let (name, namespace) = namespaced_identity(&svc.metadata)?;
    let spec = svc.spec.as_ref();

    let ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| ServicePortRecord {
                    name: p.name.clone(),
                    protocol: p.protocol.clone().unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
                    port: p.port,
                    target_port: p.target_port.as_ref().map(|tp| match tp {
                        IntOrString::Int(n) => n.to_string(),
                        IntOrString::String(s) => s.clone(),
                    }),
                    node_port: p.node_port,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ServiceRecord {
        name,
        namespace,
        labels: labels_of(&svc.metadata),
        service_type: spec.and_then(|s| s.type_.clone()),
        cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
        external_ips: spec.and_then(|s| s.external_ips.clone()).unwrap_or_default(),
        selector: spec.and_then(|s| s.selector.clone()).unwrap_or_default(),
        ports,
        session_affinity: spec.and_then(|s| s.session_affinity.clone()),
        external_traffic_policy: spec.and_then(|s| s.external_traffic_policy.clone()),
        load_balancer_ip: spec.and_then(|s| s.load_balancer_ip.clone()),
    })
}

macro_rules! converter_struct {
    ($converter:ident, $type_name:literal) => {
        #[derive(Debug, Clone)]
        pub struct $converter {
            prefix: String,
        }

        impl $converter {
            pub const RESOURCE_TYPE: &'static str = $type_name;

            pub fn new(base_prefix: &str) -> Self {
                Self {
                    prefix: type_prefix(base_prefix, $type_name),
                }
            }
        }
    };
}

converter_struct!(PodConverter, "pod");
converter_struct!(NamespaceConverter, "namespace");
converter_struct!(NodeConverter, "node");
converter_struct!(ServiceConverter, "service");

impl Converter for PodConverter {
    type Object = Pod;
    type Record = PodRecord;

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn convert(&self, pod: &Pod) -> Option<(String, PodRecord)> {
        let record = map_pod_to_record(pod)?;
        Some((namespaced_key(&self.prefix, &record.name, &record.namespace), record))
    }
}

impl Converter for NamespaceConverter {
    type Object = Namespace;
    type Record = NamespaceRecord;

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn convert(&self, ns: &Namespace) -> Option<(String, NamespaceRecord)> {
        let record = map_namespace_to_record(ns)?;
        Some((cluster_key(&self.prefix, &record.name), record))
    }
}

impl Converter for NodeConverter {
    type Object = Node;
    type Record = NodeRecord;

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn convert(&self, node: &Node) -> Option<(String, NodeRecord)> {
        let record = map_node_to_record(node)?;
        Some((cluster_key(&self.prefix, &record.name), record))
    }
}

impl Converter for ServiceConverter {
    type Object = Service;
    type Record = ServiceRecord;

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn convert(&self, svc: &Service) -> Option<(String, ServiceRecord)> {
        let record = map_service_to_record(svc)?;
        Some((namespaced_key(&self.prefix, &record.name, &record.namespace), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, ContainerPort, NodeAddress, NodeSpec, NodeStatus, NodeSystemInfo, PodSpec, PodStatus,
        ServicePort, ServiceSpec,
    };

    fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn pod_is_keyed_by_name_and_namespace() {
        let pod = Pod {
            metadata: meta("web-0", Some("prod")),
            spec: Some(PodSpec {
                node_name: Some("n1".to_string()),
                containers: vec![Container {
                    name: "app".to_string(),
                    ports: Some(vec![ContainerPort {
                        container_port: 8080,
                        name: Some("http".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                pod_ip: Some("10.1.1.5".to_string()),
                host_ip: Some("192.168.0.10".to_string()),
                ..Default::default()
            }),
        };

        let (key, record) = PodConverter::new("/ksr/").convert(&pod).unwrap();
        assert_eq!(key, "/ksr/k8s/pod/web-0/namespace/prod");
        assert_eq!(record.ip_address.as_deref(), Some("10.1.1.5"));
        assert_eq!(record.node_name.as_deref(), Some("n1"));
        assert_eq!(record.labels["app"], "web");
        assert_eq!(record.containers[0].ports[0].container_port, 8080);
        assert_eq!(record.containers[0].ports[0].protocol, "TCP");
    }

    #[test]
    fn unnamed_objects_are_not_applicable() {
        let converter = NamespaceConverter::new("/ksr/");
        assert!(converter.convert(&Namespace::default()).is_none());
        assert!(PodConverter::new("/ksr/").convert(&Pod::default()).is_none());
    }

    #[test]
    fn pod_without_namespace_lands_in_default() {
        let pod = Pod {
            metadata: meta("lonely", None),
            ..Default::default()
        };
        let (key, _) = PodConverter::new("/ksr/").convert(&pod).unwrap();
        assert_eq!(key, "/ksr/k8s/pod/lonely/namespace/default");
    }

    #[test]
    fn node_addresses_and_system_info_are_mapped() {
        let node = Node {
            metadata: meta("n1", None),
            spec: Some(NodeSpec {
                pod_cidr: Some("10.1.0.0/24".to_string()),
                ..Default::default()
            }),
            status: Some(NodeStatus {
                addresses: Some(vec![NodeAddress {
                    type_: "InternalIP".to_string(),
                    address: "192.168.0.10".to_string(),
                }]),
                node_info: Some(NodeSystemInfo {
                    kubelet_version: "v1.31.0".to_string(),
                    architecture: "amd64".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        };

        let (key, record) = NodeConverter::new("/ksr/").convert(&node).unwrap();
        assert_eq!(key, "/ksr/k8s/node/n1");
        assert_eq!(record.pod_cidr.as_deref(), Some("10.1.0.0/24"));
        assert_eq!(record.addresses[0].address_type, "InternalIP");
        assert_eq!(record.kubelet_version.as_deref(), Some("v1.31.0"));
    }

    #[test]
    fn service_target_ports_render_as_strings() {
        let svc = Service {
            metadata: meta("api", Some("prod")),
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.96.0.20".to_string()),
                ports: Some(vec![
                    ServicePort {
                        port: 80,
                        target_port: Some(IntOrString::Int(8080)),
                        ..Default::default()
                    },
                    ServicePort {
                        port: 443,
                        protocol: Some("TCP".to_string()),
                        target_port: Some(IntOrString::String("https".to_string())),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (key, record) = ServiceConverter::new("/ksr/").convert(&svc).unwrap();
        assert_eq!(key, "/ksr/k8s/service/api/namespace/prod");
        assert_eq!(record.ports[0].target_port.as_deref(), Some("8080"));
        assert_eq!(record.ports[1].target_port.as_deref(), Some("https"));
        assert_eq!(record.cluster_ip.as_deref(), Some("10.96.0.20"));
    }

    #[test]
    fn identical_objects_convert_to_equal_records() {
        let converter = NamespaceConverter::new("/ksr/");
        let a = Namespace {
            metadata: meta("prod", None),
            ..Default::default()
        };
        let mut b = a.clone();
        b.metadata.resource_version = Some("42".to_string());

        assert_eq!(converter.convert(&a), converter.convert(&b));
    }
}
