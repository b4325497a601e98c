/// Re-export of the Kubernetes resource types this service mirrors

pub use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
