use anyhow::{Context, Result};
use kube::Client;
use tracing::debug;

/// Creates a Kubernetes client from the in-cluster service account, falling
/// back to the local kubeconfig when running outside a cluster.
pub async fn build_kube_client() -> Result<Client> {
    let client = Client::try_default()
        .await
        .context("failed to build Kubernetes client (no in-cluster config or kubeconfig)")?;

    debug!(
        "Kubernetes client initialized (default namespace: {})",
        client.default_namespace()
    );
    Ok(client)
}
