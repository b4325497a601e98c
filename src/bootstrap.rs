//! Process wiring: logging, reflector startup and the background tasks.

use std::fmt::Debug;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::client::mappers::{NamespaceConverter, NodeConverter, PodConverter, ServiceConverter};
use crate::core::client::watchers::KubeSourceWatcher;
use crate::core::config::settings::Settings;
use crate::core::reflector::{Converter, Reflector, ReflectorConfig, ReflectorRegistry};
use crate::core::store::KeyValueStore;

/// Console logging filtered by `RUST_LOG` (default `info`), plus a daily
/// rolling file under `log_dir` when configured. Keep the returned guard
/// alive for the life of the process so buffered file output is flushed.
pub fn init_tracing(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false);

    match settings.log_dir.as_deref() {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "kube-state-reflector.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

/// Everything a reflector needs besides its watcher and converter.
pub struct ReflectorContext {
    pub client: Client,
    pub store: Arc<dyn KeyValueStore>,
    pub registry: Arc<ReflectorRegistry>,
    pub shutdown: CancellationToken,
}

impl ReflectorContext {
    fn config(&self, settings: &Settings, resource_type: &str) -> ReflectorConfig {
        ReflectorConfig::new(resource_type)
            .with_resync_backoff(settings.resync_backoff())
            .with_event_buffer(settings.event_buffer)
    }
}

/// Create, register and start one reflector per configured resource type.
///
/// Each returned task ends after the shutdown token fires and the reflector
/// has been closed.
pub async fn start_reflectors(settings: &Settings, ctx: &ReflectorContext) -> Result<Vec<JoinHandle<()>>> {
    let mut tasks = Vec::with_capacity(settings.resources.len());

    for resource in &settings.resources {
        let prefix = settings.key_prefix.as_str();
        let task = match resource.as_str() {
            PodConverter::RESOURCE_TYPE => spawn_reflector(settings, ctx, resource, PodConverter::new(prefix)).await?,
            NamespaceConverter::RESOURCE_TYPE => {
                spawn_reflector(settings, ctx, resource, NamespaceConverter::new(prefix)).await?
            }
            NodeConverter::RESOURCE_TYPE => spawn_reflector(settings, ctx, resource, NodeConverter::new(prefix)).await?,
            ServiceConverter::RESOURCE_TYPE => {
                spawn_reflector(settings, ctx, resource, ServiceConverter::new(prefix)).await?
            }
            other => bail!("unsupported resource type '{other}' (expected pod, namespace, node or service)"),
        };
        tasks.push(task);
    }

    info!(count = tasks.len(), "All reflectors started");
    Ok(tasks)
}

async fn spawn_reflector<K, C>(
    settings: &Settings,
    ctx: &ReflectorContext,
    resource_type: &str,
    converter: C,
) -> Result<JoinHandle<()>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    C: Converter<Object = K>,
{
    let watcher = Arc::new(KubeSourceWatcher::<K>::all(ctx.client.clone()));
    let reflector = Reflector::init(
        ctx.config(settings, resource_type),
        watcher,
        Arc::new(converter),
        ctx.store.clone(),
        ctx.registry.clone(),
        ctx.shutdown.clone(),
    )
    .await
    .with_context(|| format!("failed to create {resource_type} reflector"))?;

    let running = reflector.start();
    Ok(tokio::spawn(async move {
        if let Err(e) = running.await {
            warn!(resource_type = %reflector.resource_type(), error = %e, "Reflector task failed");
        }
        if let Err(e) = reflector.close().await {
            warn!(resource_type = %reflector.resource_type(), error = %e, "Failed to close reflector");
        }
    }))
}
