use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kube_state_reflector::app_state::build_app_state;
use kube_state_reflector::bootstrap::{init_tracing, start_reflectors, ReflectorContext};
use kube_state_reflector::core::client::kube_client::build_kube_client;
use kube_state_reflector::core::config::settings::Settings;
use kube_state_reflector::core::reflector::ReflectorRegistry;
use kube_state_reflector::core::store::build_store;
use kube_state_reflector::routes::app_router;
use kube_state_reflector::scheduler::tasks::store_health::task::run_store_health_monitor;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(&settings)?;

    info!(
        backend = ?settings.store_backend,
        prefix = %settings.key_prefix,
        resources = ?settings.resources,
        "Starting kube-state-reflector"
    );

    let client = build_kube_client().await?;
    let store = build_store(&settings)?;
    let registry = ReflectorRegistry::new().shared();
    let shutdown = CancellationToken::new();

    let ctx = ReflectorContext {
        client,
        store: store.clone(),
        registry: registry.clone(),
        shutdown: shutdown.clone(),
    };
    let mut tasks = start_reflectors(&settings, &ctx).await?;

    tasks.push(tokio::spawn(run_store_health_monitor(
        store,
        registry.clone(),
        settings.health_probe_interval(),
        shutdown.clone(),
    )));

    let listener = TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server_addr))?;
    info!("Status API listening on http://{}", settings.server_addr);

    let app = app_router().with_state(build_app_state(registry));
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
    info!("Shutdown requested");
    shutdown.cancel();

    let drain = async {
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        match server.await {
            Ok(Err(e)) => error!(error = %e, "HTTP server error"),
            Err(e) => error!(error = %e, "HTTP server task failed"),
            Ok(Ok(())) => {}
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Timed out waiting for background tasks to stop");
    }

    info!("Bye");
    Ok(())
}
