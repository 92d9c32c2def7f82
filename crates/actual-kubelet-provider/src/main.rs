//! actual-kubelet - a kubelet that runs pods on another cluster.
//!
//! The daemon loads its TOML configuration, connects to the local and
//! remote clusters, starts the remote pod-change subscription, and
//! serves health endpoints until interrupted.
//!
//! # Environment
//!
//! - `AK_CONFIG` - path to the provider config file (required)
//! - `AK_NODE_NAME` - node name of this synthetic kubelet, unique within
//!   the remote cluster (required)
//! - `LISTEN_ADDR` - health endpoint address (default `0.0.0.0:10255`)

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use actual_kubelet_cluster::KubeCluster;
use actual_kubelet_provider::{ConfigFile, Provider, RemoteProvider};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "actual-kubelet",
    })
}

async fn ready_handler() -> &'static str {
    "ready"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actual_kubelet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("AK_CONFIG").map_err(|_| "AK_CONFIG must point at the provider config file")?;
    let node_name =
        std::env::var("AK_NODE_NAME").map_err(|_| "AK_NODE_NAME must name this kubelet")?;

    let config = ConfigFile::load(&config_path)?;
    tracing::info!(config_path = %config_path, "loaded provider configuration");

    let local = KubeCluster::connect(&config.local.kubeconfig_path, config.local.resync()?).await?;
    let remote =
        KubeCluster::connect(&config.remote.kubeconfig_path, config.remote.resync()?).await?;
    tracing::info!("connected to local and remote clusters");

    let provider = Arc::new(RemoteProvider::new(
        node_name.clone(),
        Arc::new(local),
        Arc::new(remote),
        config,
    ));

    let cancel = CancellationToken::new();
    provider.notify_pods(
        cancel.clone(),
        Arc::new(|pod| {
            let namespace = pod.metadata.namespace.as_deref().unwrap_or_default().to_string();
            let name = pod.metadata.name.as_deref().unwrap_or_default().to_string();
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default();
            tracing::debug!(
                namespace = %namespace,
                name = %name,
                phase = %phase,
                "observed remote pod change"
            );
        }),
    );
    tracing::info!("started remote pod subscription");

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:10255".to_string());
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(listen_addr = %listen_addr, node_name = %node_name, "actual-kubelet is serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            cancel.cancel();
        })
        .await?;

    Ok(())
}
