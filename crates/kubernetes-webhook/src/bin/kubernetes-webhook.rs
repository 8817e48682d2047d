//! Kubernetes webhook binary.
//!
//! Standalone HTTP service answering API.AI intents for one GKE cluster.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kubernetes_webhook::auth::BasicCredentials;
use kubernetes_webhook::server::{self, AppState};
use kubernetes_webhook::{
    ClusterContext, Config, Dispatcher, GoogleCloudInventory, KubeDeployments,
    ServiceAccountTokenSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting Kubernetes webhook...");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        namespace = %config.namespace,
        cluster_id = %config.cluster_id,
        project_id = %config.project_id,
        zone = %config.zone,
        "Loaded configuration"
    );

    let tokens = ServiceAccountTokenSource::from_file(&config.service_account_file)
        .context("Failed to load service account credentials")?;
    let inventory = GoogleCloudInventory::new(
        Arc::new(tokens),
        config.container_api_url.clone(),
        config.compute_api_url.clone(),
    )
    .context("Failed to create cluster inventory client")?;

    let kube_client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes");

    let dispatcher = Dispatcher::new(
        Arc::new(KubeDeployments::new(kube_client)),
        Arc::new(inventory),
        ClusterContext::from(&config),
    );

    let state = AppState {
        credentials: BasicCredentials::new(
            config.basic_auth_username.clone(),
            config.basic_auth_password.clone(),
        ),
        dispatcher: Arc::new(dispatcher),
    };

    server::serve(state, config.port, shutdown_signal()).await?;

    info!("Kubernetes webhook stopped");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("kubernetes_webhook=info,tower_http=info"))?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
