//! SonarQube operator entry point

use std::sync::Arc;

use clap::Parser;
use kube::Client;

use sonar_client::build_http_client;
use sonar_common::kube_utils::{apply_crd, create_client};
use sonar_common::telemetry::{init_telemetry, TelemetryConfig};
use sonar_common::FIELD_MANAGER;
use sonar_operator::config::Config;
use sonar_operator::connection::KubeConnectionResolver;
use sonar_operator::health::{self, HealthState};
use sonar_operator::registry::{crds, ControllerRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    if config.crd {
        for crd in crds() {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_telemetry(TelemetryConfig::default())?;

    let client = create_client()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    ensure_crds_installed(&client).await?;

    let health_state = HealthState::default();
    let health_addr = config.health_addr();
    let server_state = health_state.clone();
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_addr, server_state).await {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    let http = build_http_client(config.http_timeout())?;
    let resolver = Arc::new(KubeConnectionResolver::new(client.clone(), http));
    let registry = ControllerRegistry::builder(client, resolver)
        .requeue(config.requeue_policy())
        .watch_namespace(config.watch_namespace.clone())
        .with_all_kinds();

    tracing::info!(
        kinds = ?registry.kinds(),
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        "Starting controllers"
    );
    let controllers = registry.build();
    health_state.set_ready();

    futures::future::join_all(controllers).await;
    tracing::info!("Controllers stopped");
    Ok(())
}

/// Install every CRD via server-side apply so versions match the binary
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    for crd in crds() {
        apply_crd(client, &crd, FIELD_MANAGER).await?;
    }
    tracing::info!("All SonarQube CRDs installed/updated");
    Ok(())
}
