//! SonarQube connection health
//!
//! Probes `api/system/status` for every `SonarQube` object and records the
//! outcome in its status. Managed kinds only resolve a connection once this
//! controller has marked it Ready. Connections own nothing remotely, so this
//! loop is not finalizer-gated.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

use sonar_client::SystemApi;
use sonar_common::crd::{SonarQube, SonarQubePhase, SonarQubeStatus};
use sonar_common::kube_utils::patch_resource_status;
use sonar_common::metrics::{record_status_write, ErrorType, ReconcileTimer};
use sonar_common::{Error, FIELD_MANAGER};
use sonar_engine::RequeuePolicy;

use crate::connection::KubeConnectionResolver;

const KIND_LABEL: &str = "sonarqube";

/// Shared state for the connection controller
pub struct ConnectionContext {
    /// Kubernetes client for status writes
    pub client: Client,
    /// Builds clients from the object and its token Secret
    pub resolver: Arc<KubeConnectionResolver>,
    /// Probe intervals
    pub requeue: RequeuePolicy,
}

/// Reconcile one `SonarQube` object
#[instrument(skip(sonarqube, ctx), fields(sonarqube = %sonarqube.name_any()))]
pub async fn reconcile(
    sonarqube: Arc<SonarQube>,
    ctx: Arc<ConnectionContext>,
) -> Result<Action, Error> {
    let timer = ReconcileTimer::start(KIND_LABEL);
    let name = sonarqube.name_any();
    let namespace = sonarqube.namespace().unwrap_or_default();

    let status = match ctx.resolver.connect(&sonarqube).await {
        Ok(client) => probe(&client).await,
        Err(e) => unreachable(&e),
    };

    let changed = sonarqube.status.as_ref() != Some(&status);
    record_status_write(KIND_LABEL, changed);
    if changed {
        if let Err(e) =
            patch_resource_status::<SonarQube>(&ctx.client, &name, &namespace, &status, FIELD_MANAGER)
                .await
        {
            let e = Error::from(e);
            timer.error(ErrorType::of(&e));
            return Err(e);
        }
        info!(phase = %status.phase, version = ?status.version, "Connection status changed");
    } else {
        debug!("Connection status unchanged");
    }

    if status.is_ready() {
        timer.success();
        Ok(Action::requeue(ctx.requeue.success_interval))
    } else {
        timer.dependency_not_ready();
        Ok(Action::requeue(ctx.requeue.dependency_interval))
    }
}

/// Requeue after a status write failure
pub fn error_policy(sonarqube: Arc<SonarQube>, error: &Error, ctx: Arc<ConnectionContext>) -> Action {
    warn!(sonarqube = %sonarqube.name_any(), error = %error, "Connection reconcile failed");
    Action::requeue(ctx.requeue.dependency_interval)
}

/// Derive the connection status from one health probe
pub async fn probe(api: &dyn SystemApi) -> SonarQubeStatus {
    match api.system_status().await {
        Ok(status) if status.is_up() => SonarQubeStatus {
            phase: SonarQubePhase::Ready,
            version: Some(status.version),
            health: Some(status.status),
            message: None,
        },
        Ok(status) => SonarQubeStatus {
            phase: SonarQubePhase::Failed,
            message: Some(format!("server status is {}", status.status)),
            version: Some(status.version),
            health: Some(status.status),
        },
        Err(e) => unreachable(&e),
    }
}

fn unreachable(error: &Error) -> SonarQubeStatus {
    SonarQubeStatus {
        phase: SonarQubePhase::Failed,
        message: Some(error.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use sonar_client::SystemStatus;

    use super::*;
    use crate::fake::FakeSonar;

    fn server(status: &str) -> Arc<FakeSonar> {
        let fake = FakeSonar::new();
        fake.state().status = Some(SystemStatus {
            version: "10.6.0".to_string(),
            status: status.to_string(),
        });
        fake
    }

    #[tokio::test]
    async fn up_server_is_ready() {
        let fake = server("UP");
        let status = probe(fake.as_ref()).await;
        assert_eq!(status.phase, SonarQubePhase::Ready);
        assert_eq!(status.version.as_deref(), Some("10.6.0"));
        assert_eq!(status.message, None);
    }

    #[tokio::test]
    async fn starting_server_is_not_ready() {
        let fake = server("STARTING");
        let status = probe(fake.as_ref()).await;
        assert_eq!(status.phase, SonarQubePhase::Failed);
        assert_eq!(status.health.as_deref(), Some("STARTING"));
        assert!(status.message.unwrap().contains("STARTING"));
    }

    #[tokio::test]
    async fn unreachable_server_fails_with_message() {
        let fake = FakeSonar::new();
        let status = probe(fake.as_ref()).await;
        assert_eq!(status.phase, SonarQubePhase::Failed);
        assert!(status.message.unwrap().contains("connection refused"));
        assert_eq!(status.version, None);
    }

    #[tokio::test]
    async fn repeated_probe_yields_identical_status() {
        let fake = server("UP");
        assert_eq!(probe(fake.as_ref()).await, probe(fake.as_ref()).await);
    }
}
