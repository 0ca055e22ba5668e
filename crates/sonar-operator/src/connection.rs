//! Resolution of `spec.sonarRef` to a usable SonarQube client
//!
//! Every pass resolves afresh: the `SonarQube` object and its token Secret
//! are read from the API server and a new [`SonarClient`] is built over the
//! shared, pooled `reqwest::Client`. Nothing is cached per object.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::Api;
use kube::{Client, ResourceExt};
use tracing::debug;

use sonar_client::{SonarClient, SonarHandle};
use sonar_common::crd::SonarQube;
use sonar_common::kube_utils::get_secret_value;
use sonar_common::{Error, Result};
use sonar_engine::ConnectionResolver;

/// Resolves connections from `SonarQube` objects and their token Secrets
#[derive(Clone)]
pub struct KubeConnectionResolver {
    client: Client,
    http: reqwest::Client,
}

impl KubeConnectionResolver {
    /// Create a resolver sharing `http` across all connections
    pub fn new(client: Client, http: reqwest::Client) -> Self {
        Self { client, http }
    }

    /// Build a client for `sonarqube` regardless of its phase
    ///
    /// Used by the connection health controller, which is what moves the
    /// phase to Ready in the first place.
    pub async fn connect(&self, sonarqube: &SonarQube) -> Result<SonarClient> {
        let name = sonarqube.name_any();
        let namespace = sonarqube.namespace().unwrap_or_default();
        sonarqube.spec.validate(&name)?;

        let secret = &sonarqube.spec.token_secret_ref;
        let token = get_secret_value(&self.client, &secret.name, &namespace, &secret.key)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::dependency_not_ready(
                    &name,
                    format!("token secret {}/{} key {} is missing", namespace, secret.name, secret.key),
                )
            })?;

        Ok(SonarClient::new(self.http.clone(), &sonarqube.spec.url, token))
    }
}

/// Reject a connection whose health controller has not marked it Ready
pub fn ensure_ready(sonarqube: &SonarQube) -> Result<()> {
    let status = sonarqube.status.clone().unwrap_or_default();
    if status.is_ready() {
        return Ok(());
    }
    let detail = status
        .message
        .map(|m| format!(": {}", m))
        .unwrap_or_default();
    Err(Error::dependency_not_ready(
        sonarqube.name_any(),
        format!("phase is {}{}", status.phase, detail),
    ))
}

#[async_trait]
impl ConnectionResolver<SonarHandle> for KubeConnectionResolver {
    async fn resolve(&self, namespace: &str, reference: &str) -> Result<SonarHandle> {
        let api: Api<SonarQube> = Api::namespaced(self.client.clone(), namespace);
        let sonarqube = api.get_opt(reference).await?.ok_or_else(|| {
            Error::dependency_not_ready(reference, format!("SonarQube {}/{} not found", namespace, reference))
        })?;
        ensure_ready(&sonarqube)?;
        let client = self.connect(&sonarqube).await?;
        debug!(sonarqube = %reference, url = %client.base_url(), "Resolved connection");
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use sonar_common::crd::{SecretKeyRef, SonarQubePhase, SonarQubeSpec, SonarQubeStatus};

    use super::*;

    fn sonarqube(status: Option<SonarQubeStatus>) -> SonarQube {
        let mut sq = SonarQube::new(
            "sonar",
            SonarQubeSpec {
                url: "https://sonar.example.com".to_string(),
                token_secret_ref: SecretKeyRef {
                    name: "sonar-token".to_string(),
                    key: "token".to_string(),
                },
            },
        );
        sq.status = status;
        sq
    }

    #[test]
    fn ready_connection_passes() {
        let sq = sonarqube(Some(SonarQubeStatus {
            phase: SonarQubePhase::Ready,
            ..Default::default()
        }));
        assert!(ensure_ready(&sq).is_ok());
    }

    #[test]
    fn unprobed_connection_is_not_ready() {
        let err = ensure_ready(&sonarqube(None)).unwrap_err();
        assert!(err.is_dependency_not_ready());
        assert!(err.to_string().contains("Pending"));
    }

    #[test]
    fn failed_connection_reports_its_message() {
        let sq = sonarqube(Some(SonarQubeStatus {
            phase: SonarQubePhase::Failed,
            message: Some("server status is STARTING".to_string()),
            ..Default::default()
        }));
        let err = ensure_ready(&sq).unwrap_err();
        assert!(err.is_dependency_not_ready());
        assert!(err.to_string().contains("STARTING"));
    }
}
