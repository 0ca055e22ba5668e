//! SonarQube Custom Resource Definition
//!
//! A `SonarQube` object describes one reachable SonarQube server and the
//! Secret holding an admin token for it. Managed kinds reference it by name
//! through `spec.sonarRef`; they only reconcile once its phase is `Ready`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::SecretKeyRef;

/// Phase of a SonarQube connection
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SonarQubePhase {
    /// Not yet probed
    #[default]
    Pending,
    /// Server answered with status `UP`
    Ready,
    /// Server unreachable, token missing, or not yet up
    Failed,
}

impl std::fmt::Display for SonarQubePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of a SonarQube connection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SonarQubeStatus {
    /// Current phase
    #[serde(default)]
    pub phase: SonarQubePhase,

    /// Server version reported by `api/system/status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Raw server status (UP, STARTING, DB_MIGRATION_NEEDED, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SonarQubeStatus {
    /// Whether managed kinds may use this connection
    pub fn is_ready(&self) -> bool {
        self.phase == SonarQubePhase::Ready
    }
}

/// Specification for a SonarQube connection
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarQube",
    plural = "sonarqubes",
    shortname = "sq",
    namespaced,
    status = "SonarQubeStatus",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarQubeSpec {
    /// Base URL of the server (e.g. `https://sonar.example.com`)
    pub url: String,

    /// Secret key holding a user token with admin rights
    pub token_secret_ref: SecretKeyRef,
}

impl SonarQubeSpec {
    /// Validate the connection spec
    pub fn validate(&self, resource: &str) -> crate::Result<()> {
        super::require_non_empty(resource, "spec.url", &self.url)?;
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(crate::Error::validation_for_field(
                resource,
                "spec.url",
                format!("url must use http or https: {}", self.url),
            ));
        }
        super::require_non_empty(resource, "spec.tokenSecretRef.name", &self.token_secret_ref.name)?;
        super::require_non_empty(resource, "spec.tokenSecretRef.key", &self.token_secret_ref.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_spec(yaml: &str) -> SonarQubeSpec {
        serde_yaml::from_str(yaml).expect("parse spec")
    }

    #[test]
    fn parses_connection_spec() {
        let spec = parse_spec(
            r#"
url: https://sonar.example.com
tokenSecretRef:
  name: sonar-admin
  key: admin-token
"#,
        );
        assert_eq!(spec.url, "https://sonar.example.com");
        assert_eq!(spec.token_secret_ref.name, "sonar-admin");
        assert_eq!(spec.token_secret_ref.key, "admin-token");
        assert!(spec.validate("sonar").is_ok());
    }

    #[test]
    fn rejects_non_http_url() {
        let spec = parse_spec(
            r#"
url: sonar.example.com
tokenSecretRef:
  name: sonar-admin
"#,
        );
        assert!(spec.validate("sonar").is_err());
    }

    #[test]
    fn only_ready_phase_is_usable() {
        let mut status = SonarQubeStatus::default();
        assert!(!status.is_ready());
        status.phase = SonarQubePhase::Failed;
        assert!(!status.is_ready());
        status.phase = SonarQubePhase::Ready;
        assert!(status.is_ready());
        assert_eq!(status.phase.to_string(), "Ready");
    }
}
