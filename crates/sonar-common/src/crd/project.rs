//! SonarProject Custom Resource Definition

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Project visibility
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectVisibility {
    /// Browsable by anyone
    Public,
    /// Restricted to users with project permissions
    #[default]
    Private,
}

impl ProjectVisibility {
    /// Wire value expected by SonarQube
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for ProjectVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specification for a SonarQube project
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarProject",
    plural = "sonarprojects",
    shortname = "sprj",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Key","type":"string","jsonPath":".spec.key"}"#,
    printcolumn = r#"{"name":"Visibility","type":"string","jsonPath":".spec.visibility"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarProjectSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Project key
    pub key: String,

    /// Display name
    pub name: String,

    /// Project visibility
    #[serde(default)]
    pub visibility: ProjectVisibility,

    /// Quality gate (by name) to associate with the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_gate: Option<String>,
}

impl ManagedResource for SonarProject {
    const KIND_LABEL: &'static str = "project";

    fn sonar_ref(&self) -> &str {
        &self.spec.sonar_ref
    }

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn validate(&self) -> crate::Result<()> {
        let resource = self.name_any();
        super::require_non_empty(&resource, "spec.sonarRef", &self.spec.sonar_ref)?;
        super::require_non_empty(&resource, "spec.key", &self.spec.key)?;
        super::require_non_empty(&resource, "spec.name", &self.spec.name)?;
        if let Some(gate) = &self.spec.quality_gate {
            super::require_non_empty(&resource, "spec.qualityGate", gate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_project() {
        let spec: SonarProjectSpec = serde_yaml::from_str(
            r#"
sonarRef: sonar
key: payments-api
name: Payments API
visibility: public
qualityGate: strict
"#,
        )
        .expect("parse spec");
        let p = SonarProject::new("payments-api", spec);
        assert_eq!(p.spec.visibility, ProjectVisibility::Public);
        assert_eq!(p.spec.quality_gate.as_deref(), Some("strict"));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn visibility_defaults_to_private() {
        let spec: SonarProjectSpec =
            serde_yaml::from_str("sonarRef: sonar\nkey: k\nname: n\n").expect("parse spec");
        assert_eq!(spec.visibility, ProjectVisibility::Private);
        assert_eq!(spec.visibility.to_string(), "private");
    }
}
