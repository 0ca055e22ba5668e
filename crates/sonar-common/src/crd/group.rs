//! SonarGroup Custom Resource Definition

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Specification for a SonarQube user group
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarGroup",
    plural = "sonargroups",
    shortname = "sgrp",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Group","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarGroupSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Group name in SonarQube
    pub name: String,

    /// Group description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Global permissions granted to the group (admin, gateadmin, scan, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl ManagedResource for SonarGroup {
    const KIND_LABEL: &'static str = "group";

    fn sonar_ref(&self) -> &str {
        &self.spec.sonar_ref
    }

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn validate(&self) -> crate::Result<()> {
        let resource = self.name_any();
        super::require_non_empty(&resource, "spec.sonarRef", &self.spec.sonar_ref)?;
        super::require_non_empty(&resource, "spec.name", &self.spec.name)?;
        super::require_non_empty_entries(&resource, "spec.permissions", &self.spec.permissions)
    }
}
