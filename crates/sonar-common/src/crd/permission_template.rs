//! SonarPermissionTemplate Custom Resource Definition

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Specification for a SonarQube permission template
///
/// `groupPermissions` maps a group name to the project permissions the
/// template grants it (user, codeviewer, issueadmin, admin, scan, ...).
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarPermissionTemplate",
    plural = "sonarpermissiontemplates",
    shortname = "spt",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Template","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Default","type":"boolean","jsonPath":".spec.default"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarPermissionTemplateSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Template name
    pub name: String,

    /// Template description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Regex applied to project keys at project creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key_pattern: Option<String>,

    /// Make this the default template for new projects
    #[serde(default)]
    pub default: bool,

    /// Project permissions granted per group
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_permissions: BTreeMap<String, Vec<String>>,
}

impl ManagedResource for SonarPermissionTemplate {
    const KIND_LABEL: &'static str = "permission_template";

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
        for (group, permissions) in &self.spec.group_permissions {
            super::require_non_empty(&resource, "spec.groupPermissions", group)?;
            super::require_non_empty_entries(
                &resource,
                &format!("spec.groupPermissions.{}", group),
                permissions,
            )?;
        }
        Ok(())
    }
}
