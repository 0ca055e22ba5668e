//! SonarUser Custom Resource Definition
//!
//! Users are created as non-local accounts (SSO/LDAP). Deleting the object
//! deactivates the account in SonarQube; SonarQube never hard-deletes users.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Specification for a SonarQube user
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarUser",
    plural = "sonarusers",
    shortname = "susr",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Login","type":"string","jsonPath":".spec.login"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarUserSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Unique login
    pub login: String,

    /// Display name
    pub name: String,

    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Groups the user belongs to (the built-in `sonar-users` is implicit)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Global permissions granted directly to the user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl ManagedResource for SonarUser {
    const KIND_LABEL: &'static str = "user";

    fn sonar_ref(&self) -> &str {
        &self.spec.sonar_ref
    }

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn validate(&self) -> crate::Result<()> {
        let resource = self.name_any();
        super::require_non_empty(&resource, "spec.sonarRef", &self.spec.sonar_ref)?;
        super::require_non_empty(&resource, "spec.login", &self.spec.login)?;
        super::require_non_empty(&resource, "spec.name", &self.spec.name)?;
        super::require_non_empty_entries(&resource, "spec.groups", &self.spec.groups)?;
        super::require_non_empty_entries(&resource, "spec.permissions", &self.spec.permissions)
    }
}
