//! Custom Resource Definitions for the SonarQube operator
//!
//! Every managed kind names a `SonarQube` connection object in the same
//! namespace through `spec.sonarRef` and reports its outcome through the
//! shared [`ResourceStatus`].

mod group;
mod permission_template;
mod project;
mod quality_gate;
mod quality_profile;
mod sonarqube;
mod types;
mod user;

pub use group::{SonarGroup, SonarGroupSpec};
pub use permission_template::{SonarPermissionTemplate, SonarPermissionTemplateSpec};
pub use project::{ProjectVisibility, SonarProject, SonarProjectSpec};
pub use quality_gate::{
    ConditionSpec, GateOperator, SonarQualityGate, SonarQualityGateSpec,
};
pub use quality_profile::{RuleSpec, SonarQualityProfile, SonarQualityProfileSpec};
pub use sonarqube::{SonarQube, SonarQubePhase, SonarQubeSpec, SonarQubeStatus};
pub use types::{to_set, ResourcePhase, ResourceStatus, SecretKeyRef};
pub use user::{SonarUser, SonarUserSpec};

use crate::Result;

/// A namespaced custom resource that owns an entity in SonarQube
///
/// Implemented by every managed kind so the reconcile loop can read the
/// connection reference and the stored status without knowing the kind.
pub trait ManagedResource: kube::Resource<DynamicType = ()> {
    /// Short label for logs, metrics and events (e.g. "group")
    const KIND_LABEL: &'static str;

    /// Name of the `SonarQube` connection object in the same namespace
    fn sonar_ref(&self) -> &str;

    /// Status stored on the object, if any was written
    fn resource_status(&self) -> Option<&ResourceStatus>;

    /// Check the spec for values SonarQube would reject
    fn validate(&self) -> Result<()>;
}

/// Reject an empty or whitespace-only required field
pub(crate) fn require_non_empty(resource: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::validation_for_field(
            resource,
            field,
            format!("{} cannot be empty", field),
        ));
    }
    Ok(())
}

/// Reject any empty entry in a list of names
pub(crate) fn require_non_empty_entries(
    resource: &str,
    field: &str,
    values: &[String],
) -> Result<()> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(crate::Error::validation_for_field(
            resource,
            field,
            format!("{} cannot contain empty entries", field),
        ));
    }
    Ok(())
}
