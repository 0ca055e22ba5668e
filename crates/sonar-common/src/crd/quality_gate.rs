//! SonarQualityGate Custom Resource Definition

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Comparison operator of a quality gate condition
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum GateOperator {
    /// Fails when the metric is greater than the threshold
    #[default]
    #[serde(rename = "GT")]
    Gt,
    /// Fails when the metric is less than the threshold
    #[serde(rename = "LT")]
    Lt,
}

impl GateOperator {
    /// Wire value expected by SonarQube
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "GT",
            Self::Lt => "LT",
        }
    }
}

impl std::fmt::Display for GateOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateOperator {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "GT" => Ok(Self::Gt),
            "LT" => Ok(Self::Lt),
            other => Err(crate::Error::validation(format!(
                "unknown quality gate operator: {}",
                other
            ))),
        }
    }
}

/// Threshold on one metric
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSpec {
    /// Comparison operator
    #[serde(default)]
    pub op: GateOperator,

    /// Error threshold, as SonarQube stores it (a string)
    pub error: String,
}

/// Specification for a SonarQube quality gate
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarQualityGate",
    plural = "sonarqualitygates",
    shortname = "sqg",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Gate","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Default","type":"boolean","jsonPath":".spec.default"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarQualityGateSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Gate name
    pub name: String,

    /// Make this the default gate
    #[serde(default)]
    pub default: bool,

    /// Conditions keyed by metric key (e.g. `new_coverage`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ConditionSpec>,
}

impl ManagedResource for SonarQualityGate {
    const KIND_LABEL: &'static str = "quality_gate";

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
        for (metric, condition) in &self.spec.conditions {
            super::require_non_empty(&resource, "spec.conditions", metric)?;
            super::require_non_empty(
                &resource,
                &format!("spec.conditions.{}.error", metric),
                &condition.error,
            )?;
        }
        Ok(())
    }
}
