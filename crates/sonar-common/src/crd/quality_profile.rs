//! SonarQualityProfile Custom Resource Definition
//!
//! The profile's rule activations are reconciled as a keyed collection. The
//! fingerprint of the processed rule keys is stored in
//! `status.processedKeysHash`.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ResourceStatus;
use super::ManagedResource;

/// Activation settings for one rule
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// Severity override (INFO, MINOR, MAJOR, CRITICAL, BLOCKER)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Rule parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Specification for a SonarQube quality profile
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sonar.dev",
    version = "v1alpha1",
    kind = "SonarQualityProfile",
    plural = "sonarqualityprofiles",
    shortname = "sqp",
    namespaced,
    status = "ResourceStatus",
    printcolumn = r#"{"name":"Profile","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Language","type":"string","jsonPath":".spec.language"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SonarQualityProfileSpec {
    /// SonarQube connection in the same namespace
    pub sonar_ref: String,

    /// Profile name
    pub name: String,

    /// Language key (java, js, py, ...)
    pub language: String,

    /// Make this the default profile for its language
    #[serde(default)]
    pub default: bool,

    /// Active rules keyed by rule key (e.g. `java:S1068`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, RuleSpec>,
}

impl ManagedResource for SonarQualityProfile {
    const KIND_LABEL: &'static str = "quality_profile";

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
        super::require_non_empty(&resource, "spec.language", &self.spec.language)?;
        for key in self.spec.rules.keys() {
            if !key.contains(':') {
                return Err(crate::Error::validation_for_field(
                    &resource,
                    "spec.rules",
                    format!("rule key must be <repository>:<rule>: {}", key),
                ));
            }
        }
        Ok(())
    }
}
