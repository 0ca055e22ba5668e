//! Shared types used across operator CRDs

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a key inside a Kubernetes Secret in the same namespace
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret
    pub name: String,

    /// Key within the Secret data
    #[serde(default = "default_token_key")]
    pub key: String,
}

fn default_token_key() -> String {
    "token".to_string()
}

/// Phase of a managed SonarQube entity
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ResourcePhase {
    /// Not yet reconciled
    #[default]
    Pending,
    /// Remote entity matches the desired spec
    Created,
    /// Last pass failed; see `message`
    Error,
}

impl std::fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Created => write!(f, "Created"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Observed status shared by every managed kind
///
/// Written at most once per pass, and only when it differs from the stored
/// value. Holds no timestamps so that an unchanged outcome compares equal.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Outcome of the last pass
    #[serde(default)]
    pub phase: ResourcePhase,

    /// Human-readable error from the last failed pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Consecutive failed passes (exponential backoff only)
    #[serde(default)]
    pub failure_count: u32,

    /// Identifier assigned by SonarQube (template id, profile key, gate id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    /// Fingerprint over the desired keys processed by the last successful pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_keys_hash: Option<String>,

    /// Generation of the spec the last successful pass converged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ResourceStatus {
    /// Whether the last pass converged
    pub fn is_created(&self) -> bool {
        self.phase == ResourcePhase::Created
    }
}

/// Collect a list of strings into an ordered, de-duplicated set
pub fn to_set(items: &[String]) -> BTreeSet<String> {
    items.iter().cloned().collect()
}
