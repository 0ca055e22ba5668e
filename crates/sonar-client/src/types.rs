//! Remote entity types as the operator sees them
//!
//! These are the shapes returned by the capability traits, independent of the
//! JSON layout of any particular SonarQube version.

use std::collections::BTreeMap;

use sonar_common::crd::{GateOperator, ProjectVisibility};

/// Result of `api/system/status`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemStatus {
    /// Server version
    pub version: String,
    /// UP, STARTING, DOWN, DB_MIGRATION_NEEDED, ...
    pub status: String,
}

impl SystemStatus {
    /// Whether the server accepts API calls
    pub fn is_up(&self) -> bool {
        self.status == "UP"
    }
}

/// A user group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    /// Group name
    pub name: String,
    /// Group description
    pub description: Option<String>,
}

/// A user account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Login
    pub login: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: Option<String>,
}

/// A permission template
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionTemplate {
    /// Server-assigned id
    pub id: String,
    /// Template name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Project key pattern
    pub project_key_pattern: Option<String>,
}

/// Writable fields of a permission template
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateParams {
    /// Template name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Project key pattern
    pub project_key_pattern: Option<String>,
}

/// A quality gate with its conditions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityGate {
    /// Server-assigned id, or the name on servers that identify gates by name
    pub id: String,
    /// Gate name
    pub name: String,
    /// Whether this is the default gate
    pub is_default: bool,
    /// Conditions as stored on the server
    pub conditions: Vec<GateCondition>,
}

/// One stored quality gate condition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateCondition {
    /// Server-assigned condition id
    pub id: String,
    /// Metric key
    pub metric: String,
    /// Comparison operator
    pub op: GateOperator,
    /// Error threshold
    pub error: String,
}

/// Writable fields of a quality gate condition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionParams {
    /// Metric key
    pub metric: String,
    /// Comparison operator
    pub op: GateOperator,
    /// Error threshold
    pub error: String,
}

/// A quality profile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityProfile {
    /// Server-assigned profile key
    pub key: String,
    /// Profile name
    pub name: String,
    /// Language key
    pub language: String,
    /// Whether this is the default profile for its language
    pub is_default: bool,
}

/// Activation of one rule in a quality profile
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleActivation {
    /// Severity; `None` keeps the rule's default
    pub severity: Option<String>,
    /// Rule parameters
    pub params: BTreeMap<String, String>,
}

/// A project
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    /// Project key
    pub key: String,
    /// Display name
    pub name: String,
    /// Visibility
    pub visibility: ProjectVisibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_up_status_is_usable() {
        let mut status = SystemStatus {
            version: "10.4.1".to_string(),
            status: "UP".to_string(),
        };
        assert!(status.is_up());
        status.status = "DB_MIGRATION_NEEDED".to_string();
        assert!(!status.is_up());
    }
}
