//! Capability traits of the SonarQube Web API
//!
//! Each trait covers one entity family. Every `get_*` returns
//! [`Error::NotFound`](sonar_common::Error::NotFound) when the entity does not
//! exist, so callers can branch between create and update. Collection reads
//! return ordered keyed sets and maps, freshly fetched on every call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use sonar_common::crd::ProjectVisibility;
use sonar_common::Result;

use crate::types::{
    ConditionParams, Group, PermissionTemplate, Project, QualityGate, QualityProfile,
    RuleActivation, SystemStatus, TemplateParams, User,
};

/// Server health
#[async_trait]
pub trait SystemApi: Send + Sync {
    /// Read `api/system/status`
    async fn system_status(&self) -> Result<SystemStatus>;
}

/// User groups and their global permissions
#[async_trait]
pub trait GroupApi: Send + Sync {
    /// Look up a group by exact name
    async fn get_group(&self, name: &str) -> Result<Group>;

    /// Create a group
    async fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group>;

    /// Update a group's description
    async fn update_group(&self, name: &str, description: Option<&str>) -> Result<()>;

    /// Delete a group
    async fn delete_group(&self, name: &str) -> Result<()>;

    /// Global permissions granted to a group
    async fn group_permissions(&self, name: &str) -> Result<BTreeSet<String>>;

    /// Grant a global permission to a group
    async fn add_group_permission(&self, group: &str, permission: &str) -> Result<()>;

    /// Revoke a global permission from a group
    async fn remove_group_permission(&self, group: &str, permission: &str) -> Result<()>;
}

/// User accounts, their group memberships and global permissions
#[async_trait]
pub trait UserApi: Send + Sync {
    /// Look up an active user by exact login
    async fn get_user(&self, login: &str) -> Result<User>;

    /// Create a non-local user (reactivates a deactivated login)
    async fn create_user(&self, user: &User) -> Result<User>;

    /// Update display name and email
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Deactivate a user
    async fn deactivate_user(&self, login: &str) -> Result<()>;

    /// Names of the groups a user belongs to
    async fn user_groups(&self, login: &str) -> Result<BTreeSet<String>>;

    /// Add a user to a group
    async fn add_user_to_group(&self, login: &str, group: &str) -> Result<()>;

    /// Remove a user from a group
    async fn remove_user_from_group(&self, login: &str, group: &str) -> Result<()>;

    /// Global permissions granted directly to a user
    async fn user_permissions(&self, login: &str) -> Result<BTreeSet<String>>;

    /// Grant a global permission to a user
    async fn add_user_permission(&self, login: &str, permission: &str) -> Result<()>;

    /// Revoke a global permission from a user
    async fn remove_user_permission(&self, login: &str, permission: &str) -> Result<()>;
}

/// Permission templates and their per-group permissions
#[async_trait]
pub trait PermissionTemplateApi: Send + Sync {
    /// Look up a template by exact name
    async fn get_template(&self, name: &str) -> Result<PermissionTemplate>;

    /// Create a template
    async fn create_template(&self, params: &TemplateParams) -> Result<PermissionTemplate>;

    /// Update a template identified by id
    async fn update_template(&self, id: &str, params: &TemplateParams) -> Result<()>;

    /// Delete a template by name
    async fn delete_template(&self, name: &str) -> Result<()>;

    /// Make a template the default for new projects
    async fn set_default_template(&self, name: &str) -> Result<()>;

    /// Permissions granted per group by a template
    async fn template_group_permissions(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>>;

    /// Grant a permission to a group in a template
    async fn add_group_to_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()>;

    /// Revoke a permission from a group in a template
    async fn remove_group_from_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()>;
}

/// Quality gates, their conditions and project association
#[async_trait]
pub trait QualityGateApi: Send + Sync {
    /// Look up a gate, with conditions, by exact name
    async fn get_gate(&self, name: &str) -> Result<QualityGate>;

    /// Create an empty gate
    async fn create_gate(&self, name: &str) -> Result<QualityGate>;

    /// Delete a gate
    async fn delete_gate(&self, name: &str) -> Result<()>;

    /// Make a gate the default
    async fn set_default_gate(&self, name: &str) -> Result<()>;

    /// Add a condition to a gate
    async fn create_condition(&self, gate: &str, condition: &ConditionParams) -> Result<()>;

    /// Update a stored condition by id
    async fn update_condition(&self, id: &str, condition: &ConditionParams) -> Result<()>;

    /// Delete a stored condition by id
    async fn delete_condition(&self, id: &str) -> Result<()>;

    /// Name of the gate associated with a project
    async fn project_gate(&self, project: &str) -> Result<String>;

    /// Associate a gate with a project
    async fn select_gate(&self, gate: &str, project: &str) -> Result<()>;
}

/// Quality profiles and their rule activations
#[async_trait]
pub trait QualityProfileApi: Send + Sync {
    /// Look up a profile by language and exact name
    async fn get_profile(&self, language: &str, name: &str) -> Result<QualityProfile>;

    /// Create an empty profile
    async fn create_profile(&self, language: &str, name: &str) -> Result<QualityProfile>;

    /// Delete a profile
    async fn delete_profile(&self, language: &str, name: &str) -> Result<()>;

    /// Make a profile the default for its language
    async fn set_default_profile(&self, language: &str, name: &str) -> Result<()>;

    /// Rules active in a profile, keyed by rule key
    async fn active_rules(&self, profile_key: &str) -> Result<BTreeMap<String, RuleActivation>>;

    /// Activate a rule, or change an existing activation
    async fn activate_rule(
        &self,
        profile_key: &str,
        rule: &str,
        activation: &RuleActivation,
    ) -> Result<()>;

    /// Deactivate a rule
    async fn deactivate_rule(&self, profile_key: &str, rule: &str) -> Result<()>;
}

/// Projects
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// Look up a project by key
    async fn get_project(&self, key: &str) -> Result<Project>;

    /// Create a project
    async fn create_project(
        &self,
        key: &str,
        name: &str,
        visibility: ProjectVisibility,
    ) -> Result<Project>;

    /// Change a project's visibility
    async fn update_visibility(&self, key: &str, visibility: ProjectVisibility) -> Result<()>;

    /// Delete a project
    async fn delete_project(&self, key: &str) -> Result<()>;
}

/// Every capability of a SonarQube server
pub trait SonarApi:
    SystemApi
    + GroupApi
    + UserApi
    + PermissionTemplateApi
    + QualityGateApi
    + QualityProfileApi
    + ProjectApi
{
}

impl<T> SonarApi for T where
    T: SystemApi
        + GroupApi
        + UserApi
        + PermissionTemplateApi
        + QualityGateApi
        + QualityProfileApi
        + ProjectApi
{
}

/// Shared handle to a resolved SonarQube connection
pub type SonarHandle = Arc<dyn SonarApi>;
