//! In-memory SonarQube for controller tests
//!
//! Holds just enough server state to exercise the step chains: absent
//! entities return the not-found sentinel, and every mutating call is
//! appended to a call log so tests can assert exactly which remote writes a
//! pass issued.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sonar_client::{
    ConditionParams, GateCondition, Group, GroupApi, PermissionTemplate, PermissionTemplateApi,
    Project, ProjectApi, QualityGate, QualityGateApi, QualityProfile, QualityProfileApi,
    RuleActivation, SonarHandle, SystemApi, SystemStatus, TemplateParams, User, UserApi,
};
use sonar_common::crd::ProjectVisibility;
use sonar_common::{Error, Result, DEFAULT_USERS_GROUP};

#[derive(Default)]
pub struct FakeState {
    pub status: Option<SystemStatus>,
    pub groups: BTreeMap<String, Group>,
    pub group_permissions: BTreeMap<String, BTreeSet<String>>,
    pub users: BTreeMap<String, User>,
    pub user_groups: BTreeMap<String, BTreeSet<String>>,
    pub user_permissions: BTreeMap<String, BTreeSet<String>>,
    pub templates: BTreeMap<String, PermissionTemplate>,
    pub template_permissions: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    pub default_template: Option<String>,
    pub gates: BTreeMap<String, QualityGate>,
    pub profiles: BTreeMap<(String, String), QualityProfile>,
    pub rules: BTreeMap<String, BTreeMap<String, RuleActivation>>,
    pub projects: BTreeMap<String, Project>,
    pub project_gates: BTreeMap<String, String>,
    pub fail_on: Option<String>,
    calls: Vec<String>,
    next_id: u32,
}

impl FakeState {
    fn record(&mut self, call: String) -> Result<()> {
        if let Some(fail) = &self.fail_on {
            if call.starts_with(fail.as_str()) {
                return Err(Error::remote_status(call, 500, "injected failure"));
            }
        }
        self.calls.push(call);
        Ok(())
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

#[derive(Default)]
pub struct FakeSonar {
    state: Mutex<FakeState>,
}

impl FakeSonar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: &Arc<Self>) -> SonarHandle {
        self.clone()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Mutating calls issued so far
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl SystemApi for FakeSonar {
    async fn system_status(&self) -> Result<SystemStatus> {
        self.state()
            .status
            .clone()
            .ok_or_else(|| Error::remote("api/system/status", "connection refused"))
    }
}

#[async_trait]
impl GroupApi for FakeSonar {
    async fn get_group(&self, name: &str) -> Result<Group> {
        self.state()
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("group", name))
    }

    async fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group> {
        let mut state = self.state();
        state.record(format!("create_group {name}"))?;
        let group = Group {
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        state.groups.insert(name.to_string(), group.clone());
        Ok(group)
    }

    async fn update_group(&self, name: &str, description: Option<&str>) -> Result<()> {
        let mut state = self.state();
        state.record(format!("update_group {name}"))?;
        let group = state
            .groups
            .get_mut(name)
            .ok_or_else(|| Error::not_found("group", name))?;
        group.description = description.map(str::to_string);
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.groups.remove(name).is_none() {
            return Err(Error::not_found("group", name));
        }
        state.group_permissions.remove(name);
        state.record(format!("delete_group {name}"))
    }

    async fn group_permissions(&self, name: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .state()
            .group_permissions
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_group_permission(&self, group: &str, permission: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("add_group_permission {group} {permission}"))?;
        state
            .group_permissions
            .entry(group.to_string())
            .or_default()
            .insert(permission.to_string());
        Ok(())
    }

    async fn remove_group_permission(&self, group: &str, permission: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("remove_group_permission {group} {permission}"))?;
        if let Some(perms) = state.group_permissions.get_mut(group) {
            perms.remove(permission);
        }
        Ok(())
    }
}

#[async_trait]
impl UserApi for FakeSonar {
    async fn get_user(&self, login: &str) -> Result<User> {
        self.state()
            .users
            .get(login)
            .cloned()
            .ok_or_else(|| Error::not_found("user", login))
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut state = self.state();
        state.record(format!("create_user {}", user.login))?;
        state.users.insert(user.login.clone(), user.clone());
        // SonarQube puts every new account in the default group
        state
            .user_groups
            .entry(user.login.clone())
            .or_default()
            .insert(DEFAULT_USERS_GROUP.to_string());
        Ok(user.clone())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut state = self.state();
        state.record(format!("update_user {}", user.login))?;
        let stored = state
            .users
            .get_mut(&user.login)
            .ok_or_else(|| Error::not_found("user", &user.login))?;
        stored.name = user.name.clone();
        // An absent email is not sent, so the stored one survives
        if user.email.is_some() {
            stored.email = user.email.clone();
        }
        Ok(())
    }

    async fn deactivate_user(&self, login: &str) -> Result<()> {
        let mut state = self.state();
        if state.users.remove(login).is_none() {
            return Err(Error::not_found("user", login));
        }
        state.user_groups.remove(login);
        state.user_permissions.remove(login);
        state.record(format!("deactivate_user {login}"))
    }

    async fn user_groups(&self, login: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .state()
            .user_groups
            .get(login)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_user_to_group(&self, login: &str, group: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("add_user_to_group {login} {group}"))?;
        state
            .user_groups
            .entry(login.to_string())
            .or_default()
            .insert(group.to_string());
        Ok(())
    }

    async fn remove_user_from_group(&self, login: &str, group: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("remove_user_from_group {login} {group}"))?;
        if let Some(groups) = state.user_groups.get_mut(login) {
            groups.remove(group);
        }
        Ok(())
    }

    async fn user_permissions(&self, login: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .state()
            .user_permissions
            .get(login)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_user_permission(&self, login: &str, permission: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("add_user_permission {login} {permission}"))?;
        state
            .user_permissions
            .entry(login.to_string())
            .or_default()
            .insert(permission.to_string());
        Ok(())
    }

    async fn remove_user_permission(&self, login: &str, permission: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("remove_user_permission {login} {permission}"))?;
        if let Some(perms) = state.user_permissions.get_mut(login) {
            perms.remove(permission);
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionTemplateApi for FakeSonar {
    async fn get_template(&self, name: &str) -> Result<PermissionTemplate> {
        self.state()
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("permission template", name))
    }

    async fn create_template(&self, params: &TemplateParams) -> Result<PermissionTemplate> {
        let mut state = self.state();
        state.record(format!("create_template {}", params.name))?;
        let template = PermissionTemplate {
            id: format!("tpl-{}", state.id()),
            name: params.name.clone(),
            description: params.description.clone(),
            project_key_pattern: params.project_key_pattern.clone(),
        };
        state.templates.insert(params.name.clone(), template.clone());
        Ok(template)
    }

    async fn update_template(&self, id: &str, params: &TemplateParams) -> Result<()> {
        let mut state = self.state();
        state.record(format!("update_template {id}"))?;
        let template = state
            .templates
            .values_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::not_found("permission template", id))?;
        if params.description.is_some() {
            template.description = params.description.clone();
        }
        if params.project_key_pattern.is_some() {
            template.project_key_pattern = params.project_key_pattern.clone();
        }
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.templates.remove(name).is_none() {
            return Err(Error::not_found("permission template", name));
        }
        state.template_permissions.remove(name);
        state.record(format!("delete_template {name}"))
    }

    async fn set_default_template(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("set_default_template {name}"))?;
        state.default_template = Some(name.to_string());
        Ok(())
    }

    async fn template_group_permissions(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>> {
        Ok(self
            .state()
            .template_permissions
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_group_to_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(format!("add_group_to_template {template} {group} {permission}"))?;
        state
            .template_permissions
            .entry(template.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .insert(permission.to_string());
        Ok(())
    }

    async fn remove_group_from_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(format!(
            "remove_group_from_template {template} {group} {permission}"
        ))?;
        if let Some(groups) = state.template_permissions.get_mut(template) {
            if let Some(perms) = groups.get_mut(group) {
                perms.remove(permission);
                if perms.is_empty() {
                    groups.remove(group);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QualityGateApi for FakeSonar {
    async fn get_gate(&self, name: &str) -> Result<QualityGate> {
        self.state()
            .gates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("quality gate", name))
    }

    async fn create_gate(&self, name: &str) -> Result<QualityGate> {
        let mut state = self.state();
        state.record(format!("create_gate {name}"))?;
        let gate = QualityGate {
            id: state.id(),
            name: name.to_string(),
            is_default: false,
            conditions: vec![],
        };
        state.gates.insert(name.to_string(), gate.clone());
        Ok(gate)
    }

    async fn delete_gate(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.gates.remove(name).is_none() {
            return Err(Error::not_found("quality gate", name));
        }
        state.record(format!("delete_gate {name}"))
    }

    async fn set_default_gate(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("set_default_gate {name}"))?;
        for gate in state.gates.values_mut() {
            gate.is_default = gate.name == name;
        }
        Ok(())
    }

    async fn create_condition(&self, gate: &str, condition: &ConditionParams) -> Result<()> {
        let mut state = self.state();
        state.record(format!(
            "create_condition {gate} {} {} {}",
            condition.metric, condition.op, condition.error
        ))?;
        let id = state.id();
        let gate = state
            .gates
            .get_mut(gate)
            .ok_or_else(|| Error::not_found("quality gate", gate))?;
        gate.conditions.push(GateCondition {
            id,
            metric: condition.metric.clone(),
            op: condition.op,
            error: condition.error.clone(),
        });
        Ok(())
    }

    async fn update_condition(&self, id: &str, condition: &ConditionParams) -> Result<()> {
        let mut state = self.state();
        state.record(format!(
            "update_condition {id} {} {} {}",
            condition.metric, condition.op, condition.error
        ))?;
        let stored = state
            .gates
            .values_mut()
            .flat_map(|g| g.conditions.iter_mut())
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("condition", id))?;
        stored.op = condition.op;
        stored.error = condition.error.clone();
        Ok(())
    }

    async fn delete_condition(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("delete_condition {id}"))?;
        for gate in state.gates.values_mut() {
            gate.conditions.retain(|c| c.id != id);
        }
        Ok(())
    }

    async fn project_gate(&self, project: &str) -> Result<String> {
        self.state()
            .project_gates
            .get(project)
            .cloned()
            .ok_or_else(|| Error::not_found("project", project))
    }

    async fn select_gate(&self, gate: &str, project: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("select_gate {gate} {project}"))?;
        state
            .project_gates
            .insert(project.to_string(), gate.to_string());
        Ok(())
    }
}

#[async_trait]
impl QualityProfileApi for FakeSonar {
    async fn get_profile(&self, language: &str, name: &str) -> Result<QualityProfile> {
        self.state()
            .profiles
            .get(&(language.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("quality profile", format!("{language}/{name}")))
    }

    async fn create_profile(&self, language: &str, name: &str) -> Result<QualityProfile> {
        let mut state = self.state();
        state.record(format!("create_profile {language} {name}"))?;
        let profile = QualityProfile {
            key: format!("{language}-{}", state.id()),
            name: name.to_string(),
            language: language.to_string(),
            is_default: false,
        };
        state
            .profiles
            .insert((language.to_string(), name.to_string()), profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, language: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        let Some(profile) = state
            .profiles
            .remove(&(language.to_string(), name.to_string()))
        else {
            return Err(Error::not_found("quality profile", format!("{language}/{name}")));
        };
        state.rules.remove(&profile.key);
        state.record(format!("delete_profile {language} {name}"))
    }

    async fn set_default_profile(&self, language: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("set_default_profile {language} {name}"))?;
        for profile in state.profiles.values_mut() {
            if profile.language == language {
                profile.is_default = profile.name == name;
            }
        }
        Ok(())
    }

    async fn active_rules(&self, profile_key: &str) -> Result<BTreeMap<String, RuleActivation>> {
        Ok(self
            .state()
            .rules
            .get(profile_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn activate_rule(
        &self,
        profile_key: &str,
        rule: &str,
        activation: &RuleActivation,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(format!("activate_rule {profile_key} {rule}"))?;
        state
            .rules
            .entry(profile_key.to_string())
            .or_default()
            .insert(rule.to_string(), activation.clone());
        Ok(())
    }

    async fn deactivate_rule(&self, profile_key: &str, rule: &str) -> Result<()> {
        let mut state = self.state();
        state.record(format!("deactivate_rule {profile_key} {rule}"))?;
        if let Some(rules) = state.rules.get_mut(profile_key) {
            rules.remove(rule);
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectApi for FakeSonar {
    async fn get_project(&self, key: &str) -> Result<Project> {
        self.state()
            .projects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found("project", key))
    }

    async fn create_project(
        &self,
        key: &str,
        name: &str,
        visibility: ProjectVisibility,
    ) -> Result<Project> {
        let mut state = self.state();
        state.record(format!("create_project {key} {visibility}"))?;
        let project = Project {
            key: key.to_string(),
            name: name.to_string(),
            visibility,
        };
        state.projects.insert(key.to_string(), project.clone());
        Ok(project)
    }

    async fn update_visibility(&self, key: &str, visibility: ProjectVisibility) -> Result<()> {
        let mut state = self.state();
        state.record(format!("update_visibility {key} {visibility}"))?;
        let project = state
            .projects
            .get_mut(key)
            .ok_or_else(|| Error::not_found("project", key))?;
        project.visibility = visibility;
        Ok(())
    }

    async fn delete_project(&self, key: &str) -> Result<()> {
        let mut state = self.state();
        if state.projects.remove(key).is_none() {
            return Err(Error::not_found("project", key));
        }
        state.project_gates.remove(key);
        state.record(format!("delete_project {key}"))
    }
}
