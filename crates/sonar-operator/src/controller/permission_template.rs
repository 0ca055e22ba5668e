//! SonarPermissionTemplate: the template, its per-group permissions, then the
//! default marker
//!
//! The template id assigned by SonarQube is recorded as `remoteId`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{PermissionTemplateApi, SonarApi, SonarHandle, TemplateParams};
use sonar_common::crd::{to_set, SonarPermissionTemplate};
use sonar_common::Result;
use sonar_engine::{reconcile_grouped, tolerate_not_found, GroupedMemberOps, Observed, Step};

use super::{drifted, found, Chain};

/// Ensure template, sync group permissions, then apply the default flag
pub fn create_chain() -> Chain<SonarPermissionTemplate> {
    Chain::new()
        .then(EnsureTemplate)
        .then(SyncTemplatePermissions)
        .then(SetDefaultTemplate)
}

/// Delete the template
pub fn delete_chain() -> Chain<SonarPermissionTemplate> {
    Chain::new().then(DeleteTemplate)
}

fn template_params(template: &SonarPermissionTemplate) -> TemplateParams {
    TemplateParams {
        name: template.spec.name.clone(),
        description: template.spec.description.clone(),
        project_key_pattern: template.spec.project_key_pattern.clone(),
    }
}

struct EnsureTemplate;

#[async_trait]
impl Step<SonarPermissionTemplate, SonarHandle> for EnsureTemplate {
    fn name(&self) -> &'static str {
        "ensure_template"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        template: &SonarPermissionTemplate,
        observed: &mut Observed,
    ) -> Result<()> {
        let params = template_params(template);
        let id = match found(client.get_template(&params.name).await)? {
            None => {
                let created = client.create_template(&params).await?;
                info!(template = %params.name, id = %created.id, "Created permission template");
                created.id
            }
            Some(existing)
                if drifted(params.description.as_deref(), existing.description.as_deref())
                    || drifted(
                        params.project_key_pattern.as_deref(),
                        existing.project_key_pattern.as_deref(),
                    ) =>
            {
                client.update_template(&existing.id, &params).await?;
                info!(template = %params.name, "Updated permission template");
                existing.id
            }
            Some(existing) => {
                debug!(template = %params.name, "Permission template up to date");
                existing.id
            }
        };
        observed.remote_id = Some(id);
        Ok(())
    }
}

struct TemplateGroups<'a> {
    api: &'a dyn SonarApi,
    template: &'a str,
}

#[async_trait]
impl<'a> GroupedMemberOps for TemplateGroups<'a> {
    async fn add(&self, group: &str, permission: &str) -> Result<()> {
        self.api
            .add_group_to_template(self.template, group, permission)
            .await
    }

    async fn remove(&self, group: &str, permission: &str) -> Result<()> {
        self.api
            .remove_group_from_template(self.template, group, permission)
            .await
    }
}

struct SyncTemplatePermissions;

#[async_trait]
impl Step<SonarPermissionTemplate, SonarHandle> for SyncTemplatePermissions {
    fn name(&self) -> &'static str {
        "sync_template_permissions"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        template: &SonarPermissionTemplate,
        _: &mut Observed,
    ) -> Result<()> {
        let name = &template.spec.name;
        let desired: BTreeMap<String, BTreeSet<String>> = template
            .spec
            .group_permissions
            .iter()
            .map(|(group, permissions)| (group.clone(), to_set(permissions)))
            .filter(|(_, permissions)| !permissions.is_empty())
            .collect();
        let actual = client.template_group_permissions(name).await?;
        let ops = TemplateGroups {
            api: &**client,
            template: name,
        };
        let summary = reconcile_grouped(&desired, &actual, &BTreeSet::new(), &ops).await?;
        if !summary.is_noop() {
            info!(
                template = %name,
                groups_added = summary.created,
                groups_updated = summary.updated,
                groups_removed = summary.deleted,
                "Synced template permissions"
            );
        }
        Ok(())
    }
}

struct SetDefaultTemplate;

#[async_trait]
impl Step<SonarPermissionTemplate, SonarHandle> for SetDefaultTemplate {
    fn name(&self) -> &'static str {
        "set_default_template"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        template: &SonarPermissionTemplate,
        _: &mut Observed,
    ) -> Result<()> {
        if !template.spec.default {
            return Ok(());
        }
        // SonarQube exposes no cheap read of the default template; setting
        // it again is harmless.
        client.set_default_template(&template.spec.name).await
    }
}

struct DeleteTemplate;

#[async_trait]
impl Step<SonarPermissionTemplate, SonarHandle> for DeleteTemplate {
    fn name(&self) -> &'static str {
        "delete_template"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        template: &SonarPermissionTemplate,
        _: &mut Observed,
    ) -> Result<()> {
        tolerate_not_found(client.delete_template(&template.spec.name).await)
    }
}
