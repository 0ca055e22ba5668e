use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::{Error, Result};

use super::groups::PermissionEntry;
use super::{not_found_as, Paging, SonarClient};
use crate::api::PermissionTemplateApi;
use crate::types::{PermissionTemplate, TemplateParams};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateEntry {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    project_key_pattern: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    permission_templates: Vec<TemplateEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    permission_template: TemplateEntry,
}

#[derive(Deserialize)]
struct TemplateGroupsResponse {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    groups: Vec<PermissionEntry>,
}

const TEMPLATE_GROUPS_PAGE_SIZE: u32 = 100;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn template_form(params: &TemplateParams) -> Vec<(&'static str, &str)> {
    let mut form = vec![("name", params.name.as_str())];
    if let Some(d) = &params.description {
        form.push(("description", d.as_str()));
    }
    if let Some(p) = &params.project_key_pattern {
        form.push(("projectKeyPattern", p.as_str()));
    }
    form
}

#[async_trait]
impl PermissionTemplateApi for SonarClient {
    async fn get_template(&self, name: &str) -> Result<PermissionTemplate> {
        let resp: SearchResponse = self
            .get_json("api/permissions/search_templates", &[("q", name)])
            .await?;
        let entry = resp
            .permission_templates
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::not_found("permission template", name))?;
        let id = entry.id.ok_or_else(|| {
            Error::remote(
                "api/permissions/search_templates",
                format!("template '{}' has no id", name),
            )
        })?;
        Ok(PermissionTemplate {
            id,
            name: entry.name,
            description: non_empty(entry.description),
            project_key_pattern: non_empty(entry.project_key_pattern),
        })
    }

    async fn create_template(&self, params: &TemplateParams) -> Result<PermissionTemplate> {
        let resp: CreateResponse = self
            .post_json("api/permissions/create_template", &template_form(params))
            .await?;
        match resp.permission_template.id {
            Some(id) => Ok(PermissionTemplate {
                id,
                name: resp.permission_template.name,
                description: non_empty(resp.permission_template.description),
                project_key_pattern: non_empty(resp.permission_template.project_key_pattern),
            }),
            // Older servers omit the id from the create answer
            None => self.get_template(&params.name).await,
        }
    }

    async fn update_template(&self, id: &str, params: &TemplateParams) -> Result<()> {
        let mut form = template_form(params);
        form.push(("id", id));
        self.post("api/permissions/update_template", &form)
            .await
            .map_err(not_found_as("permission template", &params.name))
    }

    async fn delete_template(&self, name: &str) -> Result<()> {
        self.post("api/permissions/delete_template", &[("templateName", name)])
            .await
            .map_err(not_found_as("permission template", name))
    }

    async fn set_default_template(&self, name: &str) -> Result<()> {
        self.post(
            "api/permissions/set_default_template",
            &[("templateName", name)],
        )
        .await
        .map_err(not_found_as("permission template", name))
    }

    async fn template_group_permissions(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let page_size = TEMPLATE_GROUPS_PAGE_SIZE.to_string();
        let mut grouped = BTreeMap::new();
        let mut page = 1u32;
        loop {
            let page_index = page.to_string();
            let resp: TemplateGroupsResponse = self
                .get_json(
                    "api/permissions/template_groups",
                    &[
                        ("templateName", name),
                        ("ps", page_size.as_str()),
                        ("p", page_index.as_str()),
                    ],
                )
                .await
                .map_err(not_found_as("permission template", name))?;
            for entry in resp.groups {
                if !entry.permissions.is_empty() {
                    grouped.insert(entry.name, entry.permissions.into_iter().collect());
                }
            }
            if !resp.paging.has_more() {
                return Ok(grouped);
            }
            page += 1;
        }
    }

    async fn add_group_to_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()> {
        self.post(
            "api/permissions/add_group_to_template",
            &[
                ("templateName", template),
                ("groupName", group),
                ("permission", permission),
            ],
        )
        .await
    }

    async fn remove_group_from_template(
        &self,
        template: &str,
        group: &str,
        permission: &str,
    ) -> Result<()> {
        self.post(
            "api/permissions/remove_group_from_template",
            &[
                ("templateName", template),
                ("groupName", group),
                ("permission", permission),
            ],
        )
        .await
    }
}
