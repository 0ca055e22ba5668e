use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::{Error, Result};

use super::{search_term, Paging, SonarClient, PAGE_SIZE};
use crate::api::GroupApi;
use crate::types::Group;

#[derive(Deserialize)]
struct GroupEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl From<GroupEntry> for Group {
    fn from(g: GroupEntry) -> Self {
        Group {
            name: g.name,
            description: g.description.filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    groups: Vec<GroupEntry>,
}

#[derive(Deserialize)]
struct CreateResponse {
    group: GroupEntry,
}

#[derive(Deserialize)]
pub(super) struct PermissionEntry {
    pub(super) name: String,
    #[serde(default)]
    pub(super) permissions: Vec<String>,
}

#[derive(Deserialize)]
struct PermissionsResponse {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    groups: Vec<PermissionEntry>,
}

/// Max page size of `api/permissions/groups`
const PERMISSIONS_PAGE_SIZE: u32 = 100;

#[async_trait]
impl GroupApi for SonarClient {
    async fn get_group(&self, name: &str) -> Result<Group> {
        let page_size = PAGE_SIZE.to_string();
        let resp: SearchResponse = self
            .get_json(
                "api/user_groups/search",
                &[("q", name), ("ps", page_size.as_str())],
            )
            .await?;
        resp.groups
            .into_iter()
            .find(|g| g.name == name)
            .map(Group::from)
            .ok_or_else(|| Error::not_found("group", name))
    }

    async fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group> {
        let mut form = vec![("name", name)];
        if let Some(d) = description {
            form.push(("description", d));
        }
        let resp: CreateResponse = self.post_json("api/user_groups/create", &form).await?;
        Ok(resp.group.into())
    }

    async fn update_group(&self, name: &str, description: Option<&str>) -> Result<()> {
        self.post(
            "api/user_groups/update",
            &[
                ("currentName", name),
                ("description", description.unwrap_or_default()),
            ],
        )
        .await
        .map_err(super::not_found_as("group", name))
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        self.post("api/user_groups/delete", &[("name", name)])
            .await
            .map_err(super::not_found_as("group", name))
    }

    async fn group_permissions(&self, name: &str) -> Result<BTreeSet<String>> {
        let page_size = PERMISSIONS_PAGE_SIZE.to_string();
        let mut page = 1u32;
        loop {
            let page_index = page.to_string();
            let mut query = vec![("ps", page_size.as_str()), ("p", page_index.as_str())];
            query.extend(search_term(name));

            let resp: PermissionsResponse =
                self.get_json("api/permissions/groups", &query).await?;
            if let Some(entry) = resp.groups.into_iter().find(|g| g.name == name) {
                return Ok(entry.permissions.into_iter().collect());
            }
            // Groups without any global permission may be omitted
            if !resp.paging.has_more() {
                return Ok(BTreeSet::new());
            }
            page += 1;
        }
    }

    async fn add_group_permission(&self, group: &str, permission: &str) -> Result<()> {
        self.post(
            "api/permissions/add_group",
            &[("groupName", group), ("permission", permission)],
        )
        .await
    }

    async fn remove_group_permission(&self, group: &str, permission: &str) -> Result<()> {
        self.post(
            "api/permissions/remove_group",
            &[("groupName", group), ("permission", permission)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::client_for;
    use super::*;

    #[tokio::test]
    async fn get_group_requires_exact_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_groups/search"))
            .and(query_param("q", "dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"pageIndex": 1, "pageSize": 500, "total": 1},
                "groups": [{"name": "developers", "description": "All devs"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_group("dev").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_group_returns_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_groups/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [
                    {"name": "developers-ext", "description": ""},
                    {"name": "developers", "description": ""}
                ]
            })))
            .mount(&server)
            .await;

        let group = client_for(&server).get_group("developers").await.unwrap();
        assert_eq!(group.name, "developers");
        assert!(group.description.is_none());
    }

    #[tokio::test]
    async fn create_group_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user_groups/create"))
            .and(body_string_contains("name=developers"))
            .and(body_string_contains("description=All+devs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "group": {"name": "developers", "description": "All devs"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let group = client_for(&server)
            .create_group("developers", Some("All devs"))
            .await
            .unwrap();
        assert_eq!(group.description.as_deref(), Some("All devs"));
    }

    #[tokio::test]
    async fn delete_missing_group_is_not_found_for_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user_groups/delete"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{"msg": "No group with name 'developers'"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .delete_group("developers")
            .await
            .unwrap_err();
        match err {
            Error::NotFound { entity, key } => {
                assert_eq!(entity, "group");
                assert_eq!(key, "developers");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_permissions_pages_until_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/permissions/groups"))
            .and(query_param("p", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"pageIndex": 1, "pageSize": 100, "total": 101},
                "groups": [{"name": "developers-ext", "permissions": ["admin"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/permissions/groups"))
            .and(query_param("p", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"pageIndex": 2, "pageSize": 100, "total": 101},
                "groups": [{"name": "developers", "permissions": ["scan", "provisioning"]}]
            })))
            .mount(&server)
            .await;

        let perms = client_for(&server)
            .group_permissions("developers")
            .await
            .unwrap();
        assert_eq!(
            perms.into_iter().collect::<Vec<_>>(),
            vec!["provisioning", "scan"]
        );
    }
}
