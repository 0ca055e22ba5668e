use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::{Error, Result};

use super::{not_found_as, search_term, Paging, SonarClient, PAGE_SIZE};
use crate::api::UserApi;
use crate::types::User;

#[derive(Deserialize)]
struct UserEntry {
    login: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default = "active_default")]
    active: bool,
}

fn active_default() -> bool {
    true
}

impl From<UserEntry> for User {
    fn from(u: UserEntry) -> Self {
        User {
            login: u.login,
            name: u.name,
            email: u.email.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    users: Vec<UserEntry>,
}

#[derive(Deserialize)]
struct CreateResponse {
    user: UserEntry,
}

#[derive(Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    groups: Vec<NamedEntry>,
}

#[derive(Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Deserialize)]
struct PermissionEntry {
    login: String,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Deserialize)]
struct PermissionsResponse {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    users: Vec<PermissionEntry>,
}

const PERMISSIONS_PAGE_SIZE: u32 = 100;

#[async_trait]
impl UserApi for SonarClient {
    async fn get_user(&self, login: &str) -> Result<User> {
        let page_size = PAGE_SIZE.to_string();
        let resp: SearchResponse = self
            .get_json("api/users/search", &[("q", login), ("ps", page_size.as_str())])
            .await?;
        resp.users
            .into_iter()
            .find(|u| u.login == login && u.active)
            .map(User::from)
            .ok_or_else(|| Error::not_found("user", login))
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut form = vec![
            ("login", user.login.as_str()),
            ("name", user.name.as_str()),
            ("local", "false"),
        ];
        if let Some(email) = &user.email {
            form.push(("email", email.as_str()));
        }
        let resp: CreateResponse = self.post_json("api/users/create", &form).await?;
        Ok(resp.user.into())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut form = vec![("login", user.login.as_str()), ("name", user.name.as_str())];
        if let Some(email) = &user.email {
            form.push(("email", email.as_str()));
        }
        self.post("api/users/update", &form)
            .await
            .map_err(not_found_as("user", &user.login))
    }

    async fn deactivate_user(&self, login: &str) -> Result<()> {
        self.post("api/users/deactivate", &[("login", login)])
            .await
            .map_err(not_found_as("user", login))
    }

    async fn user_groups(&self, login: &str) -> Result<BTreeSet<String>> {
        let page_size = PAGE_SIZE.to_string();
        let mut groups = BTreeSet::new();
        let mut page = 1u32;
        loop {
            let page_index = page.to_string();
            let resp: GroupsResponse = self
                .get_json(
                    "api/users/groups",
                    &[
                        ("login", login),
                        ("selected", "selected"),
                        ("ps", page_size.as_str()),
                        ("p", page_index.as_str()),
                    ],
                )
                .await
                .map_err(not_found_as("user", login))?;
            groups.extend(resp.groups.into_iter().map(|g| g.name));
            if !resp.paging.has_more() {
                return Ok(groups);
            }
            page += 1;
        }
    }

    async fn add_user_to_group(&self, login: &str, group: &str) -> Result<()> {
        self.post("api/user_groups/add_user", &[("name", group), ("login", login)])
            .await
    }

    async fn remove_user_from_group(&self, login: &str, group: &str) -> Result<()> {
        self.post(
            "api/user_groups/remove_user",
            &[("name", group), ("login", login)],
        )
        .await
    }

    async fn user_permissions(&self, login: &str) -> Result<BTreeSet<String>> {
        let page_size = PERMISSIONS_PAGE_SIZE.to_string();
        let mut page = 1u32;
        loop {
            let page_index = page.to_string();
            let mut query = vec![("ps", page_size.as_str()), ("p", page_index.as_str())];
            query.extend(search_term(login));

            let resp: PermissionsResponse = self.get_json("api/permissions/users", &query).await?;
            if let Some(entry) = resp.users.into_iter().find(|u| u.login == login) {
                return Ok(entry.permissions.into_iter().collect());
            }
            // Users without any global permission may be omitted
            if !resp.paging.has_more() {
                return Ok(BTreeSet::new());
            }
            page += 1;
        }
    }

    async fn add_user_permission(&self, login: &str, permission: &str) -> Result<()> {
        self.post(
            "api/permissions/add_user",
            &[("login", login), ("permission", permission)],
        )
        .await
    }

    async fn remove_user_permission(&self, login: &str, permission: &str) -> Result<()> {
        self.post(
            "api/permissions/remove_user",
            &[("login", login), ("permission", permission)],
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
    async fn get_user_ignores_inactive_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{"login": "jdoe", "name": "Jane", "active": false}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_user("jdoe").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_user_is_non_local() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/create"))
            .and(body_string_contains("local=false"))
            .and(body_string_contains("email=jane%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": {"login": "jdoe", "name": "Jane Doe", "email": "jane@example.com", "active": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = User {
            login: "jdoe".to_string(),
            name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
        };
        let created = client_for(&server).create_user(&user).await.unwrap();
        assert_eq!(created, user);
    }

    #[tokio::test]
    async fn user_groups_lists_selected_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/groups"))
            .and(query_param("selected", "selected"))
            .and(query_param("login", "jdoe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"pageIndex": 1, "pageSize": 500, "total": 2},
                "groups": [{"name": "sonar-users"}, {"name": "developers"}]
            })))
            .mount(&server)
            .await;

        let groups = client_for(&server).user_groups("jdoe").await.unwrap();
        assert!(groups.contains("sonar-users"));
        assert!(groups.contains("developers"));
    }

    #[tokio::test]
    async fn user_without_permissions_has_empty_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/permissions/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"pageIndex": 1, "pageSize": 100, "total": 1},
                "users": [{"login": "jdoe2", "permissions": ["admin"]}]
            })))
            .mount(&server)
            .await;

        let perms = client_for(&server).user_permissions("jdoe").await.unwrap();
        assert!(perms.is_empty());
    }
}
