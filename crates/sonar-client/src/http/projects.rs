use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::crd::ProjectVisibility;
use sonar_common::{Error, Result};

use super::{not_found_as, SonarClient};
use crate::api::ProjectApi;
use crate::types::Project;

#[derive(Deserialize)]
struct ComponentEntry {
    key: String,
    name: String,
    #[serde(default)]
    visibility: ProjectVisibility,
}

impl From<ComponentEntry> for Project {
    fn from(c: ComponentEntry) -> Self {
        Project {
            key: c.key,
            name: c.name,
            visibility: c.visibility,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    components: Vec<ComponentEntry>,
}

#[derive(Deserialize)]
struct CreateResponse {
    project: ComponentEntry,
}

#[async_trait]
impl ProjectApi for SonarClient {
    async fn get_project(&self, key: &str) -> Result<Project> {
        let resp: SearchResponse = self
            .get_json("api/projects/search", &[("projects", key)])
            .await?;
        resp.components
            .into_iter()
            .find(|c| c.key == key)
            .map(Project::from)
            .ok_or_else(|| Error::not_found("project", key))
    }

    async fn create_project(
        &self,
        key: &str,
        name: &str,
        visibility: ProjectVisibility,
    ) -> Result<Project> {
        let resp: CreateResponse = self
            .post_json(
                "api/projects/create",
                &[
                    ("project", key),
                    ("name", name),
                    ("visibility", visibility.as_str()),
                ],
            )
            .await?;
        Ok(resp.project.into())
    }

    async fn update_visibility(&self, key: &str, visibility: ProjectVisibility) -> Result<()> {
        self.post(
            "api/projects/update_visibility",
            &[("project", key), ("visibility", visibility.as_str())],
        )
        .await
        .map_err(not_found_as("project", key))
    }

    async fn delete_project(&self, key: &str) -> Result<()> {
        self.post("api/projects/delete", &[("project", key)])
            .await
            .map_err(not_found_as("project", key))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::client_for;
    use super::*;

    #[tokio::test]
    async fn get_project_by_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/search"))
            .and(query_param("projects", "payments-api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "components": [{"key": "payments-api", "name": "Payments API", "visibility": "public"}]
            })))
            .mount(&server)
            .await;

        let project = client_for(&server).get_project("payments-api").await.unwrap();
        assert_eq!(project.visibility, ProjectVisibility::Public);
    }

    #[tokio::test]
    async fn empty_search_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"components": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).get_project("x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_sends_visibility() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/create"))
            .and(body_string_contains("visibility=private"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "project": {"key": "payments-api", "name": "Payments API", "visibility": "private"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let project = client_for(&server)
            .create_project("payments-api", "Payments API", ProjectVisibility::Private)
            .await
            .unwrap();
        assert_eq!(project.key, "payments-api");
    }
}
