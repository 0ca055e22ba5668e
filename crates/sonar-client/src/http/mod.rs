//! HTTP implementation of the capability traits over the SonarQube Web API
//!
//! All calls authenticate with a bearer token. Read endpoints are `GET` with
//! query parameters; write endpoints are `POST` with form parameters. A 404 is
//! mapped to the not-found sentinel; any other non-2xx becomes
//! [`Error::Remote`] carrying the status and the first message of SonarQube's
//! `{"errors":[{"msg":...}]}` body.

mod gates;
mod groups;
mod profiles;
mod projects;
mod templates;
mod users;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use sonar_common::metrics::{record_remote_call, RemoteResult};
use sonar_common::{Error, Result};

use crate::api::SystemApi;
use crate::types::SystemStatus;

/// Page size used for listings
pub(crate) const PAGE_SIZE: u32 = 500;

/// Build the pooled HTTP client shared by every connection
///
/// `timeout` bounds each request end to end.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sonar-operator/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::internal_with_context("http_client", e.to_string()))
}

/// Client for one SonarQube server
#[derive(Clone)]
pub struct SonarClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for SonarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonarClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    msg: String,
}

/// Extract the first SonarQube error message from a response body
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.errors.into_iter().next())
        .map(|e| e.msg)
}

impl SonarClient {
    /// Create a client for `base_url` using a shared `reqwest::Client`
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request and map non-2xx responses to errors
    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        trace!(operation, "Calling SonarQube");
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    e.to_string()
                };
                Error::remote(operation, message)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string()
        });
        debug!(operation, status = status.as_u16(), %message, "SonarQube call failed");

        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(operation, message));
        }
        Err(Error::remote_status(operation, status.as_u16(), message))
    }

    /// `GET` a JSON document
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.http.get(self.url(operation)).query(query);
        let result = match self.execute(operation, request).await {
            Ok(response) => response.json::<T>().await.map_err(|e| {
                Error::remote(operation, format!("failed to decode response: {}", e))
            }),
            Err(e) => Err(e),
        };
        record_remote_call(operation, RemoteResult::of(&result));
        result
    }

    /// `POST` a form and decode the JSON answer
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.http.post(self.url(operation)).form(form);
        let result = match self.execute(operation, request).await {
            Ok(response) => response.json::<T>().await.map_err(|e| {
                Error::remote(operation, format!("failed to decode response: {}", e))
            }),
            Err(e) => Err(e),
        };
        record_remote_call(operation, RemoteResult::of(&result));
        result
    }

    /// `POST` a form, ignoring the body
    pub(crate) async fn post(&self, operation: &str, form: &[(&str, &str)]) -> Result<()> {
        let request = self.http.post(self.url(operation)).form(form);
        let result = self.execute(operation, request).await.map(|_| ());
        record_remote_call(operation, RemoteResult::of(&result));
        result
    }
}

/// Paging block of SonarQube listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Paging {
    #[serde(default)]
    pub page_index: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total: u32,
}

impl Paging {
    /// Whether another page follows this one
    pub(crate) fn has_more(&self) -> bool {
        self.page_size > 0 && self.page_index.saturating_mul(self.page_size) < self.total
    }
}

/// Deserialize an identifier that SonarQube sends as a string or a number
pub(crate) fn id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Free-text search parameter, omitted below SonarQube's 3-char minimum
pub(crate) fn search_term(term: &str) -> Option<(&'static str, &str)> {
    (term.chars().count() >= 3).then_some(("q", term))
}

/// Re-key a 404 from an endpoint as not-found for a specific entity
pub(crate) fn not_found_as<'a>(entity: &'static str, key: &'a str) -> impl FnOnce(Error) -> Error + 'a {
    move |e| {
        if e.is_not_found() {
            Error::not_found(entity, key)
        } else {
            e
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    version: String,
    status: String,
}

#[async_trait]
impl SystemApi for SonarClient {
    async fn system_status(&self) -> Result<SystemStatus> {
        let resp: StatusResponse = self.get_json("api/system/status", &[]).await?;
        Ok(SystemStatus {
            version: resp.version,
            status: resp.status,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use wiremock::MockServer;

    use super::{build_http_client, SonarClient};

    pub(crate) fn client_for(server: &MockServer) -> SonarClient {
        let http = build_http_client(Duration::from_secs(5)).expect("http client");
        SonarClient::new(http, format!("{}/", server.uri()), "squ_test")
    }
}
