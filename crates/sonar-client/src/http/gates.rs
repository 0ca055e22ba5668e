use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::{Error, Result};

use super::{id_string, not_found_as, SonarClient};
use crate::api::QualityGateApi;
use crate::types::{ConditionParams, GateCondition, QualityGate};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GateResponse {
    #[serde(default, deserialize_with = "id_string")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    conditions: Vec<ConditionEntry>,
}

#[derive(Deserialize)]
struct ConditionEntry {
    #[serde(default, deserialize_with = "id_string")]
    id: Option<String>,
    metric: String,
    op: String,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectGateResponse {
    quality_gate: ProjectGate,
}

#[derive(Deserialize)]
struct ProjectGate {
    name: String,
}

impl GateResponse {
    fn into_gate(self) -> Result<QualityGate> {
        let conditions = self
            .conditions
            .into_iter()
            .map(|c| {
                let id = c.id.ok_or_else(|| {
                    Error::remote(
                        "api/qualitygates/show",
                        format!("condition on '{}' has no id", c.metric),
                    )
                })?;
                Ok(GateCondition {
                    id,
                    op: c.op.parse()?,
                    metric: c.metric,
                    error: c.error,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(QualityGate {
            // Gates are addressed by name on servers that no longer expose ids
            id: self.id.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            is_default: self.is_default,
            conditions,
        })
    }
}

#[async_trait]
impl QualityGateApi for SonarClient {
    async fn get_gate(&self, name: &str) -> Result<QualityGate> {
        let resp: GateResponse = self
            .get_json("api/qualitygates/show", &[("name", name)])
            .await
            .map_err(not_found_as("quality gate", name))?;
        resp.into_gate()
    }

    async fn create_gate(&self, name: &str) -> Result<QualityGate> {
        let resp: GateResponse = self
            .post_json("api/qualitygates/create", &[("name", name)])
            .await?;
        resp.into_gate()
    }

    async fn delete_gate(&self, name: &str) -> Result<()> {
        self.post("api/qualitygates/destroy", &[("name", name)])
            .await
            .map_err(not_found_as("quality gate", name))
    }

    async fn set_default_gate(&self, name: &str) -> Result<()> {
        self.post("api/qualitygates/set_as_default", &[("name", name)])
            .await
            .map_err(not_found_as("quality gate", name))
    }

    async fn create_condition(&self, gate: &str, condition: &ConditionParams) -> Result<()> {
        self.post(
            "api/qualitygates/create_condition",
            &[
                ("gateName", gate),
                ("metric", condition.metric.as_str()),
                ("op", condition.op.as_str()),
                ("error", condition.error.as_str()),
            ],
        )
        .await
    }

    async fn update_condition(&self, id: &str, condition: &ConditionParams) -> Result<()> {
        self.post(
            "api/qualitygates/update_condition",
            &[
                ("id", id),
                ("metric", condition.metric.as_str()),
                ("op", condition.op.as_str()),
                ("error", condition.error.as_str()),
            ],
        )
        .await
    }

    async fn delete_condition(&self, id: &str) -> Result<()> {
        self.post("api/qualitygates/delete_condition", &[("id", id)])
            .await
    }

    async fn project_gate(&self, project: &str) -> Result<String> {
        let resp: ProjectGateResponse = self
            .get_json("api/qualitygates/get_by_project", &[("project", project)])
            .await
            .map_err(not_found_as("project", project))?;
        Ok(resp.quality_gate.name)
    }

    async fn select_gate(&self, gate: &str, project: &str) -> Result<()> {
        self.post(
            "api/qualitygates/select",
            &[("gateName", gate), ("projectKey", project)],
        )
        .await
    }
}
