use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use sonar_common::{Error, Result};

use super::{not_found_as, SonarClient, PAGE_SIZE};
use crate::api::QualityProfileApi;
use crate::types::{QualityProfile, RuleActivation};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEntry {
    key: String,
    name: String,
    language: String,
    #[serde(default)]
    is_default: bool,
}

impl From<ProfileEntry> for QualityProfile {
    fn from(p: ProfileEntry) -> Self {
        QualityProfile {
            key: p.key,
            name: p.name,
            language: p.language,
            is_default: p.is_default,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    profiles: Vec<ProfileEntry>,
}

#[derive(Deserialize)]
struct CreateResponse {
    profile: ProfileEntry,
}

/// `api/rules/search` with `f=actives`
#[derive(Deserialize)]
struct RulesResponse {
    #[serde(default)]
    total: u32,
    #[serde(default)]
    rules: Vec<RuleKey>,
    #[serde(default)]
    actives: BTreeMap<String, Vec<ActiveEntry>>,
}

#[derive(Deserialize)]
struct RuleKey {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveEntry {
    q_profile: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    params: Vec<ParamEntry>,
}

#[derive(Deserialize)]
struct ParamEntry {
    key: String,
    #[serde(default)]
    value: String,
}

/// Encode rule parameters as SonarQube's `key1=v1;key2=v2`
fn encode_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

#[async_trait]
impl QualityProfileApi for SonarClient {
    async fn get_profile(&self, language: &str, name: &str) -> Result<QualityProfile> {
        let resp: SearchResponse = self
            .get_json(
                "api/qualityprofiles/search",
                &[("language", language), ("qualityProfile", name)],
            )
            .await
            .map_err(not_found_as("quality profile", name))?;
        resp.profiles
            .into_iter()
            .find(|p| p.name == name && p.language == language)
            .map(QualityProfile::from)
            .ok_or_else(|| Error::not_found("quality profile", name))
    }

    async fn create_profile(&self, language: &str, name: &str) -> Result<QualityProfile> {
        let resp: CreateResponse = self
            .post_json(
                "api/qualityprofiles/create",
                &[("language", language), ("name", name)],
            )
            .await?;
        Ok(resp.profile.into())
    }

    async fn delete_profile(&self, language: &str, name: &str) -> Result<()> {
        self.post(
            "api/qualityprofiles/delete",
            &[("language", language), ("qualityProfile", name)],
        )
        .await
        .map_err(not_found_as("quality profile", name))
    }

    async fn set_default_profile(&self, language: &str, name: &str) -> Result<()> {
        self.post(
            "api/qualityprofiles/set_default",
            &[("language", language), ("qualityProfile", name)],
        )
        .await
        .map_err(not_found_as("quality profile", name))
    }

    async fn active_rules(&self, profile_key: &str) -> Result<BTreeMap<String, RuleActivation>> {
        let page_size = PAGE_SIZE.to_string();
        let mut active = BTreeMap::new();
        let mut page = 1u32;
        let mut seen = 0u32;
        loop {
            let page_index = page.to_string();
            let resp: RulesResponse = self
                .get_json(
                    "api/rules/search",
                    &[
                        ("qprofile", profile_key),
                        ("activation", "true"),
                        ("f", "actives"),
                        ("ps", page_size.as_str()),
                        ("p", page_index.as_str()),
                    ],
                )
                .await?;

            let returned = resp.rules.len() as u32;
            let mut actives = resp.actives;
            for rule in resp.rules {
                let activation = actives
                    .remove(&rule.key)
                    .and_then(|entries| entries.into_iter().find(|a| a.q_profile == profile_key));
                if let Some(a) = activation {
                    active.insert(
                        rule.key,
                        RuleActivation {
                            severity: a.severity,
                            params: a.params.into_iter().map(|p| (p.key, p.value)).collect(),
                        },
                    );
                }
            }

            seen += returned;
            if returned == 0 || seen >= resp.total {
                return Ok(active);
            }
            page += 1;
        }
    }

    async fn activate_rule(
        &self,
        profile_key: &str,
        rule: &str,
        activation: &RuleActivation,
    ) -> Result<()> {
        let params = encode_params(&activation.params);
        let mut form = vec![("key", profile_key), ("rule", rule)];
        if let Some(severity) = &activation.severity {
            form.push(("severity", severity.as_str()));
        }
        if !params.is_empty() {
            form.push(("params", params.as_str()));
        }
        self.post("api/qualityprofiles/activate_rule", &form).await
    }

    async fn deactivate_rule(&self, profile_key: &str, rule: &str) -> Result<()> {
        self.post(
            "api/qualityprofiles/deactivate_rule",
            &[("key", profile_key), ("rule", rule)],
        )
        .await
    }
}
