//! SonarQualityProfile: the profile, its rule activations, then the default
//! marker
//!
//! The profile key is recorded as `remoteId` and a fingerprint of the
//! processed rule keys as `processedKeysHash`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{QualityProfileApi, RuleActivation, SonarApi, SonarHandle};
use sonar_common::crd::{RuleSpec, SonarQualityProfile};
use sonar_common::kube_utils::keys_fingerprint;
use sonar_common::Result;
use sonar_engine::{reconcile_collection, tolerate_not_found, CollectionOps, Observed, Step};

use super::{found, Chain};

/// Ensure profile, sync rules, then apply the default flag
pub fn create_chain() -> Chain<SonarQualityProfile> {
    Chain::new()
        .then(EnsureProfile)
        .then(SyncRules)
        .then(SetDefaultProfile)
}

/// Delete the profile
pub fn delete_chain() -> Chain<SonarQualityProfile> {
    Chain::new().then(DeleteProfile)
}

struct EnsureProfile;

#[async_trait]
impl Step<SonarQualityProfile, SonarHandle> for EnsureProfile {
    fn name(&self) -> &'static str {
        "ensure_profile"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        profile: &SonarQualityProfile,
        observed: &mut Observed,
    ) -> Result<()> {
        let spec = &profile.spec;
        let existing = match found(client.get_profile(&spec.language, &spec.name).await)? {
            Some(existing) => {
                debug!(profile = %spec.name, language = %spec.language, "Quality profile exists");
                existing
            }
            None => {
                let created = client.create_profile(&spec.language, &spec.name).await?;
                info!(
                    profile = %spec.name,
                    language = %spec.language,
                    key = %created.key,
                    "Created quality profile"
                );
                created
            }
        };
        observed.remote_id = Some(existing.key);
        Ok(())
    }
}

fn activation(rule: &RuleSpec) -> RuleActivation {
    RuleActivation {
        severity: rule.severity.clone(),
        params: rule.params.clone(),
    }
}

struct ProfileRules<'a> {
    api: &'a dyn SonarApi,
    profile_key: &'a str,
}

#[async_trait]
impl<'a> CollectionOps for ProfileRules<'a> {
    type Key = String;
    type Desired = RuleSpec;
    type Actual = RuleActivation;

    /// Unset severity and unlisted params are left at SonarQube's values
    fn is_converged(&self, desired: &RuleSpec, actual: &RuleActivation) -> bool {
        let severity_matches = desired
            .severity
            .as_ref()
            .map_or(true, |s| actual.severity.as_ref() == Some(s));
        severity_matches
            && desired
                .params
                .iter()
                .all(|(k, v)| actual.params.get(k) == Some(v))
    }

    async fn create(&self, rule: &String, desired: &RuleSpec) -> Result<()> {
        self.api
            .activate_rule(self.profile_key, rule, &activation(desired))
            .await
    }

    async fn update(&self, rule: &String, desired: &RuleSpec, _: &RuleActivation) -> Result<()> {
        self.api
            .activate_rule(self.profile_key, rule, &activation(desired))
            .await
    }

    async fn delete(&self, rule: &String, _: &RuleActivation) -> Result<()> {
        self.api.deactivate_rule(self.profile_key, rule).await
    }
}

struct SyncRules;

#[async_trait]
impl Step<SonarQualityProfile, SonarHandle> for SyncRules {
    fn name(&self) -> &'static str {
        "sync_rules"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        profile: &SonarQualityProfile,
        observed: &mut Observed,
    ) -> Result<()> {
        let spec = &profile.spec;
        let key = client.get_profile(&spec.language, &spec.name).await?.key;
        let actual: BTreeMap<String, RuleActivation> = client.active_rules(&key).await?;
        let ops = ProfileRules {
            api: &**client,
            profile_key: &key,
        };
        let summary = reconcile_collection(&spec.rules, &actual, &BTreeSet::new(), &ops).await?;
        if !summary.is_noop() {
            info!(
                profile = %spec.name,
                activated = summary.created,
                changed = summary.updated,
                deactivated = summary.deleted,
                "Synced profile rules"
            );
        }
        observed.processed_keys_hash = Some(keys_fingerprint(spec.rules.keys().map(String::as_str)));
        Ok(())
    }
}

struct SetDefaultProfile;

#[async_trait]
impl Step<SonarQualityProfile, SonarHandle> for SetDefaultProfile {
    fn name(&self) -> &'static str {
        "set_default_profile"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        profile: &SonarQualityProfile,
        _: &mut Observed,
    ) -> Result<()> {
        let spec = &profile.spec;
        if !spec.default {
            return Ok(());
        }
        if client.get_profile(&spec.language, &spec.name).await?.is_default {
            return Ok(());
        }
        client.set_default_profile(&spec.language, &spec.name).await?;
        info!(profile = %spec.name, language = %spec.language, "Set default quality profile");
        Ok(())
    }
}

struct DeleteProfile;

#[async_trait]
impl Step<SonarQualityProfile, SonarHandle> for DeleteProfile {
    fn name(&self) -> &'static str {
        "delete_profile"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        profile: &SonarQualityProfile,
        _: &mut Observed,
    ) -> Result<()> {
        tolerate_not_found(
            client
                .delete_profile(&profile.spec.language, &profile.spec.name)
                .await,
        )
    }
}
