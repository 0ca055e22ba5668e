//! SonarQualityGate: the gate, its conditions, then the default marker
//!
//! Conditions are keyed by metric. A changed threshold or operator updates the
//! stored condition in place, addressed by its SonarQube id.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{ConditionParams, GateCondition, QualityGateApi, SonarApi, SonarHandle};
use sonar_common::crd::{ConditionSpec, SonarQualityGate};
use sonar_common::Result;
use sonar_engine::{reconcile_collection, tolerate_not_found, CollectionOps, Observed, Step};

use super::{found, Chain};

/// Ensure gate, sync conditions, then apply the default flag
pub fn create_chain() -> Chain<SonarQualityGate> {
    Chain::new()
        .then(EnsureGate)
        .then(SyncConditions)
        .then(SetDefaultGate)
}

/// Delete the gate
pub fn delete_chain() -> Chain<SonarQualityGate> {
    Chain::new().then(DeleteGate)
}

struct EnsureGate;

#[async_trait]
impl Step<SonarQualityGate, SonarHandle> for EnsureGate {
    fn name(&self) -> &'static str {
        "ensure_gate"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        gate: &SonarQualityGate,
        observed: &mut Observed,
    ) -> Result<()> {
        let name = &gate.spec.name;
        let existing = match found(client.get_gate(name).await)? {
            Some(existing) => {
                debug!(gate = %name, "Quality gate exists");
                existing
            }
            None => {
                let created = client.create_gate(name).await?;
                info!(gate = %name, id = %created.id, "Created quality gate");
                created
            }
        };
        observed.remote_id = Some(existing.id);
        Ok(())
    }
}

fn condition_params(metric: &str, condition: &ConditionSpec) -> ConditionParams {
    ConditionParams {
        metric: metric.to_string(),
        op: condition.op,
        error: condition.error.clone(),
    }
}

struct GateConditions<'a> {
    api: &'a dyn SonarApi,
    gate: &'a str,
}

#[async_trait]
impl<'a> CollectionOps for GateConditions<'a> {
    type Key = String;
    type Desired = ConditionSpec;
    type Actual = GateCondition;

    fn is_converged(&self, desired: &ConditionSpec, actual: &GateCondition) -> bool {
        desired.op == actual.op && desired.error == actual.error
    }

    async fn create(&self, metric: &String, desired: &ConditionSpec) -> Result<()> {
        self.api
            .create_condition(self.gate, &condition_params(metric, desired))
            .await
    }

    async fn update(
        &self,
        metric: &String,
        desired: &ConditionSpec,
        actual: &GateCondition,
    ) -> Result<()> {
        self.api
            .update_condition(&actual.id, &condition_params(metric, desired))
            .await
    }

    async fn delete(&self, _metric: &String, actual: &GateCondition) -> Result<()> {
        self.api.delete_condition(&actual.id).await
    }
}

struct SyncConditions;

#[async_trait]
impl Step<SonarQualityGate, SonarHandle> for SyncConditions {
    fn name(&self) -> &'static str {
        "sync_conditions"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        gate: &SonarQualityGate,
        _: &mut Observed,
    ) -> Result<()> {
        let name = &gate.spec.name;
        let actual: BTreeMap<String, GateCondition> = client
            .get_gate(name)
            .await?
            .conditions
            .into_iter()
            .map(|c| (c.metric.clone(), c))
            .collect();
        let ops = GateConditions {
            api: &**client,
            gate: name,
        };
        let summary =
            reconcile_collection(&gate.spec.conditions, &actual, &BTreeSet::new(), &ops).await?;
        if !summary.is_noop() {
            info!(
                gate = %name,
                created = summary.created,
                updated = summary.updated,
                deleted = summary.deleted,
                "Synced gate conditions"
            );
        }
        Ok(())
    }
}

struct SetDefaultGate;

#[async_trait]
impl Step<SonarQualityGate, SonarHandle> for SetDefaultGate {
    fn name(&self) -> &'static str {
        "set_default_gate"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        gate: &SonarQualityGate,
        _: &mut Observed,
    ) -> Result<()> {
        if !gate.spec.default {
            return Ok(());
        }
        let name = &gate.spec.name;
        if client.get_gate(name).await?.is_default {
            return Ok(());
        }
        client.set_default_gate(name).await?;
        info!(gate = %name, "Set default quality gate");
        Ok(())
    }
}

struct DeleteGate;

#[async_trait]
impl Step<SonarQualityGate, SonarHandle> for DeleteGate {
    fn name(&self) -> &'static str {
        "delete_gate"
    }

    async fn run(
        &self,
        client: &SonarHandle,
        gate: &SonarQualityGate,
        _: &mut Observed,
    ) -> Result<()> {
        tolerate_not_found(client.delete_gate(&gate.spec.name).await)
    }
}
