//! SonarGroup: the group, then its global permissions

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{GroupApi, SonarApi, SonarHandle};
use sonar_common::crd::{to_set, SonarGroup};
use sonar_common::Result;
use sonar_engine::{reconcile_members, tolerate_not_found, MemberOps, Observed, Step};

use super::{drifted, found, Chain};

/// Ensure group, then sync its permissions
pub fn create_chain() -> Chain<SonarGroup> {
    Chain::new().then(EnsureGroup).then(SyncGroupPermissions)
}

/// Delete the group
pub fn delete_chain() -> Chain<SonarGroup> {
    Chain::new().then(DeleteGroup)
}

struct EnsureGroup;

#[async_trait]
impl Step<SonarGroup, SonarHandle> for EnsureGroup {
    fn name(&self) -> &'static str {
        "ensure_group"
    }

    async fn run(&self, client: &SonarHandle, group: &SonarGroup, _: &mut Observed) -> Result<()> {
        let spec = &group.spec;
        let description = spec.description.as_deref();
        match found(client.get_group(&spec.name).await)? {
            None => {
                client.create_group(&spec.name, description).await?;
                info!(group = %spec.name, "Created group");
            }
            Some(existing) if drifted(description, existing.description.as_deref()) => {
                client.update_group(&spec.name, description).await?;
                info!(group = %spec.name, "Updated group description");
            }
            Some(_) => debug!(group = %spec.name, "Group up to date"),
        }
        Ok(())
    }
}

struct GroupPermissions<'a> {
    api: &'a dyn SonarApi,
    group: &'a str,
}

#[async_trait]
impl<'a> MemberOps for GroupPermissions<'a> {
    async fn add(&self, permission: &str) -> Result<()> {
        self.api.add_group_permission(self.group, permission).await
    }

    async fn remove(&self, permission: &str) -> Result<()> {
        self.api.remove_group_permission(self.group, permission).await
    }
}

struct SyncGroupPermissions;

#[async_trait]
impl Step<SonarGroup, SonarHandle> for SyncGroupPermissions {
    fn name(&self) -> &'static str {
        "sync_group_permissions"
    }

    async fn run(&self, client: &SonarHandle, group: &SonarGroup, _: &mut Observed) -> Result<()> {
        let spec = &group.spec;
        let actual = client.group_permissions(&spec.name).await?;
        let ops = GroupPermissions {
            api: &**client,
            group: &spec.name,
        };
        let summary =
            reconcile_members(&to_set(&spec.permissions), &actual, &BTreeSet::new(), &ops).await?;
        if !summary.is_noop() {
            info!(
                group = %spec.name,
                added = summary.created,
                removed = summary.deleted,
                "Synced group permissions"
            );
        }
        Ok(())
    }
}

struct DeleteGroup;

#[async_trait]
impl Step<SonarGroup, SonarHandle> for DeleteGroup {
    fn name(&self) -> &'static str {
        "delete_group"
    }

    async fn run(&self, client: &SonarHandle, group: &SonarGroup, _: &mut Observed) -> Result<()> {
        tolerate_not_found(client.delete_group(&group.spec.name).await)
    }
}

#[cfg(test)]
mod tests {
    use sonar_common::crd::SonarGroupSpec;

    use super::*;
    use crate::fake::FakeSonar;

    fn group(permissions: &[&str]) -> SonarGroup {
        SonarGroup::new(
            "devs",
            SonarGroupSpec {
                sonar_ref: "sonar".to_string(),
                name: "developers".to_string(),
                description: Some("Dev team".to_string()),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        )
    }

    #[tokio::test]
    async fn creates_group_and_grants_permissions() {
        let fake = FakeSonar::new();
        create_chain()
            .run(&fake.handle(), &group(&["scan", "gateadmin"]), &mut Observed::default())
            .await
            .unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "create_group developers",
                "add_group_permission developers gateadmin",
                "add_group_permission developers scan",
            ]
        );
    }

    #[tokio::test]
    async fn converged_group_issues_no_writes() {
        let fake = FakeSonar::new();
        let desired = group(&["scan"]);
        create_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();
        fake.clear_calls();

        create_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();

        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn revokes_permissions_dropped_from_spec() {
        let fake = FakeSonar::new();
        create_chain()
            .run(&fake.handle(), &group(&["scan", "admin"]), &mut Observed::default())
            .await
            .unwrap();
        fake.clear_calls();

        create_chain()
            .run(&fake.handle(), &group(&["scan"]), &mut Observed::default())
            .await
            .unwrap();

        assert_eq!(fake.calls(), vec!["remove_group_permission developers admin"]);
    }

    #[tokio::test]
    async fn updates_changed_description() {
        let fake = FakeSonar::new();
        create_chain()
            .run(&fake.handle(), &group(&[]), &mut Observed::default())
            .await
            .unwrap();
        fake.clear_calls();

        let mut changed = group(&[]);
        changed.spec.description = Some("Platform team".to_string());
        create_chain()
            .run(&fake.handle(), &changed, &mut Observed::default())
            .await
            .unwrap();

        assert_eq!(fake.calls(), vec!["update_group developers"]);
    }

    #[tokio::test]
    async fn delete_tolerates_missing_group() {
        let fake = FakeSonar::new();
        delete_chain()
            .run(&fake.handle(), &group(&[]), &mut Observed::default())
            .await
            .unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_stops_chain_with_step_context() {
        let fake = FakeSonar::new();
        fake.state().fail_on = Some("add_group_permission".to_string());

        let err = create_chain()
            .run(&fake.handle(), &group(&["scan"]), &mut Observed::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("sync_group_permissions"));
        assert_eq!(fake.calls(), vec!["create_group developers"]);
    }
}
