//! SonarUser: the account, its group memberships, then its direct permissions
//!
//! SonarQube adds every account to the built-in default group; that
//! membership is never removed even though specs do not list it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{SonarApi, SonarHandle, User, UserApi};
use sonar_common::crd::{to_set, SonarUser};
use sonar_common::{Result, DEFAULT_USERS_GROUP};
use sonar_engine::{reconcile_members, tolerate_not_found, MemberOps, Observed, Step};

use super::{drifted, found, Chain};

/// Ensure user, sync groups, then sync permissions
pub fn create_chain() -> Chain<SonarUser> {
    Chain::new()
        .then(EnsureUser)
        .then(SyncUserGroups)
        .then(SyncUserPermissions)
}

/// Deactivate the user
pub fn delete_chain() -> Chain<SonarUser> {
    Chain::new().then(DeactivateUser)
}

fn desired_user(user: &SonarUser) -> User {
    User {
        login: user.spec.login.clone(),
        name: user.spec.name.clone(),
        email: user.spec.email.clone(),
    }
}

struct EnsureUser;

#[async_trait]
impl Step<SonarUser, SonarHandle> for EnsureUser {
    fn name(&self) -> &'static str {
        "ensure_user"
    }

    async fn run(&self, client: &SonarHandle, user: &SonarUser, _: &mut Observed) -> Result<()> {
        let desired = desired_user(user);
        match found(client.get_user(&desired.login).await)? {
            None => {
                client.create_user(&desired).await?;
                info!(login = %desired.login, "Created user");
            }
            Some(existing)
                if existing.name != desired.name
                    || drifted(desired.email.as_deref(), existing.email.as_deref()) =>
            {
                client.update_user(&desired).await?;
                info!(login = %desired.login, "Updated user");
            }
            Some(_) => debug!(login = %desired.login, "User up to date"),
        }
        Ok(())
    }
}

struct UserGroups<'a> {
    api: &'a dyn SonarApi,
    login: &'a str,
}

#[async_trait]
impl<'a> MemberOps for UserGroups<'a> {
    async fn add(&self, group: &str) -> Result<()> {
        self.api.add_user_to_group(self.login, group).await
    }

    async fn remove(&self, group: &str) -> Result<()> {
        self.api.remove_user_from_group(self.login, group).await
    }
}

struct SyncUserGroups;

#[async_trait]
impl Step<SonarUser, SonarHandle> for SyncUserGroups {
    fn name(&self) -> &'static str {
        "sync_user_groups"
    }

    async fn run(&self, client: &SonarHandle, user: &SonarUser, _: &mut Observed) -> Result<()> {
        let login = &user.spec.login;
        let actual = client.user_groups(login).await?;
        let protected = BTreeSet::from([DEFAULT_USERS_GROUP.to_string()]);
        let ops = UserGroups {
            api: &**client,
            login,
        };
        let summary =
            reconcile_members(&to_set(&user.spec.groups), &actual, &protected, &ops).await?;
        if !summary.is_noop() {
            info!(
                login = %login,
                joined = summary.created,
                left = summary.deleted,
                "Synced user groups"
            );
        }
        Ok(())
    }
}

struct UserPermissions<'a> {
    api: &'a dyn SonarApi,
    login: &'a str,
}

#[async_trait]
impl<'a> MemberOps for UserPermissions<'a> {
    async fn add(&self, permission: &str) -> Result<()> {
        self.api.add_user_permission(self.login, permission).await
    }

    async fn remove(&self, permission: &str) -> Result<()> {
        self.api.remove_user_permission(self.login, permission).await
    }
}

struct SyncUserPermissions;

#[async_trait]
impl Step<SonarUser, SonarHandle> for SyncUserPermissions {
    fn name(&self) -> &'static str {
        "sync_user_permissions"
    }

    async fn run(&self, client: &SonarHandle, user: &SonarUser, _: &mut Observed) -> Result<()> {
        let login = &user.spec.login;
        let actual = client.user_permissions(login).await?;
        let ops = UserPermissions {
            api: &**client,
            login,
        };
        let summary =
            reconcile_members(&to_set(&user.spec.permissions), &actual, &BTreeSet::new(), &ops)
                .await?;
        if !summary.is_noop() {
            info!(
                login = %login,
                granted = summary.created,
                revoked = summary.deleted,
                "Synced user permissions"
            );
        }
        Ok(())
    }
}

struct DeactivateUser;

#[async_trait]
impl Step<SonarUser, SonarHandle> for DeactivateUser {
    fn name(&self) -> &'static str {
        "deactivate_user"
    }

    async fn run(&self, client: &SonarHandle, user: &SonarUser, _: &mut Observed) -> Result<()> {
        tolerate_not_found(client.deactivate_user(&user.spec.login).await)
    }
}
