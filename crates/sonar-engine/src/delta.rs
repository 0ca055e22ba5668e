//! Three-way diff and apply over keyed collections
//!
//! A desired mapping and a freshly fetched actual mapping are partitioned into
//! keys to delete (only in actual), keys to update (in both, not converged) and
//! keys to create (only in desired). Operations are applied in that order and
//! the first failure aborts the pass. Since actual state is re-read on every
//! pass, a partially applied delta is simply recomputed next time.
//!
//! Keys in the protected set are never deleted, even when absent from the
//! desired mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;

use sonar_common::Result;

/// Operations applied to one keyed remote collection
#[async_trait]
pub trait CollectionOps: Send + Sync {
    /// Stable key (group name, metric, rule key, ...)
    type Key: Ord + Clone + Debug + Send + Sync;
    /// Desired attributes of one key
    type Desired: Send + Sync;
    /// Actual attributes of one key as read from SonarQube
    type Actual: Send + Sync;

    /// Whether the actual attributes already match the desired ones
    fn is_converged(&self, desired: &Self::Desired, actual: &Self::Actual) -> bool;

    /// Create a key present only in desired
    async fn create(&self, key: &Self::Key, desired: &Self::Desired) -> Result<()>;

    /// Bring an existing key to its desired attributes
    async fn update(
        &self,
        key: &Self::Key,
        desired: &Self::Desired,
        actual: &Self::Actual,
    ) -> Result<()>;

    /// Delete a key present only in actual
    async fn delete(&self, key: &Self::Key, actual: &Self::Actual) -> Result<()>;
}

/// The operations needed to turn actual into desired
#[derive(Debug)]
pub struct DeltaSet<'a, K, D, A> {
    /// Keys only in desired
    pub to_create: Vec<(&'a K, &'a D)>,
    /// Keys in both whose attributes differ
    pub to_update: Vec<(&'a K, &'a D, &'a A)>,
    /// Keys only in actual, minus the protected ones
    pub to_delete: Vec<(&'a K, &'a A)>,
}

impl<K, D, A> DeltaSet<'_, K, D, A> {
    /// Whether no operation is needed
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Counts of operations applied by one [`reconcile_collection`] call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    /// Keys created
    pub created: usize,
    /// Keys updated
    pub updated: usize,
    /// Keys deleted
    pub deleted: usize,
}

impl DeltaSummary {
    /// Whether the pass issued no mutating call
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Partition `desired` and `actual` into a [`DeltaSet`]
pub fn compute_delta<'a, O: CollectionOps>(
    desired: &'a BTreeMap<O::Key, O::Desired>,
    actual: &'a BTreeMap<O::Key, O::Actual>,
    protected: &BTreeSet<O::Key>,
    ops: &O,
) -> DeltaSet<'a, O::Key, O::Desired, O::Actual> {
    let mut delta = DeltaSet {
        to_create: Vec::new(),
        to_update: Vec::new(),
        to_delete: Vec::new(),
    };

    for (key, current) in actual {
        match desired.get(key) {
            Some(wanted) if !ops.is_converged(wanted, current) => {
                delta.to_update.push((key, wanted, current));
            }
            Some(_) => {}
            None if protected.contains(key) => {
                debug!(?key, "Skipping deletion of protected key");
            }
            None => delta.to_delete.push((key, current)),
        }
    }

    for (key, wanted) in desired {
        if !actual.contains_key(key) {
            delta.to_create.push((key, wanted));
        }
    }

    delta
}

/// Apply the delta between `desired` and `actual` through `ops`
///
/// Deletions run first, then updates, then creations. Stops at the first
/// error.
pub async fn reconcile_collection<O: CollectionOps>(
    desired: &BTreeMap<O::Key, O::Desired>,
    actual: &BTreeMap<O::Key, O::Actual>,
    protected: &BTreeSet<O::Key>,
    ops: &O,
) -> Result<DeltaSummary> {
    let delta = compute_delta(desired, actual, protected, ops);
    let mut summary = DeltaSummary::default();
    if delta.is_empty() {
        return Ok(summary);
    }

    for (key, current) in delta.to_delete {
        ops.delete(key, current).await?;
        summary.deleted += 1;
    }
    for (key, wanted, current) in delta.to_update {
        ops.update(key, wanted, current).await?;
        summary.updated += 1;
    }
    for (key, wanted) in delta.to_create {
        ops.create(key, wanted).await?;
        summary.created += 1;
    }

    debug!(
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        "Applied collection delta"
    );
    Ok(summary)
}

// =============================================================================
// Flat membership
// =============================================================================

/// Add/remove calls for a flat membership set (a user's groups, a group's
/// permissions)
#[async_trait]
pub trait MemberOps: Send + Sync {
    /// Add one member
    async fn add(&self, member: &str) -> Result<()>;
    /// Remove one member
    async fn remove(&self, member: &str) -> Result<()>;
}

/// Adapts [`MemberOps`] to [`CollectionOps`] with unit attributes
pub struct MemberSet<'a, M: ?Sized>(pub &'a M);

#[async_trait]
impl<'a, M: MemberOps + ?Sized> CollectionOps for MemberSet<'a, M> {
    type Key = String;
    type Desired = ();
    type Actual = ();

    fn is_converged(&self, _desired: &(), _actual: &()) -> bool {
        true
    }

    async fn create(&self, key: &String, _desired: &()) -> Result<()> {
        self.0.add(key).await
    }

    async fn update(&self, _key: &String, _desired: &(), _actual: &()) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, key: &String, _actual: &()) -> Result<()> {
        self.0.remove(key).await
    }
}

fn as_unit_map(members: &BTreeSet<String>) -> BTreeMap<String, ()> {
    members.iter().map(|m| (m.clone(), ())).collect()
}

/// Reconcile a flat membership set
pub async fn reconcile_members<M: MemberOps + ?Sized>(
    desired: &BTreeSet<String>,
    actual: &BTreeSet<String>,
    protected: &BTreeSet<String>,
    ops: &M,
) -> Result<DeltaSummary> {
    reconcile_collection(
        &as_unit_map(desired),
        &as_unit_map(actual),
        protected,
        &MemberSet(ops),
    )
    .await
}

// =============================================================================
// Grouped membership
// =============================================================================

/// Add/remove calls for a key -> member set mapping (template group
/// permissions)
#[async_trait]
pub trait GroupedMemberOps: Send + Sync {
    /// Add `member` under `key`
    async fn add(&self, key: &str, member: &str) -> Result<()>;
    /// Remove `member` from `key`
    async fn remove(&self, key: &str, member: &str) -> Result<()>;
}

/// Adapts [`GroupedMemberOps`] to [`CollectionOps`]
///
/// Creating a key adds all its members, deleting a key removes all of them,
/// and updating removes extras before adding missing members.
pub struct GroupedMembers<'a, G: ?Sized>(pub &'a G);

#[async_trait]
impl<'a, G: GroupedMemberOps + ?Sized> CollectionOps for GroupedMembers<'a, G> {
    type Key = String;
    type Desired = BTreeSet<String>;
    type Actual = BTreeSet<String>;

    fn is_converged(&self, desired: &BTreeSet<String>, actual: &BTreeSet<String>) -> bool {
        desired == actual
    }

    async fn create(&self, key: &String, desired: &BTreeSet<String>) -> Result<()> {
        for member in desired {
            self.0.add(key, member).await?;
        }
        Ok(())
    }

    async fn update(
        &self,
        key: &String,
        desired: &BTreeSet<String>,
        actual: &BTreeSet<String>,
    ) -> Result<()> {
        for member in actual.difference(desired) {
            self.0.remove(key, member).await?;
        }
        for member in desired.difference(actual) {
            self.0.add(key, member).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &String, actual: &BTreeSet<String>) -> Result<()> {
        for member in actual {
            self.0.remove(key, member).await?;
        }
        Ok(())
    }
}

/// Reconcile a key -> member set mapping
pub async fn reconcile_grouped<G: GroupedMemberOps + ?Sized>(
    desired: &BTreeMap<String, BTreeSet<String>>,
    actual: &BTreeMap<String, BTreeSet<String>>,
    protected: &BTreeSet<String>,
    ops: &G,
) -> Result<DeltaSummary> {
    reconcile_collection(desired, actual, protected, &GroupedMembers(ops)).await
}
