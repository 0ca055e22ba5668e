//! Finalizer-gated lifecycle of a managed object

use kube::{Resource, ResourceExt};

/// Where an object stands with respect to its cleanup obligation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not being deleted; the create chain applies
    Active {
        /// Whether the cleanup marker is already recorded
        has_marker: bool,
    },
    /// Being deleted with the marker present; the delete chain applies
    Terminating,
    /// Being deleted and the marker is gone; nothing left to do
    Released,
}

impl Lifecycle {
    /// Classify `object` against the cleanup `marker`
    pub fn of<K: Resource>(object: &K, marker: &str) -> Self {
        let has_marker = object.finalizers().iter().any(|f| f == marker);
        match (object.meta().deletion_timestamp.is_some(), has_marker) {
            (false, has_marker) => Lifecycle::Active { has_marker },
            (true, true) => Lifecycle::Terminating,
            (true, false) => Lifecycle::Released,
        }
    }
}
