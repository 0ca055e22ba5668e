//! Convergence engine for SonarQube-managed custom resources
//!
//! Kind-agnostic building blocks the controllers are assembled from:
//!
//! - [`delta`]: three-way diff and ordered apply over keyed collections
//! - [`chain`]: ordered, fail-fast convergence steps
//! - [`finalizer`]: cleanup-marker lifecycle classification
//! - [`backoff`]: requeue scheduling
//! - [`reconciler`]: the reconcile loop tying them together

#![deny(missing_docs)]

pub mod backoff;
pub mod chain;
pub mod delta;
pub mod finalizer;
pub mod reconciler;

pub use backoff::{BackoffPolicy, RequeuePolicy};
pub use chain::{tolerate_not_found, ConvergenceChain, Observed, Step};
pub use delta::{
    compute_delta, reconcile_collection, reconcile_grouped, reconcile_members, CollectionOps,
    DeltaSet, DeltaSummary, GroupedMemberOps, MemberOps,
};
pub use finalizer::Lifecycle;
pub use reconciler::{ConnectionResolver, ObjectKey, ObjectStore, Outcome, Reconciler};
