//! Per-kind convergence chains
//!
//! Each module builds the create and delete chains for one managed kind out
//! of small steps. Steps re-read the remote state they need on every pass and
//! hand collection work to the engine's delta reconciler.
//!
//! The `sonarqube` module is different: it probes connection health and is
//! not finalizer-gated.

pub mod group;
pub mod permission_template;
pub mod project;
pub mod quality_gate;
pub mod quality_profile;
pub mod sonarqube;
pub mod user;

use sonar_client::SonarHandle;
use sonar_common::Result;
use sonar_engine::ConvergenceChain;

/// Chain of steps driven through a resolved SonarQube connection
pub type Chain<K> = ConvergenceChain<K, SonarHandle>;

/// Map the not-found sentinel to `None`
pub(crate) fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether a managed optional field differs remotely
///
/// An unset desired value is left unmanaged and never counts as drift.
pub(crate) fn drifted(desired: Option<&str>, actual: Option<&str>) -> bool {
    desired.is_some() && desired != actual
}
