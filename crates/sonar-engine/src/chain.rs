//! Ordered, fail-fast convergence steps
//!
//! A chain runs its steps strictly in order against one object. The first
//! failure stops the chain and is returned wrapped with the step's name. Each
//! step re-reads the remote state it needs; nothing carries over from a
//! previous pass except what the stored status holds.

use async_trait::async_trait;
use tracing::debug;

use sonar_common::crd::ResourceStatus;
use sonar_common::{Error, Result};

/// Status fields derived by steps during a pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observed {
    /// Identifier assigned by SonarQube
    pub remote_id: Option<String>,
    /// Fingerprint over the processed desired keys
    pub processed_keys_hash: Option<String>,
}

impl Observed {
    /// Start from the values of the stored status
    pub fn from_status(status: Option<&ResourceStatus>) -> Self {
        status
            .map(|s| Self {
                remote_id: s.remote_id.clone(),
                processed_keys_hash: s.processed_keys_hash.clone(),
            })
            .unwrap_or_default()
    }
}

/// One idempotent unit of convergence work
#[async_trait]
pub trait Step<K, C>: Send + Sync
where
    K: Sync,
    C: Sync,
{
    /// Name used in error context and logs
    fn name(&self) -> &'static str;

    /// Drive one aspect of `object` toward its desired state
    async fn run(&self, client: &C, object: &K, observed: &mut Observed) -> Result<()>;
}

/// Ordered list of steps
pub struct ConvergenceChain<K, C> {
    steps: Vec<Box<dyn Step<K, C>>>,
}

impl<K: Sync, C: Sync> Default for ConvergenceChain<K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Sync, C: Sync> ConvergenceChain<K, C> {
    /// Empty chain
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step
    pub fn then(mut self, step: impl Step<K, C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Names of the steps in execution order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first error
    pub async fn run(&self, client: &C, object: &K, observed: &mut Observed) -> Result<()> {
        for step in &self.steps {
            debug!(step = step.name(), "Running step");
            step.run(client, object, observed)
                .await
                .map_err(|e| Error::step(step.name(), e))?;
        }
        Ok(())
    }
}

/// Treat the not-found sentinel as success
///
/// Used by delete steps: an entity that is already gone needs no cleanup.
pub fn tolerate_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(error = %e, "Entity already absent");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingStep {
        name: &'static str,
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Step<(), ()> for CountingStep {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _client: &(), _object: &(), observed: &mut Observed) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::remote("api/test", "boom"));
            }
            observed.remote_id = Some(self.name.to_string());
            Ok(())
        }
    }

    fn step(name: &'static str, fail: bool) -> (CountingStep, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            CountingStep {
                name,
                runs: runs.clone(),
                fail,
            },
            runs,
        )
    }

    #[tokio::test]
    async fn runs_steps_in_order() {
        let (a, a_runs) = step("ensure", false);
        let (b, b_runs) = step("sync", false);
        let chain = ConvergenceChain::new().then(a).then(b);
        assert_eq!(chain.step_names(), vec!["ensure", "sync"]);

        let mut observed = Observed::default();
        chain.run(&(), &(), &mut observed).await.unwrap();

        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
        // Last writer wins
        assert_eq!(observed.remote_id.as_deref(), Some("sync"));
    }

    #[tokio::test]
    async fn stops_at_first_failure_with_step_context() {
        let (a, _) = step("ensure", true);
        let (b, b_runs) = step("sync", false);
        let chain = ConvergenceChain::new().then(a).then(b);

        let err = chain
            .run(&(), &(), &mut Observed::default())
            .await
            .unwrap_err();

        assert_eq!(b_runs.load(Ordering::SeqCst), 0);
        match err {
            Error::Step { step, .. } => assert_eq!(step, "ensure"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_succeeds() {
        let chain: ConvergenceChain<(), ()> = ConvergenceChain::default();
        assert!(chain.is_empty());
        chain.run(&(), &(), &mut Observed::default()).await.unwrap();
    }

    #[test]
    fn not_found_is_tolerated_other_errors_are_not() {
        assert!(tolerate_not_found(Err(Error::not_found("group", "devs"))).is_ok());
        assert!(tolerate_not_found(Ok(())).is_ok());
        assert!(tolerate_not_found(Err(Error::remote("api/x", "boom"))).is_err());
    }

    #[test]
    fn observed_starts_from_stored_status() {
        let status = ResourceStatus {
            remote_id: Some("AX1".to_string()),
            processed_keys_hash: Some("abcd".to_string()),
            ..Default::default()
        };
        let observed = Observed::from_status(Some(&status));
        assert_eq!(observed.remote_id.as_deref(), Some("AX1"));
        assert_eq!(observed.processed_keys_hash.as_deref(), Some("abcd"));
        assert_eq!(Observed::from_status(None), Observed::default());
    }
}
