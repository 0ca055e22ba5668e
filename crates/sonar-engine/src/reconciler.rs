//! Reconcile loop shared by every managed kind
//!
//! One pass fetches the object, resolves its SonarQube connection, then
//! dispatches on the finalizer lifecycle:
//!
//! - Active: record the cleanup marker if missing, validate, run the create
//!   chain and write the resulting status.
//! - Terminating: run the delete chain, then release the marker. No status is
//!   written after the marker is gone.
//! - Released: nothing to do.
//!
//! Status is written only when it differs from the stored one, so a
//! converged object does not trigger further watch events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, instrument, warn};

use sonar_common::crd::{ManagedResource, ResourcePhase, ResourceStatus};
use sonar_common::events::{actions, reasons, EventPublisher, NoopEventPublisher};
use sonar_common::metrics::{record_status_write, ErrorType, ReconcileTimer};
use sonar_common::{Error, Result, CLEANUP_FINALIZER};

use crate::backoff::RequeuePolicy;
use crate::chain::{ConvergenceChain, Observed};
use crate::finalizer::Lifecycle;

/// Namespace and name of a managed object
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
}

impl ObjectKey {
    /// Key from parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object
    pub fn of<K: Resource>(object: &K) -> Self {
        Self {
            namespace: object.namespace().unwrap_or_default(),
            name: object.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read and write access to managed objects
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch the current object, `None` if it no longer exists
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>>;

    /// Record the cleanup marker on the object
    async fn add_finalizer(&self, object: &K, marker: &str) -> Result<()>;

    /// Remove the cleanup marker from the object
    async fn remove_finalizer(&self, object: &K, marker: &str) -> Result<()>;

    /// Replace the status subresource
    async fn update_status(&self, object: &K, status: &ResourceStatus) -> Result<()>;
}

/// Resolves a connection reference to a ready SonarQube client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionResolver<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// Resolve `reference` in `namespace`
    ///
    /// Fails with a dependency-not-ready error while the connection object is
    /// missing or not yet Ready.
    async fn resolve(&self, namespace: &str, reference: &str) -> Result<C>;
}

/// What the controller should do after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Delay before the next pass, `None` to wait for the next change
    pub requeue_after: Option<Duration>,
}

impl Outcome {
    /// Requeue after `delay`
    pub fn requeue(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }

    /// Wait for the next watch event
    pub fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }

    /// Convert into a controller action
    pub fn into_action(self) -> Action {
        match self.requeue_after {
            Some(delay) => Action::requeue(delay),
            None => Action::await_change(),
        }
    }
}

/// Generic reconcile loop for one managed kind
pub struct Reconciler<K, C>
where
    K: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    store: Arc<dyn ObjectStore<K>>,
    resolver: Arc<dyn ConnectionResolver<C>>,
    create_chain: ConvergenceChain<K, C>,
    delete_chain: ConvergenceChain<K, C>,
    requeue: RequeuePolicy,
    events: Arc<dyn EventPublisher>,
    finalizer: String,
}

impl<K, C> Reconciler<K, C>
where
    K: ManagedResource + Clone + fmt::Debug + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Reconciler with default requeue policy, no events and the standard
    /// cleanup marker
    pub fn new(
        store: Arc<dyn ObjectStore<K>>,
        resolver: Arc<dyn ConnectionResolver<C>>,
        create_chain: ConvergenceChain<K, C>,
        delete_chain: ConvergenceChain<K, C>,
    ) -> Self {
        Self {
            store,
            resolver,
            create_chain,
            delete_chain,
            requeue: RequeuePolicy::default(),
            events: Arc::new(NoopEventPublisher),
            finalizer: CLEANUP_FINALIZER.to_string(),
        }
    }

    /// Set the requeue policy
    pub fn with_requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    /// Set the event publisher
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Set the cleanup marker
    pub fn with_finalizer(mut self, marker: impl Into<String>) -> Self {
        self.finalizer = marker.into();
        self
    }

    /// Requeue policy in effect
    pub fn requeue_policy(&self) -> &RequeuePolicy {
        &self.requeue
    }

    /// Run one pass for the object at `key`
    ///
    /// Step failures are absorbed into status and a requeue delay. An `Err`
    /// means the pass could not record its outcome (API error, write
    /// conflict) and the caller should retry.
    #[instrument(skip(self), fields(kind = K::KIND_LABEL, object = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome> {
        let timer = ReconcileTimer::start(K::KIND_LABEL);
        match self.reconcile_inner(key).await {
            Ok(Pass::Converged(outcome)) => {
                timer.success();
                Ok(outcome)
            }
            Ok(Pass::Waiting(outcome)) => {
                timer.dependency_not_ready();
                Ok(outcome)
            }
            Ok(Pass::Failed(outcome, error_type)) => {
                timer.error(error_type);
                Ok(outcome)
            }
            Err(e) => {
                timer.error(ErrorType::of(&e));
                Err(e)
            }
        }
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> Result<Pass> {
        let Some(object) = self.store.get(key).await? else {
            debug!("Object no longer exists");
            return Ok(Pass::Converged(Outcome::done()));
        };

        let lifecycle = Lifecycle::of(&object, &self.finalizer);
        if lifecycle == Lifecycle::Released {
            debug!("Cleanup already released");
            return Ok(Pass::Converged(Outcome::done()));
        }

        let client = match self
            .resolver
            .resolve(&key.namespace, object.sonar_ref())
            .await
        {
            Ok(client) => client,
            Err(e) if e.is_dependency_not_ready() => {
                return self.wait_for_connection(&object, e).await;
            }
            Err(e) => return Err(e),
        };

        match lifecycle {
            Lifecycle::Active { has_marker } => {
                if !has_marker {
                    self.store.add_finalizer(&object, &self.finalizer).await?;
                    debug!(finalizer = %self.finalizer, "Recorded cleanup marker");
                }
                self.converge(&client, &object).await
            }
            Lifecycle::Terminating => self.clean_up(&client, &object).await,
            Lifecycle::Released => Ok(Pass::Converged(Outcome::done())),
        }
    }

    async fn converge(&self, client: &C, object: &K) -> Result<Pass> {
        let previous = object.resource_status().cloned().unwrap_or_default();
        let mut observed = Observed::from_status(Some(&previous));

        let result = match object.validate() {
            Ok(()) => self.create_chain.run(client, object, &mut observed).await,
            Err(e) => Err(Error::step("validate", e)),
        };

        match result {
            Ok(()) => {
                let status = ResourceStatus {
                    phase: ResourcePhase::Created,
                    message: None,
                    failure_count: 0,
                    remote_id: observed.remote_id,
                    processed_keys_hash: observed.processed_keys_hash,
                    observed_generation: object.meta().generation,
                };
                self.write_status(object, &previous, &status).await?;
                if !previous.is_created() {
                    info!("Converged");
                    self.publish(object, EventType::Normal, reasons::CREATED, actions::RECONCILE, None)
                        .await;
                }
                Ok(Pass::Converged(Outcome::requeue(self.requeue.success_interval)))
            }
            Err(e) => self.record_failure(object, &previous, observed, e, actions::RECONCILE).await,
        }
    }

    async fn clean_up(&self, client: &C, object: &K) -> Result<Pass> {
        let previous = object.resource_status().cloned().unwrap_or_default();
        let mut observed = Observed::from_status(Some(&previous));

        match self.delete_chain.run(client, object, &mut observed).await {
            Ok(()) => {
                self.store
                    .remove_finalizer(object, &self.finalizer)
                    .await?;
                info!("Cleanup complete, released");
                self.publish(object, EventType::Normal, reasons::DELETED, actions::DELETE, None)
                    .await;
                Ok(Pass::Converged(Outcome::done()))
            }
            Err(e) => self.record_failure(object, &previous, observed, e, actions::DELETE).await,
        }
    }

    async fn record_failure(
        &self,
        object: &K,
        previous: &ResourceStatus,
        observed: Observed,
        error: Error,
        action: &str,
    ) -> Result<Pass> {
        warn!(error = %error, "Pass failed");
        let backoff = self.requeue.backoff;
        let delay = backoff.delay(previous.failure_count);
        let status = ResourceStatus {
            phase: ResourcePhase::Error,
            message: Some(error.to_string()),
            failure_count: backoff.next_failure_count(previous.failure_count),
            remote_id: observed.remote_id,
            processed_keys_hash: observed.processed_keys_hash,
            observed_generation: previous.observed_generation,
        };
        self.write_status(object, previous, &status).await?;
        self.publish(
            object,
            EventType::Warning,
            reasons::RECONCILE_FAILED,
            action,
            Some(error.to_string()),
        )
        .await;
        Ok(Pass::Failed(Outcome::requeue(delay), ErrorType::of(&error)))
    }

    async fn wait_for_connection(&self, object: &K, error: Error) -> Result<Pass> {
        info!(reference = object.sonar_ref(), error = %error, "Connection not ready");
        let previous = object.resource_status().cloned().unwrap_or_default();
        let status = ResourceStatus {
            phase: ResourcePhase::Error,
            message: Some(error.to_string()),
            ..previous.clone()
        };
        self.write_status(object, &previous, &status).await?;
        self.publish(
            object,
            EventType::Warning,
            reasons::DEPENDENCY_NOT_READY,
            actions::RESOLVE,
            Some(error.to_string()),
        )
        .await;
        Ok(Pass::Waiting(Outcome::requeue(self.requeue.dependency_interval)))
    }

    async fn write_status(
        &self,
        object: &K,
        previous: &ResourceStatus,
        status: &ResourceStatus,
    ) -> Result<()> {
        let changed = object.resource_status().is_none() || previous != status;
        record_status_write(K::KIND_LABEL, changed);
        if !changed {
            debug!("Status unchanged, skipping update");
            return Ok(());
        }
        self.store.update_status(object, status).await
    }

    async fn publish(
        &self,
        object: &K,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let reference = object.object_ref(&());
        self.events
            .publish(&reference, type_, reason, action, note)
            .await;
    }
}

/// Pass result before metrics are recorded
enum Pass {
    Converged(Outcome),
    Waiting(Outcome),
    Failed(Outcome, ErrorType),
}
