//! Kubernetes Event recording for the SonarQube controllers.
//!
//! Wraps `kube::runtime::events::Recorder` behind a trait so the reconcile
//! loop can emit Events visible via `kubectl describe` without depending on a
//! live cluster in tests.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate errors.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (see [`reasons`])
    /// * `action` - What action was taken (see [`actions`])
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`
    /// (e.g. "sonar-group-controller").
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Create chain converged
    pub const CREATED: &str = "Created";
    /// A convergence step failed
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    /// Delete chain completed and the finalizer was released
    pub const DELETED: &str = "Deleted";
    /// The referenced SonarQube connection is not ready
    pub const DEPENDENCY_NOT_READY: &str = "DependencyNotReady";
}

/// Well-known event action strings.
pub mod actions {
    /// Running the create chain
    pub const RECONCILE: &str = "Reconcile";
    /// Running the delete chain
    pub const DELETE: &str = "Delete";
    /// Resolving the SonarQube connection
    pub const RESOLVE: &str = "ResolveConnection";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_publisher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopEventPublisher>();
    }

    #[test]
    fn reasons_are_pascal_case() {
        assert_eq!(reasons::CREATED, "Created");
        assert_eq!(reasons::RECONCILE_FAILED, "ReconcileFailed");
        assert_eq!(reasons::DEPENDENCY_NOT_READY, "DependencyNotReady");
    }

    #[tokio::test]
    async fn noop_publisher_does_not_panic() {
        let publisher = NoopEventPublisher;
        publisher
            .publish(
                &ObjectReference::default(),
                EventType::Warning,
                reasons::RECONCILE_FAILED,
                actions::RECONCILE,
                Some("boom".to_string()),
            )
            .await;
    }
}
