//! Explicit registry binding each kind to its chains
//!
//! Built once at startup and consumed into one controller future per kind.
//! There is no global registration; what runs is exactly what was
//! registered on the builder.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use sonar_client::SonarHandle;
use sonar_common::crd::{
    ManagedResource, SonarGroup, SonarPermissionTemplate, SonarProject, SonarQualityGate,
    SonarQualityProfile, SonarQube, SonarUser,
};
use sonar_common::events::KubeEventPublisher;
use sonar_common::Error;
use sonar_engine::{ObjectKey, Outcome, Reconciler, RequeuePolicy};

use crate::connection::KubeConnectionResolver;
use crate::controller::{
    group, permission_template, project, quality_gate, quality_profile, sonarqube, user, Chain,
};
use crate::store::KubeStore;

/// Watcher timeout (seconds), below the client read timeout so idle watches
/// are closed by the API server first
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A running controller
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Builder collecting one controller per registered kind
pub struct ControllerRegistry {
    client: Client,
    resolver: Arc<KubeConnectionResolver>,
    requeue: RequeuePolicy,
    namespace: Option<String>,
    kinds: Vec<&'static str>,
    controllers: Vec<ControllerFuture>,
}

impl ControllerRegistry {
    /// Start an empty registry
    pub fn builder(client: Client, resolver: Arc<KubeConnectionResolver>) -> Self {
        Self {
            client,
            resolver,
            requeue: RequeuePolicy::default(),
            namespace: None,
            kinds: Vec::new(),
            controllers: Vec::new(),
        }
    }

    /// Requeue policy for kinds registered after this call
    pub fn requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    /// Restrict watches to one namespace (`None` watches all)
    pub fn watch_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Register the connection health controller
    pub fn register_connections(mut self) -> Self {
        let ctx = Arc::new(sonarqube::ConnectionContext {
            client: self.client.clone(),
            resolver: self.resolver.clone(),
            requeue: self.requeue,
        });
        let controller = Controller::new(
            self.api::<SonarQube>(),
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(sonarqube::reconcile, sonarqube::error_policy, ctx)
        .for_each(log_reconcile_result("sonarqube"));

        self.kinds.push("sonarqube");
        self.controllers.push(Box::pin(controller));
        self
    }

    /// Register a managed kind with its create and delete chains
    pub fn register<K>(mut self, create: Chain<K>, delete: Chain<K>) -> Self
    where
        K: ManagedResource
            + Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug
            + Send
            + Sync
            + 'static,
    {
        let events = Arc::new(KubeEventPublisher::new(
            self.client.clone(),
            &format!("sonar-{}-controller", K::KIND_LABEL.replace('_', "-")),
        ));
        let reconciler = Reconciler::new(
            Arc::new(KubeStore::<K>::new(self.client.clone())),
            self.resolver.clone(),
            create,
            delete,
        )
        .with_requeue(self.requeue)
        .with_events(events);

        let controller = Controller::new(
            self.api::<K>(),
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(reconcile_managed::<K>, error_policy_managed::<K>, Arc::new(reconciler))
        .for_each(log_reconcile_result(K::KIND_LABEL));

        self.kinds.push(K::KIND_LABEL);
        self.controllers.push(Box::pin(controller));
        self
    }

    /// Register the connection controller and every managed kind
    pub fn with_all_kinds(self) -> Self {
        self.register_connections()
            .register(group::create_chain(), group::delete_chain())
            .register(user::create_chain(), user::delete_chain())
            .register(
                permission_template::create_chain(),
                permission_template::delete_chain(),
            )
            .register(quality_gate::create_chain(), quality_gate::delete_chain())
            .register(quality_profile::create_chain(), quality_profile::delete_chain())
            .register(project::create_chain(), project::delete_chain())
    }

    /// Labels of the registered kinds, in registration order
    pub fn kinds(&self) -> &[&'static str] {
        &self.kinds
    }

    /// Consume the registry into its controller futures
    pub fn build(self) -> Vec<ControllerFuture> {
        for kind in &self.kinds {
            info!(kind, "- controller registered");
        }
        self.controllers
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

async fn reconcile_managed<K>(
    object: Arc<K>,
    reconciler: Arc<Reconciler<K, SonarHandle>>,
) -> Result<Action, Error>
where
    K: ManagedResource + Clone + Debug + Send + Sync + 'static,
{
    reconciler
        .reconcile(&ObjectKey::of(object.as_ref()))
        .await
        .map(Outcome::into_action)
}

fn error_policy_managed<K>(
    object: Arc<K>,
    error: &Error,
    reconciler: Arc<Reconciler<K, SonarHandle>>,
) -> Action
where
    K: ManagedResource + Clone + Debug + Send + Sync + 'static,
{
    if error.is_conflict() {
        debug!(
            kind = K::KIND_LABEL,
            object = %object.name_any(),
            "Object changed during reconcile, retrying from fresh state"
        );
    } else {
        warn!(
            kind = K::KIND_LABEL,
            object = %object.name_any(),
            error = %error,
            "Reconcile failed before status could be recorded"
        );
    }
    Action::requeue(failure_delay(error, reconciler.requeue_policy()))
}

/// Delay before retrying a pass that failed outside the status path
///
/// Write conflicts retry after the dependency interval, anything else after
/// the first backoff step.
fn failure_delay(error: &Error, policy: &RequeuePolicy) -> Duration {
    if error.is_conflict() {
        policy.dependency_interval
    } else {
        policy.backoff.delay(0)
    }
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: Debug, E: Debug>(
    kind: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, kind, "Reconciliation completed"),
            Err(e) => tracing::error!(error = ?e, kind, "Reconciliation error"),
        }
        std::future::ready(())
    }
}

/// CRDs served by the operator
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![
        SonarQube::crd(),
        SonarGroup::crd(),
        SonarUser::crd(),
        SonarPermissionTemplate::crd(),
        SonarQualityGate::crd(),
        SonarQualityProfile::crd(),
        SonarProject::crd(),
    ]
}
