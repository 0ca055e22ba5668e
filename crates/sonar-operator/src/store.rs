//! Kubernetes-backed object store for managed kinds

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use sonar_common::crd::ResourceStatus;
use sonar_common::kube_utils::{
    patch_finalizers, patch_resource_status, with_finalizer, without_finalizer,
};
use sonar_common::{Result, FIELD_MANAGER};
use sonar_engine::{ObjectKey, ObjectStore};

/// Reads objects and writes finalizers and status through the API server
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Store backed by `client`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn add_finalizer(&self, object: &K, marker: &str) -> Result<()> {
        let Some(finalizers) = with_finalizer(object.meta().finalizers.as_deref(), marker) else {
            return Ok(());
        };
        patch_finalizers::<K>(
            &self.client,
            &object.name_any(),
            &object.namespace().unwrap_or_default(),
            &finalizers,
            object.resource_version().as_deref(),
            FIELD_MANAGER,
        )
        .await?;
        debug!(object = %object.name_any(), marker, "Added finalizer");
        Ok(())
    }

    async fn remove_finalizer(&self, object: &K, marker: &str) -> Result<()> {
        let Some(finalizers) = without_finalizer(object.meta().finalizers.as_deref(), marker)
        else {
            return Ok(());
        };
        patch_finalizers::<K>(
            &self.client,
            &object.name_any(),
            &object.namespace().unwrap_or_default(),
            &finalizers,
            object.resource_version().as_deref(),
            FIELD_MANAGER,
        )
        .await?;
        debug!(object = %object.name_any(), marker, "Removed finalizer");
        Ok(())
    }

    async fn update_status(&self, object: &K, status: &ResourceStatus) -> Result<()> {
        patch_resource_status::<K>(
            &self.client,
            &object.name_any(),
            &object.namespace().unwrap_or_default(),
            status,
            FIELD_MANAGER,
        )
        .await?;
        debug!(object = %object.name_any(), phase = %status.phase, "Updated status");
        Ok(())
    }
}
