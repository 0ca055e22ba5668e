//! Kubernetes helpers shared by the object store, the connection resolver and
//! the operator binary.

use std::collections::BTreeSet;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Config};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::Error;

/// Default connect timeout for the Kubernetes client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for the Kubernetes client
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a Kubernetes client from the in-cluster config or local kubeconfig
pub async fn create_client() -> Result<Client, Error> {
    let mut config = Config::infer().await.map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
    })?;
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Patch the status sub-resource of a namespaced resource.
///
/// Serializes `status` into `{ "status": <status> }` and applies it via
/// merge-patch. Returns `kube::Error` so a 409 stays classifiable.
pub async fn patch_resource_status<T>(
    client: &Client,
    name: &str,
    namespace: &str,
    status: &impl serde::Serialize,
    field_manager: &str,
) -> std::result::Result<(), kube::Error>
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(field_manager), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Finalizer list with `marker` appended, or `None` if already present
pub fn with_finalizer(existing: Option<&[String]>, marker: &str) -> Option<Vec<String>> {
    let mut finalizers = existing.map(<[String]>::to_vec).unwrap_or_default();
    if finalizers.iter().any(|f| f == marker) {
        return None;
    }
    finalizers.push(marker.to_string());
    Some(finalizers)
}

/// Finalizer list with `marker` removed, or `None` if it was absent
pub fn without_finalizer(existing: Option<&[String]>, marker: &str) -> Option<Vec<String>> {
    let finalizers = existing.unwrap_or_default();
    if !finalizers.iter().any(|f| f == marker) {
        return None;
    }
    Some(
        finalizers
            .iter()
            .filter(|f| *f != marker)
            .cloned()
            .collect(),
    )
}

/// Replace `metadata.finalizers` of a namespaced resource via merge-patch
///
/// With `resource_version` set the API server rejects the patch with 409 if
/// the object changed since it was read.
pub async fn patch_finalizers<T>(
    client: &Client,
    name: &str,
    namespace: &str,
    finalizers: &[String],
    resource_version: Option<&str>,
    field_manager: &str,
) -> std::result::Result<(), kube::Error>
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let mut metadata = serde_json::json!({ "finalizers": finalizers });
    if let Some(version) = resource_version {
        metadata["resourceVersion"] = serde_json::Value::from(version);
    }
    let patch = serde_json::json!({ "metadata": metadata });
    api.patch(name, &PatchParams::apply(field_manager), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Read one key of a Secret as UTF-8
///
/// Returns `Ok(None)` when the Secret or the key does not exist.
pub async fn get_secret_value(
    client: &Client,
    name: &str,
    namespace: &str,
    key: &str,
) -> Result<Option<String>, Error> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let Some(secret) = secrets.get_opt(name).await? else {
        return Ok(None);
    };

    let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) else {
        return Ok(None);
    };

    let value = String::from_utf8(bytes.0.clone()).map_err(|e| {
        Error::serialization_for_kind(
            "Secret",
            format!("secret {}/{} key {} is not UTF-8: {}", namespace, name, key, e),
        )
    })?;
    Ok(Some(value.trim().to_string()))
}

/// Install or update a CRD via server-side apply
pub async fn apply_crd(
    client: &Client,
    crd: &CustomResourceDefinition,
    field_manager: &str,
) -> Result<(), Error> {
    let name = crd.metadata.name.as_deref().ok_or_else(|| {
        Error::internal_with_context("apply_crd", "CRD is missing metadata.name")
    })?;
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    api.patch(name, &PatchParams::apply(field_manager).force(), &Patch::Apply(crd))
        .await?;
    info!(crd = %name, "Applied CRD");
    Ok(())
}

/// Fingerprint over a set of keys, as a 16-char hex digest
///
/// Keys are de-duplicated and sorted first, so the value only changes when the
/// set of keys changes. Uses truncated SHA-256 so the value is stable across
/// toolchain versions and safe to persist in status.
pub fn keys_fingerprint<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    let ordered: BTreeSet<&str> = keys.into_iter().collect();
    let mut hasher = Sha256::new();
    for key in &ordered {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    debug!(keys = ordered.len(), "Computed keys fingerprint");
    hex::encode(&digest[..8])
}
