//! Cluster API boundary.
//!
//! All reads and writes of managed resources go through the `ClusterOps`
//! trait so reconciliation logic can be unit tested against an in-memory
//! fake. The live implementation wraps `kube::Api`; a NotFound on read is
//! surfaced as `None` (the create branch), never as an error.

use crds::{SentinelAgent, SentinelAgentStatus};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ReconcileError;

/// Bounds shared by every managed resource kind.
pub trait StoredObject:
    Resource<DynamicType = ()>
    + Clone
    + std::fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoredObject for T where
    T: Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// True when the error is the API server saying 404.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

/// Synchronous-per-call view of the cluster.
#[async_trait::async_trait]
pub trait ClusterOps: Send + Sync {
    /// Reads a namespaced object; `None` when it does not exist.
    async fn get<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>;

    /// Creates a namespaced object.
    async fn create<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>;

    /// Replaces a namespaced object.
    async fn update<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>;

    /// Deletes a namespaced object. Deleting an absent object is a no-op.
    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>;

    /// Reads a cluster-scoped object; `None` when it does not exist.
    async fn get_clustered<K>(&self, name: &str) -> Result<Option<K>, ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>;

    /// Creates a cluster-scoped object.
    async fn create_clustered<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>;

    /// Replaces a cluster-scoped object.
    async fn update_clustered<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>;

    /// Deletes a cluster-scoped object. Deleting an absent object is a no-op.
    async fn delete_clustered<K>(&self, name: &str) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>;

    /// Merges `status` onto the intent's status subresource.
    async fn patch_intent_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SentinelAgentStatus,
    ) -> Result<(), ReconcileError>;
}

/// Live cluster access through kube.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wraps a kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterOps for KubeCluster {
    async fn get<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), obj).await?;
        Ok(())
    }

    async fn update<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&obj.name_any(), &PostParams::default(), obj)
            .await?;
        Ok(())
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = NamespaceResourceScope>,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_clustered<K>(&self, name: &str) -> Result<Option<K>, ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let api: Api<K> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_clustered<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let api: Api<K> = Api::all(self.client.clone());
        api.create(&PostParams::default(), obj).await?;
        Ok(())
    }

    async fn update_clustered<K>(&self, obj: &K) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let api: Api<K> = Api::all(self.client.clone());
        api.replace(&obj.name_any(), &PostParams::default(), obj)
            .await?;
        Ok(())
    }

    async fn delete_clustered<K>(&self, name: &str) -> Result<(), ReconcileError>
    where
        K: StoredObject + Resource<Scope = ClusterResourceScope>,
    {
        let api: Api<K> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_intent_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SentinelAgentStatus,
    ) -> Result<(), ReconcileError> {
        let api: Api<SentinelAgent> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
