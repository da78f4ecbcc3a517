use std::{any::Any, sync::Arc, time::Duration};

use async_trait::async_trait;
use kube::{
    api::{Api, DynamicObject, GroupVersionKind, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    discovery::{Discovery, Scope},
    Client,
};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;

use super::{ClusterApi, ClusterError, ResourceScope, RestMapping};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot read kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("cannot load in-cluster configuration: {0}")]
    InCluster(String),

    #[error("cannot create Kubernetes client: {0}")]
    Client(String),
}

/// Build a Kubernetes client from an explicit kubeconfig, the in-cluster
/// service account, or the inferred local configuration, in that order.
pub async fn create_client(config: &Config) -> Result<Client, ClientError> {
    let mut kube_config = if let Some(path) = config.kubeconfig() {
        let kubeconfig =
            Kubeconfig::read_from(path).map_err(|e| ClientError::Kubeconfig(e.to_string()))?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClientError::Kubeconfig(e.to_string()))?
    } else if config.in_cluster() {
        kube::Config::incluster().map_err(|e| ClientError::InCluster(e.to_string()))?
    } else {
        kube::Config::infer()
            .await
            .map_err(|e| ClientError::Kubeconfig(e.to_string()))?
    };

    kube_config.connect_timeout = Some(CONNECT_TIMEOUT);
    kube_config.read_timeout = Some(READ_TIMEOUT);

    tracing::info!(cluster_url = %kube_config.cluster_url, "Kubernetes client ready");
    Client::try_from(kube_config).map_err(|e| ClientError::Client(e.to_string()))
}

/// [`ClusterApi`] over a live API server.
///
/// Discovery runs once, on the first mapping request, and is reused until a
/// kind cannot be resolved.
pub struct KubeClusterApi {
    client: Client,
    discovery: RwLock<Option<Arc<Discovery>>>,
}

impl std::fmt::Debug for KubeClusterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterApi").finish_non_exhaustive()
    }
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovery: RwLock::new(None),
        }
    }

    async fn discovery(&self) -> Result<Arc<Discovery>, ClusterError> {
        if let Some(discovery) = self.discovery.read().await.as_ref() {
            return Ok(discovery.clone());
        }

        let mut cached = self.discovery.write().await;
        if let Some(discovery) = cached.as_ref() {
            return Ok(discovery.clone());
        }

        tracing::debug!("running API discovery");
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| ClusterError::Discovery(e.to_string()))?;
        let discovery = Arc::new(discovery);
        *cached = Some(discovery.clone());

        Ok(discovery)
    }

    /// Drop the discovery snapshot so the next mapping request refreshes it.
    pub async fn invalidate(&self) {
        self.discovery.write().await.take();
    }

    fn api(&self, mapping: &RestMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &mapping.resource),
            None => Api::all_with(self.client.clone(), &mapping.resource),
        }
    }
}

fn object_name(object: &DynamicObject) -> Result<&str, ClusterError> {
    object
        .metadata
        .name
        .as_deref()
        .ok_or(ClusterError::MissingName)
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn rest_mapping(&self, gvk: &GroupVersionKind) -> Result<RestMapping, ClusterError> {
        let discovery = self.discovery().await?;

        match discovery.resolve_gvk(gvk) {
            Some((resource, capabilities)) => Ok(RestMapping {
                resource,
                scope: match capabilities.scope {
                    Scope::Namespaced => ResourceScope::Namespaced,
                    Scope::Cluster => ResourceScope::Cluster,
                },
            }),
            None => {
                self.invalidate().await;
                let api_version = if gvk.group.is_empty() {
                    gvk.version.clone()
                } else {
                    format!("{}/{}", gvk.group, gvk.version)
                };
                Err(ClusterError::Unmappable(format!("{api_version} {}", gvk.kind)))
            }
        }
    }

    async fn get(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, ClusterError> {
        Ok(self.api(mapping, namespace).get_opt(name).await?)
    }

    async fn create(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        Ok(self
            .api(mapping, namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn update(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let name = object_name(object)?;
        Ok(self
            .api(mapping, namespace)
            .replace(name, &PostParams::default(), object)
            .await?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
