use std::any::Any;

use async_trait::async_trait;
use kube::{
    api::{DynamicObject, GroupVersionKind},
    discovery::ApiResource,
};

use super::ClusterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    Namespaced,
    Cluster,
}

/// Where a kind lives on the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestMapping {
    pub resource: ApiResource,
    pub scope: ResourceScope,
}

/// Dynamic access to cluster resources.
///
/// `namespace` is `None` for cluster-scoped resources.
#[async_trait]
pub trait ClusterApi: std::fmt::Debug + Send + Sync {
    async fn rest_mapping(&self, gvk: &GroupVersionKind) -> Result<RestMapping, ClusterError>;

    /// Fetch a resource, `None` when it does not exist.
    async fn get(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, ClusterError>;

    async fn create(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    async fn update(
        &self,
        mapping: &RestMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    fn as_any(&self) -> &dyn Any;
}

/// Split an `apiVersion` into group and version. Core resources have an empty
/// group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_owned(), version.to_owned()),
        None => (String::new(), api_version.to_owned()),
    }
}

pub fn group_version_kind(api_version: &str, kind: &str) -> GroupVersionKind {
    let (group, version) = parse_api_version(api_version);
    GroupVersionKind {
        group,
        version,
        kind: kind.to_owned(),
    }
}
