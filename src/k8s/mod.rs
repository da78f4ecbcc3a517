//! Kubernetes resource application.

mod api;
mod applier;
mod client;
mod error;
mod manifest;

pub use self::api::{group_version_kind, ClusterApi, ResourceScope, RestMapping};
pub use self::applier::{
    AppliedObject, ApplyAction, ApplySummary, Applier, DecodeFailurePolicy,
};
pub use self::client::{create_client, ClientError, KubeClusterApi};
pub use self::error::{ApplyError, ClusterError};
pub use self::manifest::{decode_document, split_documents};

#[cfg(test)]
pub(crate) use self::api::tests::FakeCluster;
