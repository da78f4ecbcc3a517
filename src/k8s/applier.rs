use std::{fmt, sync::Arc};

use kube::api::DynamicObject;
use serde::Serialize;

use super::{
    group_version_kind,
    manifest::{decode_document, split_documents},
    ApplyError, ClusterApi, ResourceScope,
};

/// What to do with a document that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DecodeFailurePolicy {
    /// Log and continue with the next document.
    #[default]
    Skip,
    /// Fail the whole file.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedObject {
    pub api_version: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub action: ApplyAction,
}

impl fmt::Display for AppliedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub objects: Vec<AppliedObject>,
}

impl ApplySummary {
    fn record(&mut self, object: AppliedObject) {
        match object.action {
            ApplyAction::Created => self.created += 1,
            ApplyAction::Updated => self.updated += 1,
        }
        self.objects.push(object);
    }

    pub fn merge(&mut self, other: ApplySummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.objects.extend(other.objects);
    }
}

/// Create-or-update of arbitrary resources.
#[derive(Debug, Clone)]
pub struct Applier {
    cluster: Arc<dyn ClusterApi>,
    decode_failure_policy: DecodeFailurePolicy,
}

impl Applier {
    pub fn new(cluster: Arc<dyn ClusterApi>, decode_failure_policy: DecodeFailurePolicy) -> Self {
        Self {
            cluster,
            decode_failure_policy,
        }
    }

    /// Get the object by name, create it when absent, otherwise replace it
    /// carrying over the live `resourceVersion`.
    #[tracing::instrument(
        skip_all,
        fields(kind = tracing::field::Empty, name = tracing::field::Empty)
    )]
    pub async fn apply_object(
        &self,
        mut object: DynamicObject,
        default_namespace: &str,
    ) -> Result<AppliedObject, ApplyError> {
        let (api_version, kind) = match &object.types {
            Some(types) => (types.api_version.clone(), types.kind.clone()),
            None => return Err(ApplyError::Decode("missing type metadata".into())),
        };
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| ApplyError::Decode("missing field 'metadata.name'".into()))?;

        tracing::Span::current()
            .record("kind", &kind.as_str())
            .record("name", &name.as_str());

        let mapping = self
            .cluster
            .rest_mapping(&group_version_kind(&api_version, &kind))
            .await
            .map_err(|source| ApplyError::Mapping {
                kind: format!("{api_version} {kind}"),
                source,
            })?;

        let namespace = match mapping.scope {
            ResourceScope::Namespaced => {
                let namespace = object
                    .metadata
                    .namespace
                    .clone()
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or_else(|| default_namespace.to_owned());
                object.metadata.namespace = Some(namespace.clone());
                Some(namespace)
            }
            ResourceScope::Cluster => None,
        };

        let mut applied = AppliedObject {
            api_version,
            kind,
            namespace,
            name,
            action: ApplyAction::Created,
        };
        let resource = applied.to_string();
        let namespace = applied.namespace.as_deref();

        let existing = self
            .cluster
            .get(&mapping, namespace, &applied.name)
            .await
            .map_err(|source| ApplyError::Get {
                resource: resource.clone(),
                source,
            })?;

        match existing {
            None => {
                self.cluster
                    .create(&mapping, namespace, &object)
                    .await
                    .map_err(|source| {
                        if source.is_conflict() {
                            ApplyError::Conflict {
                                resource: resource.clone(),
                                message: source.to_string(),
                            }
                        } else {
                            ApplyError::Create {
                                resource: resource.clone(),
                                source,
                            }
                        }
                    })?;
                tracing::info!(resource = %resource, "created");
            }
            Some(live) => {
                object.metadata.resource_version = live.metadata.resource_version;
                self.cluster
                    .update(&mapping, namespace, &object)
                    .await
                    .map_err(|source| {
                        if source.is_conflict() {
                            ApplyError::Conflict {
                                resource: resource.clone(),
                                message: source.to_string(),
                            }
                        } else {
                            ApplyError::Update {
                                resource: resource.clone(),
                                source,
                            }
                        }
                    })?;
                applied.action = ApplyAction::Updated;
                tracing::info!(resource = %resource, "updated");
            }
        }

        Ok(applied)
    }

    /// Apply every document of a YAML stream in order. The first apply
    /// failure stops the stream; earlier documents stay applied.
    pub async fn apply_documents(
        &self,
        content: &[u8],
        default_namespace: &str,
    ) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();

        for (index, document) in split_documents(content).into_iter().enumerate() {
            let object = match decode_document(document) {
                Ok(Some(object)) => object,
                Ok(None) => continue,
                Err(e) => match self.decode_failure_policy {
                    DecodeFailurePolicy::Skip => {
                        tracing::warn!(document = index, error = %e, "skipping undecodable document");
                        summary.skipped += 1;
                        continue;
                    }
                    DecodeFailurePolicy::Abort => {
                        return Err(ApplyError::Decode(format!("document {index}: {e}")))
                    }
                },
            };

            summary.record(self.apply_object(object, default_namespace).await?);
        }

        Ok(summary)
    }
}
