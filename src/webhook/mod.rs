//! Webhook delivery pipeline.
//!
//! A delivery is validated, normalized into a push event, narrowed down to the
//! manifests it touched, and each manifest is downloaded at the pushed commit
//! and applied. Everything happens inside the request; the response tells the
//! provider whether a redelivery is worthwhile.

mod registration;
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use axum::{
    body::Bytes,
    extract::Extension,
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::{
    config::Config,
    error::ErrorCode,
    k8s::{AppliedObject, ApplySummary},
    providers::{Provider, ProviderError, PushEvent, WebhookRequest, RESYNC_MARKER},
    service::ServiceHandler,
};

pub use self::registration::{register_webhook, register_webhook_on_startup, RegistrationError};

const MANIFEST_EXTENSIONS: [&str; 2] = [".yaml", ".yml"];

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Ignored {
        reason: String,
    },
    NoChanges,
    Applied {
        files: Vec<String>,
        created: usize,
        updated: usize,
        skipped: usize,
        resources: Vec<AppliedObject>,
    },
}

/// Files selected for application.
#[derive(Debug, PartialEq, Eq)]
pub enum ManifestSelection {
    /// Every manifest of the repository.
    Resync,
    Files(BTreeSet<String>),
}

pub fn is_manifest(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    MANIFEST_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Keep YAML files only, unless a resync was requested.
pub fn filter_manifest_files<'a, I>(files: I) -> ManifestSelection
where
    I: IntoIterator<Item = &'a String>,
{
    let mut manifests = BTreeSet::new();
    for file in files {
        if file == RESYNC_MARKER {
            return ManifestSelection::Resync;
        }
        if is_manifest(file) {
            manifests.insert(file.clone());
        }
    }

    ManifestSelection::Files(manifests)
}

#[tracing::instrument(skip_all)]
pub async fn webhook(
    Extension(config): Extension<Config>,
    Extension(services): Extension<ServiceHandler>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, ErrorCode> {
    let request = WebhookRequest::new(headers, body);
    process_delivery(&config, &services, &request)
        .await
        .map(Json)
}

pub async fn process_delivery(
    config: &Config,
    services: &ServiceHandler,
    request: &WebhookRequest,
) -> Result<WebhookOutcome, ErrorCode> {
    let provider = services.provider();

    let payload = provider
        .validate(request, config.webhook_secret())
        .map_err(|e| {
            tracing::warn!(error = %e, "delivery rejected");
            ErrorCode::from(e)
        })?;

    let event = match provider.parse_push_event(request, &payload) {
        Ok(event) => event,
        Err(ProviderError::NotAPushEvent(reason)) => {
            tracing::info!(reason = %reason, "ignoring delivery");
            return Ok(WebhookOutcome::Ignored { reason });
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        owner = %event.owner,
        repo = %event.repo,
        reference = %event.reference,
        after = %event.after,
        files = event.modified_files.len(),
        resync = event.requests_resync(),
        "push received"
    );

    let files = resolve_manifest_files(provider, &event).await?;
    if files.is_empty() {
        tracing::info!("no manifest changed");
        return Ok(WebhookOutcome::NoChanges);
    }

    let summary = apply_manifest_files(config, services, &event, &files).await?;

    Ok(WebhookOutcome::Applied {
        files: files.into_iter().collect(),
        created: summary.created,
        updated: summary.updated,
        skipped: summary.skipped,
        resources: summary.objects,
    })
}

async fn resolve_manifest_files(
    provider: &dyn Provider,
    event: &PushEvent,
) -> Result<BTreeSet<String>, ErrorCode> {
    match filter_manifest_files(&event.modified_files) {
        ManifestSelection::Files(files) => Ok(files),
        ManifestSelection::Resync => {
            tracing::info!(after = %event.after, "resync requested, listing repository");
            let listed = provider
                .list_files(&event.owner, &event.repo, &event.after)
                .await
                .map_err(|e| ErrorCode::ListFilesFailure(e.to_string()))?;

            Ok(listed.into_iter().filter(|f| is_manifest(f)).collect())
        }
    }
}

#[tracing::instrument(skip_all, fields(after = %event.after))]
async fn apply_manifest_files(
    config: &Config,
    services: &ServiceHandler,
    event: &PushEvent,
    files: &BTreeSet<String>,
) -> Result<ApplySummary, ErrorCode> {
    let mut summary = ApplySummary::default();

    for path in files {
        let content = services
            .provider()
            .download_file(&event.owner, &event.repo, &event.after, path)
            .await
            .map_err(|e| {
                tracing::error!(path = %path, error = %e, "download failed");
                ErrorCode::DownloadFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;

        let applied = services
            .applier()
            .apply_documents(&content, config.namespace())
            .await
            .map_err(|e| {
                tracing::error!(path = %path, error = %e, "apply failed");
                ErrorCode::from_apply_error(path.as_str(), e)
            })?;

        tracing::info!(
            path = %path,
            created = applied.created,
            updated = applied.updated,
            skipped = applied.skipped,
            "manifest applied"
        );
        summary.merge(applied);
    }

    Ok(summary)
}
