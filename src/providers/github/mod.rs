mod apiclient;
mod models;

#[cfg(test)]
mod tests;

use std::any::Any;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::{crypto::is_valid_signature, git::RepositoryPath};

use super::{
    collect_modified_files, Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest,
};

use apiclient::Client;

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";
const EVENT_HEADER: &str = "X-GitHub-Event";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug)]
pub struct GitHubProvider {
    client: Client,
}

impl GitHubProvider {
    pub fn new(api_url: Option<&str>, token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::new(api_url, token)?,
        })
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
        if let Some(secret) = secret {
            let signature = request
                .header(SIGNATURE_HEADER)
                .ok_or(ProviderError::MissingSignature(SIGNATURE_HEADER))?
                .strip_prefix(SIGNATURE_PREFIX)
                .ok_or(ProviderError::InvalidSignature(SIGNATURE_HEADER))?;

            if !is_valid_signature(signature, request.body(), secret) {
                return Err(ProviderError::InvalidSignature(SIGNATURE_HEADER));
            }
        }

        let is_form = request
            .header("Content-Type")
            .map(|v| v.starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false);

        if is_form {
            // Form deliveries wrap the JSON document in a `payload` field
            return url::form_urlencoded::parse(request.body())
                .find(|(key, _)| key == "payload")
                .map(|(_, value)| Bytes::from(value.into_owned()))
                .ok_or_else(|| {
                    ProviderError::MalformedPayloadField("payload".into(), "missing field".into())
                });
        }

        Ok(request.body().clone())
    }

    #[tracing::instrument(skip_all)]
    fn parse_push_event(
        &self,
        request: &WebhookRequest,
        payload: &[u8],
    ) -> Result<PushEvent, ProviderError> {
        let event = request
            .header(EVENT_HEADER)
            .ok_or(ProviderError::MissingEventHeader(EVENT_HEADER))?;

        match event {
            "push" => {}
            "ping" => {
                let ping: models::PingEvent =
                    serde_json::from_slice(payload).map_err(ProviderError::MalformedPayload)?;
                tracing::info!(
                    zen = %ping.zen,
                    hook_id = ?ping.hook_id,
                    repository = ?ping.repository.map(|r| r.full_name),
                    "ping received"
                );
                return Err(ProviderError::NotAPushEvent(event.into()));
            }
            other => return Err(ProviderError::NotAPushEvent(other.into())),
        }

        let push: models::PushEvent =
            serde_json::from_slice(payload).map_err(ProviderError::MalformedPayload)?;

        if push.deleted {
            return Err(ProviderError::NotAPushEvent(format!(
                "deletion of {}",
                push.reference
            )));
        }

        let repository = RepositoryPath::new(&push.repository.full_name).map_err(|e| {
            ProviderError::MalformedPayloadField("repository.full_name".into(), e.to_string())
        })?;

        Ok(PushEvent {
            owner: repository.owner().into(),
            repo: repository.name().into(),
            reference: push.reference,
            after: push.after,
            modified_files: collect_modified_files(&push.commits),
        })
    }

    async fn download_file(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        self.client
            .download_file(owner, repo, reference, path)
            .await
    }

    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.client.list_files(owner, repo, reference).await
    }

    async fn ensure_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.client
            .try_register_webhook(owner, repo, url, secret)
            .await
            .map(|_| ())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
