mod models;

use std::any::Any;

use async_trait::async_trait;
use axum::body::Bytes;
use url::Url;

use crate::{crypto::is_valid_signature, git::RepositoryPath};

use super::{
    api::{self, api_url, file_segments},
    collect_modified_files, Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://gitea.com";

const SIGNATURE_HEADER: &str = "X-Gitea-Signature";
const EVENT_HEADER: &str = "X-Gitea-Event";
const PAGE_SIZE: &str = "1000";

#[derive(Debug)]
pub struct GiteaProvider {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl GiteaProvider {
    pub fn new(base_url: Option<&str>, token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: api::parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?,
            token,
            http: api::create_client()?,
        })
    }

    fn repo_url<'a, I>(&self, owner: &'a str, repo: &'a str, segments: I) -> Result<Url, ProviderError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        api_url(
            &self.base_url,
            ["api", "v1", "repos", owner, repo].into_iter().chain(segments),
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl Provider for GiteaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gitea
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
        if let Some(secret) = secret {
            let signature = request
                .header(SIGNATURE_HEADER)
                .ok_or(ProviderError::MissingSignature(SIGNATURE_HEADER))?;

            if !is_valid_signature(signature, request.body(), secret) {
                return Err(ProviderError::InvalidSignature(SIGNATURE_HEADER));
            }
        }

        Ok(request.body().clone())
    }

    #[tracing::instrument(skip_all)]
    fn parse_push_event(
        &self,
        request: &WebhookRequest,
        payload: &[u8],
    ) -> Result<PushEvent, ProviderError> {
        if let Some(event) = request.header(EVENT_HEADER) {
            if event != "push" {
                return Err(ProviderError::NotAPushEvent(event.into()));
            }
        }

        let push: models::PushEvent =
            serde_json::from_slice(payload).map_err(ProviderError::MalformedPayload)?;

        let repository = push.repository;
        let (owner, repo) = match (repository.full_name.as_deref(), repository.owner) {
            (Some(full_name), _) => {
                let path = RepositoryPath::new(full_name).map_err(|e| {
                    ProviderError::MalformedPayloadField("repository.full_name".into(), e.to_string())
                })?;
                (path.owner().to_owned(), path.name().to_owned())
            }
            (None, Some(models::User { username: Some(owner), .. }))
            | (None, Some(models::User { login: Some(owner), .. })) => (owner, repository.name),
            (None, _) => {
                return Err(ProviderError::MalformedPayloadField(
                    "repository.owner".into(),
                    "missing field".into(),
                ))
            }
        };

        Ok(PushEvent {
            owner,
            repo,
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
        let mut url = self.repo_url(
            owner,
            repo,
            std::iter::once("raw").chain(file_segments(path)),
        )?;
        url.query_pairs_mut().append_pair("ref", reference);

        api::fetch_file(self.authorize(self.http.get(url)), path, reference).await
    }

    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut files = Vec::new();
        let mut page = 1u32;

        loop {
            let mut url = self.repo_url(owner, repo, ["git", "trees", reference])?;
            url.query_pairs_mut()
                .append_pair("recursive", "true")
                .append_pair("per_page", PAGE_SIZE)
                .append_pair("page", &page.to_string());

            let tree: models::Tree = api::fetch_json(self.authorize(self.http.get(url))).await?;
            files.extend(
                tree.tree
                    .into_iter()
                    .filter(|e| e.entry_type == "blob")
                    .map(|e| e.path),
            );

            if !tree.truncated {
                break;
            }
            page += 1;
        }

        Ok(files)
    }

    async fn ensure_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: Option<&str>,
    ) -> Result<(), ProviderError> {
        let endpoint = self.repo_url(owner, repo, ["hooks"])?;
        let hooks: Vec<models::Hook> =
            api::fetch_json(self.authorize(self.http.get(endpoint.clone()))).await?;

        if let Some(hook) = hooks
            .into_iter()
            .find(|h| h.config.url.as_deref() == Some(url))
        {
            tracing::warn!(id = hook.id, owner = owner, repo = repo, url = url, "webhook already registered");
            return Ok(());
        }

        let hook: models::Hook = api::fetch_json(self.authorize(self.http.post(endpoint)).json(
            &models::NewHook {
                hook_type: "gitea",
                config: models::NewHookConfig {
                    url,
                    content_type: "json",
                    secret,
                },
                events: &["push"],
                active: true,
            },
        ))
        .await?;

        tracing::info!(id = hook.id, owner = owner, repo = repo, url = url, "new webhook installed");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
