//! GitLab provider.
//!
//! Projects live under nested groups, so the owner is the whole namespace path
//! and API calls address projects by their URL-encoded `namespace/name`.

mod models;

use std::any::Any;

use async_trait::async_trait;
use axum::body::Bytes;
use url::Url;

use crate::git::RepositoryPath;

use super::{
    api::{self, api_url},
    collect_modified_files, Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";

const TOKEN_HEADER: &str = "X-Gitlab-Token";
const EVENT_HEADER: &str = "X-Gitlab-Event";
const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const NEXT_PAGE_HEADER: &str = "X-Next-Page";
const PAGE_SIZE: &str = "100";

#[derive(Debug)]
pub struct GitLabProvider {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl GitLabProvider {
    pub fn new(base_url: Option<&str>, token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: api::parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?,
            token,
            http: api::create_client()?,
        })
    }

    fn project_url(&self, owner: &str, repo: &str, segments: &[&str]) -> Result<Url, ProviderError> {
        let project_id = format!("{owner}/{repo}");
        let mut path = vec!["api", "v4", "projects", project_id.as_str()];
        path.extend_from_slice(segments);
        api_url(&self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(PRIVATE_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn list_hooks(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<models::ProjectHook>, ProviderError> {
        let url = self.project_url(owner, repo, &["hooks"])?;
        api::fetch_json(self.authorize(self.http.get(url))).await
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
        if let Some(secret) = secret {
            if request.header(TOKEN_HEADER) != Some(secret) {
                return Err(ProviderError::InvalidToken(TOKEN_HEADER));
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
            if event != "Push Hook" && event != "Tag Push Hook" {
                return Err(ProviderError::NotAPushEvent(event.into()));
            }
        }

        let push: models::PushEvent =
            serde_json::from_slice(payload).map_err(ProviderError::MalformedPayload)?;

        match push.object_kind.as_deref() {
            None | Some("push") | Some("tag_push") => {}
            Some(other) => return Err(ProviderError::NotAPushEvent(other.into())),
        }

        let project = RepositoryPath::new(&push.project.path_with_namespace).map_err(|e| {
            ProviderError::MalformedPayloadField("project.path_with_namespace".into(), e.to_string())
        })?;

        Ok(PushEvent {
            owner: project.owner().into(),
            repo: project.name().into(),
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
        let path = path.trim_start_matches('/');
        let mut url = self.project_url(owner, repo, &["repository", "files", path, "raw"])?;
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
        let mut page = String::from("1");

        loop {
            let mut url = self.project_url(owner, repo, &["repository", "tree"])?;
            url.query_pairs_mut()
                .append_pair("ref", reference)
                .append_pair("recursive", "true")
                .append_pair("per_page", PAGE_SIZE)
                .append_pair("page", &page);

            let response = api::send(self.authorize(self.http.get(url))).await?;
            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty());

            let entries: Vec<models::TreeEntry> = response
                .json()
                .await
                .map_err(ProviderError::MalformedResponse)?;
            files.extend(
                entries
                    .into_iter()
                    .filter(|e| e.entry_type == "blob")
                    .map(|e| e.path),
            );

            match next_page {
                Some(next) => page = next,
                None => break,
            }
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
        if let Some(hook) = self
            .list_hooks(owner, repo)
            .await?
            .into_iter()
            .find(|h| h.url == url)
        {
            tracing::warn!(id = hook.id, owner = owner, repo = repo, url = url, "webhook already registered");
            return Ok(());
        }

        let endpoint = self.project_url(owner, repo, &["hooks"])?;
        let hook: models::ProjectHook = api::fetch_json(
            self.authorize(self.http.post(endpoint))
                .json(&models::NewProjectHook {
                    url,
                    push_events: true,
                    tag_push_events: true,
                    token: secret,
                }),
        )
        .await?;

        tracing::info!(id = hook.id, owner = owner, repo = repo, url = url, "new webhook installed");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
