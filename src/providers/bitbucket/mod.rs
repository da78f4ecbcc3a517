//! Bitbucket Cloud provider.
//!
//! Push payloads carry no file lists, so every delivery asks for a resync of
//! the pushed commit. Deliveries are not authenticated.

mod models;

use std::any::Any;

use async_trait::async_trait;
use axum::body::Bytes;
use url::Url;

use crate::git::RepositoryPath;

use super::{
    api::{self, api_url, file_segments},
    Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest,
};

pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org";

const EVENT_HEADER: &str = "X-Event-Key";
const PUSH_EVENT: &str = "repo:push";
const MAX_DEPTH: &str = "32";

#[derive(Debug)]
pub struct BitbucketProvider {
    api_url: Url,
    user: Option<String>,
    token: Option<String>,
    http: reqwest::Client,
}

impl BitbucketProvider {
    pub fn new(
        api_url: Option<&str>,
        user: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            api_url: api::parse_base_url(api_url.unwrap_or(DEFAULT_API_URL))?,
            user,
            token,
            http: api::create_client()?,
        })
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match (&self.user, &self.token) {
            (Some(user), token) => request.basic_auth(user, token.as_ref()),
            (None, Some(token)) => request.bearer_auth(token),
            (None, None) => request,
        }
    }
}

#[async_trait]
impl Provider for BitbucketProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        _secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
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
        if event != PUSH_EVENT {
            return Err(ProviderError::NotAPushEvent(event.into()));
        }

        let push: models::PushEvent =
            serde_json::from_slice(payload).map_err(ProviderError::MalformedPayload)?;

        let change = push
            .push
            .changes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotAPushEvent("push without changes".into()))?;
        let new = change
            .new
            .ok_or_else(|| ProviderError::NotAPushEvent("branch deletion".into()))?;

        let repository = RepositoryPath::new(&push.repository.full_name).map_err(|e| {
            ProviderError::MalformedPayloadField("repository.full_name".into(), e.to_string())
        })?;

        Ok(PushEvent::resync(
            repository.owner().to_owned(),
            repository.name().to_owned(),
            new.reference(),
            new.target.hash,
        ))
    }

    async fn download_file(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = api_url(
            &self.api_url,
            ["2.0", "repositories", owner, repo, "src", reference]
                .into_iter()
                .chain(file_segments(path)),
        )?;

        api::fetch_file(self.get(url), path, reference).await
    }

    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut url = api_url(
            &self.api_url,
            ["2.0", "repositories", owner, repo, "src", reference, ""],
        )?;
        url.query_pairs_mut().append_pair("max_depth", MAX_DEPTH);

        let mut files = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: models::SourcePage = api::fetch_json(self.get(url)).await?;
            files.extend(
                page.values
                    .into_iter()
                    .filter(|e| e.entry_type == "commit_file")
                    .map(|e| e.path),
            );

            next = page
                .next
                .map(|n| Url::parse(&n).map_err(|_| ProviderError::InvalidBaseUrl(n)))
                .transpose()?;
        }

        Ok(files)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
