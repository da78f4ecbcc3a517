use reqwest::header::ACCEPT;
use url::Url;

use crate::providers::{
    api::{self, api_url, file_segments},
    ProviderError,
};

use super::models::{NewWebhook, NewWebhookConfig, Tree, Webhook};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

#[derive(Debug)]
pub struct Client {
    api_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(api_url: Option<&str>, token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            api_url: api::parse_base_url(api_url.unwrap_or(DEFAULT_API_URL))?,
            token,
            http: api::create_client()?,
        })
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn download_file(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut url = api_url(
            &self.api_url,
            ["repos", owner, repo, "contents"]
                .into_iter()
                .chain(file_segments(path)),
        )?;
        url.query_pairs_mut().append_pair("ref", reference);

        api::fetch_file(self.get(url).header(ACCEPT, RAW_MEDIA_TYPE), path, reference).await
    }

    pub async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut url = api_url(&self.api_url, ["repos", owner, repo, "git", "trees", reference])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: Tree = api::fetch_json(self.get(url).header(ACCEPT, JSON_MEDIA_TYPE)).await?;
        if tree.truncated {
            tracing::warn!(
                owner = owner,
                repo = repo,
                reference = reference,
                "tree listing truncated by GitHub, some files will be missed"
            );
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| e.path)
            .collect())
    }

    pub async fn try_register_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: Option<&str>,
    ) -> Result<u64, ProviderError> {
        if let Some(id) = self.check_webhook_url(owner, repo, url).await? {
            tracing::warn!(
                id = id,
                owner = owner,
                repo = repo,
                url = url,
                "webhook already registered"
            );
            Ok(id)
        } else {
            Ok(self.register_webhook(owner, repo, url, secret).await?.id)
        }
    }

    async fn register_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: Option<&str>,
    ) -> Result<Webhook, ProviderError> {
        let data = NewWebhook {
            name: "web",
            active: true,
            config: NewWebhookConfig {
                url,
                content_type: "json",
                secret,
            },
            events: &["push"],
        };

        let endpoint = api_url(&self.api_url, ["repos", owner, repo, "hooks"])?;
        let webhook: Webhook = api::fetch_json(
            self.authorize(self.http.post(endpoint))
                .header(ACCEPT, JSON_MEDIA_TYPE)
                .json(&data),
        )
        .await?;

        tracing::info!(
            id = webhook.id,
            owner = owner,
            repo = repo,
            url = url,
            "new webhook installed"
        );

        Ok(webhook)
    }

    async fn list_webhooks(&self, owner: &str, repo: &str) -> Result<Vec<Webhook>, ProviderError> {
        let endpoint = api_url(&self.api_url, ["repos", owner, repo, "hooks"])?;
        api::fetch_json(self.get(endpoint).header(ACCEPT, JSON_MEDIA_TYPE)).await
    }

    async fn check_webhook_url(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
    ) -> Result<Option<u64>, ProviderError> {
        Ok(self
            .list_webhooks(owner, repo)
            .await?
            .into_iter()
            .find(|w| w.config.url.as_deref() == Some(url))
            .map(|w| w.id))
    }
}
