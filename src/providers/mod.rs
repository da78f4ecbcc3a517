//! Git hosting providers.
//!
//! Every provider turns a webhook delivery into a [`PushEvent`] and knows how
//! to read files back from the repository at a given reference.

mod api;
pub mod bitbucket;
mod error;
mod event;
#[cfg(test)]
mod fake;
pub mod git;
pub mod gitea;
pub mod github;
pub mod gitlab;

use std::{any::Any, sync::Arc};

use async_trait::async_trait;
use axum::{body::Bytes, http::HeaderMap};

use crate::{config::Config, git::GitExecutable};

pub use self::error::ProviderError;
pub use self::event::{collect_modified_files, CommitChanges, PushEvent, RESYNC_MARKER};

#[cfg(test)]
pub(crate) use self::fake::{FakeFailure, FakeProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Gitea,
    Bitbucket,
    Git,
}

/// An inbound webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    headers: HeaderMap,
    body: Bytes,
}

impl WebhookRequest {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self { headers, body }
    }

    /// Header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[cfg(test)]
    pub(crate) fn with_headers<B: Into<Bytes>>(headers: &[(&str, &str)], body: B) -> Self {
        use axum::http::{header::HeaderName, HeaderValue};

        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        Self::new(map, body.into())
    }
}

#[async_trait]
pub trait Provider: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Authenticate the delivery and return its payload.
    fn validate(
        &self,
        request: &WebhookRequest,
        secret: Option<&str>,
    ) -> Result<Bytes, ProviderError>;

    /// Normalize the payload. Non-push deliveries yield
    /// [`ProviderError::NotAPushEvent`].
    fn parse_push_event(
        &self,
        request: &WebhookRequest,
        payload: &[u8],
    ) -> Result<PushEvent, ProviderError>;

    async fn download_file(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Every file path of the repository at `reference`.
    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Register a push webhook targeting `url` unless one already exists.
    async fn ensure_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        _secret: Option<&str>,
    ) -> Result<(), ProviderError> {
        tracing::warn!(
            provider = %self.kind(),
            owner = owner,
            repo = repo,
            url = url,
            "webhook registration is not supported by this provider"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Build the provider selected in `config`.
pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>, ProviderError> {
    let token = config.git_token().map(str::to_owned);
    let base_url = config.git_base_url();

    let provider: Arc<dyn Provider> = match config.provider() {
        ProviderKind::GitHub => Arc::new(github::GitHubProvider::new(base_url, token)?),
        ProviderKind::GitLab => Arc::new(gitlab::GitLabProvider::new(base_url, token)?),
        ProviderKind::Gitea => Arc::new(gitea::GiteaProvider::new(base_url, token)?),
        ProviderKind::Bitbucket => Arc::new(bitbucket::BitbucketProvider::new(
            base_url,
            config.bitbucket_user().map(str::to_owned),
            token,
        )?),
        ProviderKind::Git => {
            let mut executable = GitExecutable::new()?;
            if let Some(key_file) = config.git_ssh_key_file() {
                executable = executable.with_ssh_key_file(key_file)?;
            }

            Arc::new(git::GenericGitProvider::new(
                Arc::new(executable),
                config.git_repo_url().unwrap_or_default(),
                config.git_cache_dir(),
                config.git_default_branch(),
            ))
        }
    };

    tracing::info!(provider = %provider.kind(), "provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use crate::config::Config;

    use super::{build_provider, ProviderKind};

    #[test]
    fn test_kind_round_trip_names() {
        for (name, kind) in [
            ("github", ProviderKind::GitHub),
            ("gitlab", ProviderKind::GitLab),
            ("gitea", ProviderKind::Gitea),
            ("bitbucket", ProviderKind::Bitbucket),
            ("git", ProviderKind::Git),
        ] {
            assert_eq!(ProviderKind::from_str(name).unwrap(), kind);
            assert_eq!(kind.to_string(), name);
        }

        assert!(ProviderKind::from_str("GITHUB").is_ok());
        assert!(ProviderKind::from_str("svn").is_err());
    }

    #[test]
    fn test_factory_selects_variant() {
        let mut config = Config::empty();

        for name in ["github", "gitlab", "gitea", "bitbucket"] {
            config.set_provider(name).unwrap();
            let provider = build_provider(&config).unwrap();
            assert_eq!(provider.kind().to_string(), name);
        }
    }
}
