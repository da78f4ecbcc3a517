use std::{any::Any, collections::BTreeMap};

use async_trait::async_trait;
use axum::body::Bytes;
use pseudo::Mock;

use super::{Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest};

/// Cloneable stand-in for the provider failures the pipeline reacts to.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    InvalidSignature,
    MissingEventHeader,
    NotAPushEvent(String),
    FileNotFound,
    Unreachable,
}

impl FakeFailure {
    fn into_error(self, path: &str) -> ProviderError {
        match self {
            Self::InvalidSignature => ProviderError::InvalidSignature("X-Fake-Signature"),
            Self::MissingEventHeader => ProviderError::MissingEventHeader("X-Fake-Event"),
            Self::NotAPushEvent(reason) => ProviderError::NotAPushEvent(reason),
            Self::FileNotFound => ProviderError::FileNotFound {
                path: path.into(),
                reference: "after".into(),
            },
            Self::Unreachable => ProviderError::InvalidBaseUrl("unreachable".into()),
        }
    }
}

#[derive(Debug)]
pub struct FakeProvider {
    pub validate: Mock<Option<String>, Result<(), FakeFailure>>,
    pub parse_push_event: Mock<Vec<u8>, Result<PushEvent, FakeFailure>>,
    pub download_file: Mock<(String, String), Result<Vec<u8>, FakeFailure>>,
    pub list_files: Mock<String, Result<Vec<String>, FakeFailure>>,
    pub ensure_webhook: Mock<(String, String, String, Option<String>), Result<(), FakeFailure>>,
    /// Per-path download results, taking precedence over `download_file`.
    pub files: BTreeMap<String, Result<Vec<u8>, FakeFailure>>,
}

impl FakeProvider {
    pub fn new(event: PushEvent) -> Self {
        Self {
            validate: Mock::new(Ok(())),
            parse_push_event: Mock::new(Ok(event)),
            download_file: Mock::new(Ok(Vec::new())),
            list_files: Mock::new(Ok(Vec::new())),
            ensure_webhook: Mock::new(Ok(())),
            files: BTreeMap::new(),
        }
    }

    pub fn with_file<P: Into<String>, C: Into<Vec<u8>>>(mut self, path: P, content: C) -> Self {
        self.files.insert(path.into(), Ok(content.into()));
        self
    }

    pub fn with_failing_file<P: Into<String>>(mut self, path: P, failure: FakeFailure) -> Self {
        self.files.insert(path.into(), Err(failure));
        self
    }

    pub fn downloaded_paths(&self) -> Vec<String> {
        self.download_file
            .calls()
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Git
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
        self.validate
            .call(secret.map(str::to_owned))
            .map(|_| request.body().clone())
            .map_err(|f| f.into_error(""))
    }

    fn parse_push_event(
        &self,
        _request: &WebhookRequest,
        payload: &[u8],
    ) -> Result<PushEvent, ProviderError> {
        self.parse_push_event
            .call(payload.to_vec())
            .map_err(|f| f.into_error(""))
    }

    async fn download_file(
        &self,
        _owner: &str,
        _repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let result = self
            .download_file
            .call((reference.to_owned(), path.to_owned()));
        self.files
            .get(path)
            .cloned()
            .unwrap_or(result)
            .map_err(|f| f.into_error(path))
    }

    async fn list_files(
        &self,
        _owner: &str,
        _repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.list_files
            .call(reference.to_owned())
            .map_err(|f| f.into_error(""))
    }

    async fn ensure_webhook(
        &self,
        owner: &str,
        repo: &str,
        url: &str,
        secret: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.ensure_webhook
            .call((
                owner.to_owned(),
                repo.to_owned(),
                url.to_owned(),
                secret.map(str::to_owned),
            ))
            .map_err(|f| f.into_error(""))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
