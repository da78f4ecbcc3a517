use thiserror::Error;

use crate::git::GitError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing signature header '{0}'")]
    MissingSignature(&'static str),

    #[error("invalid signature in header '{0}'")]
    InvalidSignature(&'static str),

    #[error("invalid or missing token in header '{0}'")]
    InvalidToken(&'static str),

    #[error("missing event header '{0}'")]
    MissingEventHeader(&'static str),

    #[error("not a push event: {0}")]
    NotAPushEvent(String),

    #[error("malformed event body: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("malformed event body field '{0}': {1}")]
    MalformedPayloadField(String, String),

    #[error("file '{path}' not found at '{reference}'")]
    FileNotFound { path: String, reference: String },

    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("error while calling the provider API.")]
    Request(#[source] reqwest::Error),

    #[error("error code received from the provider API.")]
    BadStatusCode(#[source] reqwest::Error),

    #[error("error while parsing the provider API response.")]
    MalformedResponse(#[source] reqwest::Error),

    #[error("path '{0}' escapes the repository root")]
    PathTraversal(String),

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether the delivery was rejected before any side effect.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature(_) | Self::InvalidSignature(_) | Self::InvalidToken(_)
        )
    }
}
