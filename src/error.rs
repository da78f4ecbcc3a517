use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::{k8s::ApplyError, providers::ProviderError};

#[derive(Debug, Error)]
pub enum ErrorCode {
    InvalidDelivery(String),
    MissingEventHeader(&'static str),
    MalformedEventBody(String),
    ListFilesFailure(String),
    DownloadFailure { path: String, reason: String },
    ApplyConflict { path: String, reason: String },
    ApplyFailure { path: String, reason: String },
    UnhandledError(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorCodeDetail {
    #[serde(skip)]
    status_code: StatusCode,
    internal_code: u32,
    message: String,
}

impl ErrorCode {
    pub fn details(&self) -> ErrorCodeDetail {
        self.into()
    }

    pub fn from_apply_error<P: Into<String>>(path: P, error: ApplyError) -> Self {
        let path = path.into();
        match error {
            ApplyError::Conflict { .. } => Self::ApplyConflict {
                path,
                reason: error.to_string(),
            },
            other => Self::ApplyFailure {
                path,
                reason: other.to_string(),
            },
        }
    }
}

impl From<ProviderError> for ErrorCode {
    fn from(error: ProviderError) -> Self {
        match error {
            e if e.is_validation_error() => Self::InvalidDelivery(e.to_string()),
            ProviderError::MissingEventHeader(header) => Self::MissingEventHeader(header),
            e @ (ProviderError::MalformedPayload(_) | ProviderError::MalformedPayloadField(_, _)) => {
                Self::MalformedEventBody(e.to_string())
            }
            other => Self::UnhandledError(other.to_string()),
        }
    }
}

impl ErrorCodeDetail {
    pub fn with_status_code<T: Into<String>>(
        status_code: StatusCode,
        internal_code: u32,
        message: T,
    ) -> Self {
        Self {
            internal_code,
            status_code,
            message: message.into(),
        }
    }

    pub fn bad_request<T: Into<String>>(internal_code: u32, message: T) -> Self {
        Self::with_status_code(StatusCode::BAD_REQUEST, internal_code, message)
    }

    pub fn server_error<T: Into<String>>(internal_code: u32, message: T) -> Self {
        Self::with_status_code(StatusCode::INTERNAL_SERVER_ERROR, internal_code, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn internal_code(&self) -> u32 {
        self.internal_code
    }
}

impl From<&ErrorCode> for ErrorCodeDetail {
    fn from(value: &ErrorCode) -> Self {
        match value {
            ErrorCode::InvalidDelivery(e) => {
                Self::bad_request(1, format!("Invalid delivery: '{}'", e))
            }
            ErrorCode::MissingEventHeader(header) => {
                Self::bad_request(2, format!("Missing {} header", header))
            }
            ErrorCode::MalformedEventBody(e) => {
                Self::bad_request(3, format!("Malformed event body: '{}'", e))
            }
            ErrorCode::ListFilesFailure(e) => {
                Self::server_error(10, format!("Cannot list repository files: '{}'", e))
            }
            ErrorCode::DownloadFailure { path, reason } => {
                Self::server_error(11, format!("Cannot download '{}': '{}'", path, reason))
            }
            ErrorCode::ApplyConflict { path, reason } => {
                Self::server_error(12, format!("Conflict while applying '{}': '{}'", path, reason))
            }
            ErrorCode::ApplyFailure { path, reason } => {
                Self::server_error(13, format!("Cannot apply '{}': '{}'", path, reason))
            }
            ErrorCode::UnhandledError(e) => {
                Self::server_error(99, format!("Unhandled error: '{}'", e))
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let detail = ErrorCodeDetail::from(self);
        f.write_str(&detail.message)
    }
}
