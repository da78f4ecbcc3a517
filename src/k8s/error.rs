use thiserror::Error;

/// Failure crossing the [`ClusterApi`](super::ClusterApi) boundary.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("API server answered {code} {reason}: {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("error while calling the API server: {0}")]
    Transport(String),

    #[error("API discovery failed: {0}")]
    Discovery(String),

    #[error("no REST mapping for {0}")]
    Unmappable(String),

    #[error("object has no name")]
    MissingName,
}

impl ClusterError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => Self::Api {
                code: response.code,
                reason: response.reason,
                message: response.message,
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("cannot decode document: {0}")]
    Decode(String),

    #[error("cannot map kind '{kind}': {source}")]
    Mapping {
        kind: String,
        #[source]
        source: ClusterError,
    },

    #[error("cannot read {resource}: {source}")]
    Get {
        resource: String,
        #[source]
        source: ClusterError,
    },

    #[error("cannot create {resource}: {source}")]
    Create {
        resource: String,
        #[source]
        source: ClusterError,
    },

    #[error("cannot update {resource}: {source}")]
    Update {
        resource: String,
        #[source]
        source: ClusterError,
    },

    #[error("{resource} was modified concurrently: {message}")]
    Conflict { resource: String, message: String },
}
