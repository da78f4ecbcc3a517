//! Generic Git provider.
//!
//! Works with any remote reachable by `git clone`. Deliveries are only a
//! trigger: files are read from a local working copy kept in a cache
//! directory, synchronized on each access.

use std::{
    any::Any,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::Mutex;

use crate::git::{GitService, RepoCloner, RepositoryPath};

use super::{Provider, ProviderError, ProviderKind, PushEvent, WebhookRequest};

const HEAD: &str = "HEAD";
const BRANCH_PREFIX: &str = "refs/heads/";
const FALLBACK_OWNER: &str = "generic";
const FALLBACK_REPO: &str = "repo";

#[derive(Debug)]
pub struct GenericGitProvider {
    git: Arc<dyn GitService>,
    repo_url: String,
    repository: RepositoryPath,
    default_branch: String,
    working_copy: Mutex<PathBuf>,
}

impl GenericGitProvider {
    pub fn new(
        git: Arc<dyn GitService>,
        repo_url: &str,
        cache_dir: PathBuf,
        default_branch: &str,
    ) -> Self {
        let repository = RepositoryPath::from_remote_url(repo_url)
            .unwrap_or_else(|_| RepositoryPath::from_parts(FALLBACK_OWNER, FALLBACK_REPO));
        let folder_name = repository.full_name().replace('/', "_");

        Self {
            git,
            repo_url: repo_url.to_owned(),
            default_branch: default_branch.to_owned(),
            working_copy: Mutex::new(cache_dir.join(folder_name)),
            repository,
        }
    }

    /// Map a push reference to something `git checkout --detach` accepts.
    fn resolve_reference(&self, reference: &str) -> String {
        if reference == HEAD {
            format!("origin/{}", self.default_branch)
        } else if let Some(branch) = reference.strip_prefix(BRANCH_PREFIX) {
            format!("origin/{branch}")
        } else {
            reference.to_owned()
        }
    }

    async fn synchronize(&self, working_copy: &Path, reference: &str) -> Result<(), ProviderError> {
        let reference = self.resolve_reference(reference);
        RepoCloner::create_or_update_in_directory(
            self.git.as_ref(),
            &self.repo_url,
            working_copy,
            &reference,
        )
        .await?;
        Ok(())
    }
}

/// Resolve `path` under `root`, refusing anything that lands outside of it.
async fn resolve_in_root(root: &Path, path: &str, reference: &str) -> Result<PathBuf, ProviderError> {
    let root = tokio::fs::canonicalize(root).await?;
    let candidate = root.join(path.trim_start_matches('/'));

    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProviderError::FileNotFound {
                path: path.into(),
                reference: reference.into(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    if !resolved.starts_with(&root) {
        return Err(ProviderError::PathTraversal(path.into()));
    }

    Ok(resolved)
}

/// Relative paths of every file under `root`, skipping `.git`.
async fn walk_files(root: &Path) -> Result<Vec<String>, ProviderError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();

            if file_type.is_dir() {
                if entry.file_name() != ".git" {
                    pending.push(path);
                }
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(root) {
                    let segments: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect();
                    files.push(segments.join("/"));
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[async_trait]
impl Provider for GenericGitProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Git
    }

    fn validate(
        &self,
        request: &WebhookRequest,
        _secret: Option<&str>,
    ) -> Result<Bytes, ProviderError> {
        Ok(request.body().clone())
    }

    fn parse_push_event(
        &self,
        _request: &WebhookRequest,
        _payload: &[u8],
    ) -> Result<PushEvent, ProviderError> {
        Ok(PushEvent::resync(
            self.repository.owner().to_owned(),
            self.repository.name().to_owned(),
            format!("{BRANCH_PREFIX}{}", self.default_branch),
            HEAD.to_owned(),
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn download_file(
        &self,
        _owner: &str,
        _repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let working_copy = self.working_copy.lock().await;
        self.synchronize(&working_copy, reference).await?;

        let resolved = resolve_in_root(&working_copy, path, reference).await?;
        Ok(tokio::fs::read(resolved).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn list_files(
        &self,
        _owner: &str,
        _repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let working_copy = self.working_copy.lock().await;
        self.synchronize(&working_copy, reference).await?;

        walk_files(&working_copy).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
