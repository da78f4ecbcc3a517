use std::path::Path;

use super::{GitError, GitService};

/// Keeps a local working copy of a remote repository in sync.
pub struct RepoCloner;

impl RepoCloner {
    /// Clone `url` into `working_copy` on first use, fetch afterwards, then
    /// check out `reference`.
    #[tracing::instrument(skip(git))]
    pub async fn create_or_update_in_directory(
        git: &dyn GitService,
        url: &str,
        working_copy: &Path,
        reference: &str,
    ) -> Result<(), GitError> {
        if !working_copy.join(".git").exists() {
            let parent = working_copy.parent().ok_or_else(|| {
                GitError::IoError(format!("no parent directory: {}", working_copy.display()))
            })?;
            let folder_name = working_copy
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    GitError::IoError(format!("no folder name: {}", working_copy.display()))
                })?;

            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GitError::IoError(e.to_string()))?;

            tracing::info!(url = url, path = %working_copy.display(), "cloning repository");
            git.clone_repository(parent, url, &folder_name).await?;
        } else {
            git.fetch(working_copy).await?;
        }

        git.checkout(working_copy, reference).await?;

        Ok(())
    }
}
