use std::str::FromStr;

use super::GitError;

/// Repository coordinates on a Git host.
///
/// The last path segment is always the repository name; everything before it
/// is the owner, which may itself be nested (GitLab subgroups, Bitbucket
/// workspaces).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPath {
    owner: String,
    name: String,
}

impl RepositoryPath {
    pub fn new(path: &str) -> Result<Self, GitError> {
        let (owner, name) = Self::split_repo_path(path)?;

        Ok(Self {
            owner: owner.into(),
            name: name.into(),
        })
    }

    pub fn from_parts<O: Into<String>, N: Into<String>>(owner: O, name: N) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Extract the repository path from a clone URL.
    ///
    /// Supports `https://host/owner/repo(.git)` and scp-like
    /// `git@host:owner/repo(.git)` forms.
    pub fn from_remote_url(remote: &str) -> Result<Self, GitError> {
        let malformed = || GitError::MalformedRepositoryUrl(remote.into());

        let path = if remote.starts_with("http://")
            || remote.starts_with("https://")
            || remote.starts_with("ssh://")
        {
            let parsed = url::Url::parse(remote).map_err(|_| malformed())?;
            parsed.path().trim_start_matches('/').to_owned()
        } else if let Some((_, path)) = remote.split_once(':').filter(|_| remote.contains('@')) {
            path.to_owned()
        } else {
            return Err(malformed());
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        Self::new(path).map_err(|_| malformed())
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    fn split_repo_path(repo_path: &str) -> Result<(&str, &str), GitError> {
        match repo_path.rsplit_once('/') {
            Some((owner, name))
                if !name.is_empty() && !owner.is_empty() && !owner.split('/').any(str::is_empty) =>
            {
                Ok((owner, name))
            }
            _ => Err(GitError::MalformedRepositoryPath(repo_path.into())),
        }
    }
}

impl FromStr for RepositoryPath {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
