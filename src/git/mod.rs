mod error;
mod repo_cloner;
mod repository_path;
mod service;

pub use self::error::GitError;
pub use self::repo_cloner::RepoCloner;
pub use self::repository_path::RepositoryPath;
pub use self::service::{GitExecutable, GitService};

#[cfg(test)]
pub(crate) use self::repo_cloner::tests::FakeGitService;
