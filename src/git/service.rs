use std::{
    any::Any,
    path::{Path, PathBuf},
};

use super::GitError;
use async_trait::async_trait;
use tokio::process::Command;
use which::which;

#[async_trait]
pub trait GitService: std::fmt::Debug + Send + Sync {
    async fn clone_repository(
        &self,
        working_dir: &Path,
        url: &str,
        folder_name: &str,
    ) -> Result<String, GitError>;
    async fn fetch(&self, working_dir: &Path) -> Result<String, GitError>;
    /// Check out `reference` as a detached HEAD.
    async fn checkout(&self, working_dir: &Path, reference: &str) -> Result<String, GitError>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
pub struct GitExecutable {
    binary_path: PathBuf,
    ssh_key_file: Option<PathBuf>,
}

impl GitExecutable {
    pub fn new() -> Result<Self, GitError> {
        let binary_path = which("git").map_err(|_| GitError::MissingGitBinary)?;

        Ok(Self {
            binary_path,
            ssh_key_file: None,
        })
    }

    /// Use a private key for SSH remotes.
    pub fn with_ssh_key_file<P: Into<PathBuf>>(mut self, key_file: P) -> Result<Self, GitError> {
        let key_file = key_file.into();
        if !key_file.is_file() {
            return Err(GitError::IoError(format!(
                "SSH key file not found: {}",
                key_file.display()
            )));
        }

        self.ssh_key_file = Some(key_file);
        Ok(self)
    }

    #[tracing::instrument(skip(self))]
    async fn execute(
        &self,
        working_directory: &Path,
        command: &str,
        args: &[&str],
    ) -> Result<String, GitError> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg(command)
            .args(args)
            .current_dir(working_directory)
            .env("GIT_TERMINAL_PROMPT", "0");

        if let Some(key_file) = &self.ssh_key_file {
            cmd.env("GIT_SSH_COMMAND", ssh_command(key_file));
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| GitError::GitExecutionError(e.to_string()))?;

        if output.status.success() {
            let string_output = String::from_utf8_lossy(&output.stdout).trim().to_string();
            tracing::debug!(
                return_code = output.status.code(),
                stdout = %string_output
            );
            Ok(string_output)
        } else {
            let string_output = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                return_code = output.status.code(),
                stderr = %string_output
            );
            Err(GitError::GitExecutionError(string_output))
        }
    }
}

/// `GIT_SSH_COMMAND` value, run by git through a shell.
fn ssh_command(key_file: &Path) -> String {
    let quoted = key_file.display().to_string().replace('\'', r"'\''");
    format!(
        "ssh -i '{}' -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
        quoted
    )
}

#[async_trait]
impl GitService for GitExecutable {
    async fn clone_repository(
        &self,
        working_dir: &Path,
        url: &str,
        folder_name: &str,
    ) -> Result<String, GitError> {
        self.execute(working_dir, "clone", &["--no-checkout", url, folder_name])
            .await
    }

    async fn fetch(&self, working_dir: &Path) -> Result<String, GitError> {
        self.execute(working_dir, "fetch", &["--prune", "origin"])
            .await
    }

    async fn checkout(&self, working_dir: &Path, reference: &str) -> Result<String, GitError> {
        self.execute(working_dir, "checkout", &["--force", "--detach", reference])
            .await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
