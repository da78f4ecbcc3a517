use std::path::PathBuf;

use clap::Parser;

use crate::git::RepositoryPath;

/// Apply Kubernetes manifests pushed to a Git repository
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Git provider: github, gitlab, gitea, bitbucket or git (github as default)
    #[clap(long)]
    pub provider: Option<String>,

    /// Default namespace for namespaced resources ("default" as default)
    #[clap(long)]
    pub namespace: Option<String>,

    /// Webhook secret
    #[clap(long)]
    pub webhook_secret: Option<String>,

    /// Telemetry URL (disabled as default)
    #[clap(long)]
    pub telemetry_url: Option<String>,

    /// Kubeconfig path (inferred as default)
    #[clap(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Provider API base URL (provider public API as default)
    #[clap(long)]
    pub git_base_url: Option<String>,

    /// Provider API token
    #[clap(long)]
    pub git_token: Option<String>,

    /// What to do with undecodable documents: skip or abort (skip as default)
    #[clap(long)]
    pub decode_failure_policy: Option<String>,

    /// Command
    #[clap(subcommand)]
    pub command: SubCommand,
}

#[derive(Parser, Debug)]
pub enum SubCommand {
    /// Serve webhooks
    Serve(ServeCommand),
    /// Apply a local manifest file
    Apply(ApplyCommand),
    /// Register the webhook on the provider
    Install(InstallCommand),
}

#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Bind IP (0.0.0.0 as default)
    #[clap(long)]
    pub bind_ip: Option<String>,

    /// Port (8082 as default)
    #[clap(long)]
    pub port: Option<String>,

    /// Public base URL, registers the webhook on startup when set
    #[clap(long)]
    pub public_url: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ApplyCommand {
    /// Manifest file, may hold several documents
    #[clap(long)]
    pub file: PathBuf,

    /// Default namespace, overriding the global one
    #[clap(long)]
    pub namespace: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InstallCommand {
    /// Public base URL of this server
    #[clap(long)]
    pub url: String,

    /// Repository full name (owner/name), taken from the configuration as default
    #[clap(long)]
    pub repository: Option<RepositoryPath>,
}
