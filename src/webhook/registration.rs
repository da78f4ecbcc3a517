use thiserror::Error;

use crate::{
    config::Config,
    git::RepositoryPath,
    providers::{Provider, ProviderError},
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("a public URL is required to register the webhook")]
    MissingPublicUrl,
    #[error("set GIT_OWNER and GIT_REPO, or GIT_REPO_URL, to register the webhook")]
    MissingRepository,
    #[error("webhook registration failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Register `{public_url}/webhook` on the provider unless it already exists.
pub async fn register_webhook(
    config: &Config,
    provider: &dyn Provider,
    repository: Option<RepositoryPath>,
) -> Result<(), RegistrationError> {
    let url = config
        .webhook_url()
        .ok_or(RegistrationError::MissingPublicUrl)?;
    let repository = repository
        .or_else(|| config.webhook_repository())
        .ok_or(RegistrationError::MissingRepository)?;

    tracing::info!(repository = %repository.full_name(), url = %url, "registering webhook");
    provider
        .ensure_webhook(
            repository.owner(),
            repository.name(),
            &url,
            config.webhook_secret(),
        )
        .await?;

    Ok(())
}

/// Best-effort registration at server startup.
///
/// Does nothing without a public URL. Failures are logged and never stop the
/// server.
pub async fn register_webhook_on_startup(config: &Config, provider: &dyn Provider) {
    if config.webhook_url().is_none() {
        return;
    }

    if let Err(e) = register_webhook(config, provider, None).await {
        tracing::warn!(error = %e, "webhook not registered, serving anyway");
    }
}
