use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{git::RepositoryPath, k8s::DecodeFailurePolicy, providers::ProviderKind};

/// Presence of this file means we run inside a pod.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

const DEFAULT_SERVER_PORT: u16 = 8082;
const DEFAULT_BIND_IP: &str = "0.0.0.0";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_BRANCH: &str = "main";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("WEBHOOK_SECRET is required to serve webhooks.")]
    MissingWebhookSecret,
    #[error("Unsupported git provider: '{0}'. Expected one of github, gitlab, gitea, bitbucket, git.")]
    UnsupportedProvider(String),
    #[error("Unsupported decode failure policy: '{0}'. Expected 'skip' or 'abort'.")]
    UnsupportedDecodePolicy(String),
    #[error("Malformed server port: '{0}'.")]
    MalformedServerPort(String),
    #[error("Malformed bind IP: '{0}'. Make sure you entered a valid IP.")]
    MalformedBindIp(String),
    #[error("Missing kubeconfig file: '{0}'. Make sure it exists on disk.")]
    MissingKubeconfig(PathBuf),
    #[error("GIT_REPO_URL is required by the git provider.")]
    MissingRepositoryUrl,
}

#[derive(Debug, Clone)]
pub struct Config {
    provider: ProviderKind,
    git_token: Option<String>,
    git_base_url: Option<String>,
    bitbucket_user: Option<String>,
    webhook_secret: Option<String>,
    namespace: String,
    git_repo_url: Option<String>,
    git_ssh_key_file: Option<PathBuf>,
    git_default_branch: String,
    git_cache_dir: Option<PathBuf>,
    git_owner: Option<String>,
    git_repo: Option<String>,
    public_url: Option<String>,
    kubeconfig: Option<PathBuf>,
    in_cluster: bool,
    decode_failure_policy: DecodeFailurePolicy,
    telemetry_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::empty();

        if let Some(provider) = env_to_str("GIT_PROVIDER") {
            config.set_provider(&provider)?;
        }

        if let Some(policy) = env_to_str("DECODE_FAILURE_POLICY") {
            config.set_decode_failure_policy(&policy)?;
        }

        config.git_token = env_to_str("GIT_TOKEN").or_else(|| env_to_str("GITHUB_TOKEN"));
        config.git_base_url = env_to_str("GIT_BASE_URL");
        config.bitbucket_user = env_to_str("BITBUCKET_USER");
        config.webhook_secret = env_to_str("WEBHOOK_SECRET");
        config.namespace = env_to_str("NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.into());
        config.git_repo_url = env_to_str("GIT_REPO_URL");
        config.git_ssh_key_file = env_to_str("GIT_SSH_KEY_FILE").map(PathBuf::from);
        config.git_default_branch =
            env_to_str("GIT_DEFAULT_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.into());
        config.git_cache_dir = env_to_str("GIT_CACHE_DIR").map(PathBuf::from);
        config.git_owner = env_to_str("GIT_OWNER");
        config.git_repo = env_to_str("GIT_REPO");
        config.public_url = env_to_str("PUBLIC_URL");
        config.kubeconfig = env_to_str("KUBECONFIG_PATH").map(PathBuf::from);
        config.in_cluster = Path::new(SERVICE_ACCOUNT_TOKEN_PATH).exists();
        config.telemetry_url = env_to_str("TELEMETRY_URL");

        Ok(config)
    }

    pub fn empty() -> Self {
        Self {
            provider: ProviderKind::GitHub,
            git_token: None,
            git_base_url: None,
            bitbucket_user: None,
            webhook_secret: None,
            namespace: DEFAULT_NAMESPACE.into(),
            git_repo_url: None,
            git_ssh_key_file: None,
            git_default_branch: DEFAULT_BRANCH.into(),
            git_cache_dir: None,
            git_owner: None,
            git_repo: None,
            public_url: None,
            kubeconfig: None,
            in_cluster: false,
            decode_failure_policy: DecodeFailurePolicy::default(),
            telemetry_url: None,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn git_token(&self) -> Option<&str> {
        self.git_token.as_deref()
    }

    pub fn git_base_url(&self) -> Option<&str> {
        self.git_base_url.as_deref()
    }

    pub fn bitbucket_user(&self) -> Option<&str> {
        self.bitbucket_user.as_deref()
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn git_repo_url(&self) -> Option<&str> {
        self.git_repo_url.as_deref()
    }

    pub fn git_ssh_key_file(&self) -> Option<&Path> {
        self.git_ssh_key_file.as_deref()
    }

    pub fn git_default_branch(&self) -> &str {
        &self.git_default_branch
    }

    /// Directory holding the generic git provider clone.
    pub fn git_cache_dir(&self) -> PathBuf {
        self.git_cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(crate::server_info::APP_NAME))
    }

    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// Repository the webhook is registered on.
    ///
    /// `GIT_OWNER` and `GIT_REPO` win over the path of `GIT_REPO_URL`.
    pub fn webhook_repository(&self) -> Option<RepositoryPath> {
        match (&self.git_owner, &self.git_repo) {
            (Some(owner), Some(repo)) => Some(RepositoryPath::from_parts(owner, repo)),
            _ => self
                .git_repo_url
                .as_deref()
                .and_then(|url| RepositoryPath::from_remote_url(url).ok()),
        }
    }

    /// Webhook endpoint advertised to the provider.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_url
            .as_deref()
            .map(|url| format!("{}/webhook", url.trim_end_matches('/')))
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    pub fn in_cluster(&self) -> bool {
        self.in_cluster
    }

    pub fn decode_failure_policy(&self) -> DecodeFailurePolicy {
        self.decode_failure_policy
    }

    pub fn telemetry_url(&self) -> Option<&str> {
        self.telemetry_url.as_deref()
    }

    pub fn set_provider(&mut self, value: &str) -> Result<(), ConfigError> {
        self.provider = ProviderKind::from_str(value)
            .map_err(|_| ConfigError::UnsupportedProvider(value.into()))?;
        Ok(())
    }

    pub fn set_decode_failure_policy(&mut self, value: &str) -> Result<(), ConfigError> {
        self.decode_failure_policy = DecodeFailurePolicy::from_str(value)
            .map_err(|_| ConfigError::UnsupportedDecodePolicy(value.into()))?;
        Ok(())
    }

    pub fn set_git_token<T: Into<String>>(&mut self, value: T) {
        self.git_token = Some(value.into());
    }

    pub fn set_git_base_url<T: Into<String>>(&mut self, value: T) {
        self.git_base_url = Some(value.into());
    }

    pub fn set_webhook_secret<T: Into<String>>(&mut self, value: T) {
        self.webhook_secret = Some(value.into());
    }

    pub fn set_namespace<T: Into<String>>(&mut self, value: T) {
        self.namespace = value.into();
    }

    pub fn set_git_repo_url<T: Into<String>>(&mut self, value: T) {
        self.git_repo_url = Some(value.into());
    }

    pub fn set_public_url<T: Into<String>>(&mut self, value: T) {
        self.public_url = Some(value.into());
    }

    pub fn set_kubeconfig<T: Into<PathBuf>>(&mut self, value: T) {
        self.kubeconfig = Some(value.into());
    }

    pub fn set_telemetry_url<T: Into<String>>(&mut self, value: T) {
        self.telemetry_url = Some(value.into());
    }

    pub fn validate_configuration(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.kubeconfig {
            if !path.exists() {
                return Err(ConfigError::MissingKubeconfig(path.clone()));
            }
        }

        if self.provider == ProviderKind::Git && self.git_repo_url.is_none() {
            return Err(ConfigError::MissingRepositoryUrl);
        }

        Ok(())
    }

    /// Hosted providers reached without a token, where API access might be
    /// restricted.
    pub fn is_missing_git_token(&self) -> bool {
        self.git_token.is_none() && self.provider != ProviderKind::Git
    }

    /// Serving webhooks additionally needs a shared secret.
    pub fn validate_server_configuration(&self) -> Result<(), ConfigError> {
        self.validate_configuration()?;

        if self.webhook_secret.is_none() {
            return Err(ConfigError::MissingWebhookSecret);
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    bind_ip: String,
    port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = env_to_str("SERVER_PORT") {
            config.set_port(&port)?;
        }

        if let Some(ip) = env_to_str("BIND_IP") {
            config.set_bind_ip(ip);
        }

        Ok(config)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, value: &str) -> Result<(), ConfigError> {
        self.port = value
            .parse()
            .map_err(|_| ConfigError::MalformedServerPort(value.into()))?;
        Ok(())
    }

    pub fn set_bind_ip<T: Into<String>>(&mut self, value: T) {
        self.bind_ip = value.into();
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_ip
            .parse()
            .map_err(|_| ConfigError::MalformedBindIp(self.bind_ip.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: DEFAULT_BIND_IP.into(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

fn env_to_str(env_key: &str) -> Option<String> {
    std::env::var(env_key).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::{k8s::DecodeFailurePolicy, providers::ProviderKind};

    use super::{Config, ConfigError, ServerConfig};

    #[test]
    fn test_defaults() {
        let config = Config::empty();
        assert_eq!(config.provider(), ProviderKind::GitHub);
        assert_eq!(config.namespace(), "default");
        assert_eq!(config.git_default_branch(), "main");
        assert_eq!(config.decode_failure_policy(), DecodeFailurePolicy::Skip);

        let server = ServerConfig::default();
        assert_eq!(server.port(), 8082);
        assert_eq!(server.socket_addr().unwrap().to_string(), "0.0.0.0:8082");
    }

    #[test]
    fn test_provider_is_case_insensitive() {
        let mut config = Config::empty();
        config.set_provider("GitLab").unwrap();
        assert_eq!(config.provider(), ProviderKind::GitLab);
        config.set_provider("bitbucket").unwrap();
        assert_eq!(config.provider(), ProviderKind::Bitbucket);
    }

    #[test]
    fn test_unsupported_provider() {
        let mut config = Config::empty();
        assert_matches!(
            config.set_provider("svn"),
            Err(ConfigError::UnsupportedProvider(p)) if p == "svn"
        );
    }

    #[test]
    fn test_server_requires_secret() {
        let mut config = Config::empty();
        assert_matches!(
            config.validate_server_configuration(),
            Err(ConfigError::MissingWebhookSecret)
        );

        config.set_webhook_secret("secret");
        config.validate_server_configuration().unwrap();
    }

    #[test]
    fn test_git_provider_requires_repo_url() {
        let mut config = Config::empty();
        config.set_provider("git").unwrap();
        assert_matches!(
            config.validate_configuration(),
            Err(ConfigError::MissingRepositoryUrl)
        );

        config.set_git_repo_url("https://example.com/owner/repo.git");
        config.validate_configuration().unwrap();
    }

    #[test]
    fn test_webhook_repository_resolution() {
        let mut config = Config::empty();
        assert_eq!(config.webhook_repository(), None);

        config.set_git_repo_url("git@gitlab.com:group/sub/infra.git");
        let repository = config.webhook_repository().unwrap();
        assert_eq!(repository.owner(), "group/sub");
        assert_eq!(repository.name(), "infra");

        config.git_owner = Some("acme".into());
        config.git_repo = Some("platform".into());
        assert_eq!(config.webhook_repository().unwrap().full_name(), "acme/platform");
    }

    #[test]
    fn test_missing_git_token() {
        let mut config = Config::empty();
        assert!(config.is_missing_git_token());

        config.set_provider("git").unwrap();
        assert!(!config.is_missing_git_token());

        config.set_provider("gitlab").unwrap();
        config.set_git_token("glpat-token");
        assert!(!config.is_missing_git_token());
    }

    #[test]
    fn test_webhook_url() {
        let mut config = Config::empty();
        assert_eq!(config.webhook_url(), None);

        config.set_public_url("https://hooks.example.com/");
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://hooks.example.com/webhook")
        );
    }

    #[test]
    fn test_malformed_server_settings() {
        let mut server = ServerConfig::default();
        assert_matches!(
            server.set_port("eighty"),
            Err(ConfigError::MalformedServerPort(_))
        );

        server.set_bind_ip("localhost:3000");
        assert_matches!(server.socket_addr(), Err(ConfigError::MalformedBindIp(_)));
    }
}
