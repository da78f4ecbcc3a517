use std::sync::Arc;

use clap::Parser;

use kubehook::cmdargs::{Args, InstallCommand, ServeCommand, SubCommand};
use kubehook::config::{Config, ConfigError, ServerConfig};
use kubehook::http::start_server;
use kubehook::k8s::{create_client, Applier, KubeClusterApi};
use kubehook::logging::TracingSetup;
use kubehook::providers::build_provider;
use kubehook::service::ServiceHandler;
use kubehook::webhook::register_webhook;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> color_eyre::Result<()> {
    dotenv::dotenv().ok();
    color_eyre::install().ok();

    let args = Args::parse();
    let config = build_configuration(&args)?;

    TracingSetup::with_setup(config, |mut config| async move {
        if config.is_missing_git_token() {
            tracing::warn!(
                provider = %config.provider(),
                "GIT_TOKEN not set, API access might be restricted"
            );
        }

        match args.command {
            SubCommand::Serve(serve_args) => {
                if let Some(url) = &serve_args.public_url {
                    config.set_public_url(url);
                }
                config.validate_server_configuration()?;
                let server_config = build_server_configuration(&serve_args)?;
                let services = build_services(&config).await?;
                start_server(server_config, config, services).await?
            }
            SubCommand::Apply(apply_args) => {
                let services = build_services(&config).await?;
                let namespace = apply_args
                    .namespace
                    .unwrap_or_else(|| config.namespace().to_owned());
                let content = tokio::fs::read(&apply_args.file).await?;

                let summary = services
                    .applier()
                    .apply_documents(&content, &namespace)
                    .await?;
                tracing::info!(
                    file = %apply_args.file.display(),
                    created = summary.created,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "manifest applied"
                );
            }
            SubCommand::Install(InstallCommand { url, repository }) => {
                config.set_public_url(url);
                let services = build_services(&config).await?;
                register_webhook(&config, services.provider(), repository).await?;
            }
        }

        Ok(())
    })
    .await
}

async fn build_services(config: &Config) -> color_eyre::Result<ServiceHandler> {
    let client = create_client(config).await?;
    let cluster = Arc::new(KubeClusterApi::new(client));
    let applier = Applier::new(cluster, config.decode_failure_policy());
    let provider = build_provider(config)?;

    Ok(ServiceHandler::new(provider, applier))
}

fn build_configuration(args: &Args) -> Result<Config, ConfigError> {
    let mut config = Config::from_env()?;

    if let Some(p) = &args.provider {
        config.set_provider(p)?;
    }

    if let Some(n) = &args.namespace {
        config.set_namespace(n);
    }

    if let Some(s) = &args.webhook_secret {
        config.set_webhook_secret(s);
    }

    if let Some(t) = &args.telemetry_url {
        config.set_telemetry_url(t);
    }

    if let Some(k) = &args.kubeconfig {
        config.set_kubeconfig(k);
    }

    if let Some(u) = &args.git_base_url {
        config.set_git_base_url(u);
    }

    if let Some(t) = &args.git_token {
        config.set_git_token(t);
    }

    if let Some(d) = &args.decode_failure_policy {
        config.set_decode_failure_policy(d)?;
    }

    config.validate_configuration().map(|_| config)
}

fn build_server_configuration(args: &ServeCommand) -> Result<ServerConfig, ConfigError> {
    let mut server_config = ServerConfig::from_env()?;

    if let Some(ip) = &args.bind_ip {
        server_config.set_bind_ip(ip);
    }

    if let Some(port) = &args.port {
        server_config.set_port(port)?;
    }

    Ok(server_config)
}
