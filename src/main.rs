use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use metal_robot::actions::{Client, Clients, register_webhook_actions};
use metal_robot::config::{ClientConfig, Config};
use metal_robot::dispatch::{MultiLock, Registry};
use metal_robot::github::GitHubClient;
use metal_robot::gitlab::GitLabClient;
use metal_robot::server::{AppState, build_router};

/// Webhook bot coordinating releases across repositories.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// Path to the YAML configuration file.
    #[arg(long, env = "METAL_ROBOT_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, env = "METAL_ROBOT_BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: std::net::IpAddr,

    #[arg(long, env = "METAL_ROBOT_PORT", default_value_t = 3000)]
    port: u16,

    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, env = "METAL_ROBOT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=debug", opts.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&opts.config)
        .with_context(|| format!("loading configuration from {}", opts.config.display()))?;

    let mut clients = Clients::new();
    for client_config in &config.clients {
        let client = connect(client_config)
            .await
            .with_context(|| format!("initializing client {:?}", client_config.name))?;
        clients.insert(client_config.name.clone(), client);
    }

    let locks = MultiLock::new();
    let mut endpoints = Vec::with_capacity(config.webhooks.len());
    for webhook in &config.webhooks {
        let registry = Arc::new(Registry::new());
        register_webhook_actions(&registry, webhook, &clients, &locks)
            .await
            .with_context(|| format!("registering actions for {}", webhook.serve_path))?;
        tracing::info!(
            path = %webhook.serve_path,
            vcs = %webhook.vcs,
            actions = webhook.actions.len(),
            "serving webhook"
        );
        endpoints.push((
            webhook.serve_path.clone(),
            AppState::new(webhook.vcs, webhook.secret.clone(), registry),
        ));
    }

    let app = build_router(endpoints);

    let addr = SocketAddr::new(opts.bind_addr, opts.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}

async fn connect(config: &ClientConfig) -> anyhow::Result<Client> {
    match (&config.github, &config.gitlab) {
        (Some(github), None) => {
            let pem = std::fs::read(&github.key_path)
                .with_context(|| format!("reading {}", github.key_path.display()))?;
            let client = GitHubClient::new_app(&config.organization, github.app_id, &pem).await?;
            Ok(Client::GitHub(client))
        }
        (None, Some(gitlab)) => Ok(Client::GitLab(GitLabClient::new(
            &config.organization,
            &gitlab.token,
        ))),
        _ => bail!("exactly one of github and gitlab must be configured"),
    }
}
