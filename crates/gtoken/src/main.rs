//! gtoken - Google ID token generator for sidecar workloads
//!
//! Writes an ID token for the bound service account to a file and, in
//! refresh mode, replaces it before it expires until `/quitquitquit` is
//! called or the process is signalled.

use anyhow::Context;
use clap::{ArgAction, Parser};
use gtoken::config::GtokenConfig;
use gtoken::providers::{IamTokenProvider, MetadataClient, MetadataServiceAccount};
use gtoken::{RefreshMode, Refresher, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// gtoken CLI
#[derive(Parser)]
#[command(name = "gtoken")]
#[command(about = "Generate and refresh Google ID tokens for the bound service account", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GTOKEN_CONFIG")]
    config: Option<String>,

    /// File to write the ID token to
    #[arg(short, long, env = "GTOKEN_FILE")]
    file: Option<PathBuf>,

    /// Keep refreshing the token before it expires
    #[arg(long, env = "GTOKEN_REFRESH", action = ArgAction::Set)]
    refresh: Option<bool>,

    /// Control server listen address
    #[arg(short, long, env = "GTOKEN_LISTEN_ADDR")]
    listen: Option<SocketAddr>,

    /// Audience claim of the issued token
    #[arg(long, env = "GTOKEN_AUDIENCE")]
    audience: Option<String>,

    /// Log level
    #[arg(long, env = "GTOKEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "GTOKEN_LOG_JSON")]
    json: bool,
}

impl Cli {
    fn apply(self, config: &mut GtokenConfig) {
        if let Some(file) = self.file {
            config.token.file = file;
        }
        if let Some(refresh) = self.refresh {
            config.token.refresh = refresh;
        }
        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if let Some(audience) = self.audience {
            config.token.audience = audience;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config.logging.json |= self.json;
    }
}

fn init_tracing(config: &GtokenConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_refresher(config: &GtokenConfig) -> anyhow::Result<Refresher> {
    let http = reqwest::Client::builder()
        .timeout(config.gcp.request_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let credentials_file = config.gcp.credentials_path();
    let metadata = MetadataClient::new(http.clone(), config.gcp.metadata_url.clone());
    let accounts = Arc::new(MetadataServiceAccount::new(
        metadata.clone(),
        credentials_file.clone(),
    ));
    let tokens = Arc::new(
        IamTokenProvider::new(
            http,
            metadata,
            config.gcp.iam_credentials_url.clone(),
            config.token.audience.clone(),
        )
        .with_credentials_file(credentials_file)
        .with_expiry_skew(config.schedule.expiry_skew()),
    );

    Ok(Refresher::new(
        accounts,
        tokens,
        config.token.file.clone(),
        RefreshMode::from(config.token.refresh),
    )
    .with_min_interval(config.schedule.min_interval()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        GtokenConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Override with CLI args
    cli.apply(&mut config);

    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %config.token.file.display(),
        refresh = config.token.refresh,
        listen = %config.server.listen_addr,
        "Starting gtoken"
    );

    let refresher = build_refresher(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    Server::new(config.server.listen_addr, refresher)
        .run(cancel)
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping token refresh");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, stopping token refresh");
        }
    }
}
