//! Connected Apps - Entry Point
//!
//! Serves the OAuth2 callback, token and administration endpoints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use connected_apps::{
    ProviderClient, TokenManager,
    config::{Config, parse_user_list}, models::ConnectedAppSettings, server::ConnectedAppsServer,
    store::MemoryRepository,
};

#[derive(Parser, Debug)]
#[command(name = "connected-apps")]
#[command(about = "OAuth2 token lifecycle manager for connected third-party apps")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public URL of this service, used to build redirect URIs
    #[arg(long, env = "CONNECTED_APPS_HOST_URL")]
    host_url: Option<String>,

    /// Header set by the front proxy with the authenticated user
    #[arg(long, env = "CONNECTED_APPS_USER_HEADER")]
    user_header: Option<String>,

    /// Users allowed to manage connected apps (repeat or comma separate)
    #[arg(long = "admin-user", env = "CONNECTED_APPS_ADMINS", value_delimiter = ',')]
    admin_users: Vec<String>,

    /// Accept plain http provider endpoints (development only)
    #[arg(long)]
    allow_insecure_transport: bool,

    /// JSON file with a list of connected apps to register at startup
    #[arg(long, env = "CONNECTED_APPS_FILE")]
    apps_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

fn read_apps_file(path: &Path) -> anyhow::Result<Vec<ConnectedAppSettings>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(host_url) = cli.host_url {
        config.host_url = host_url;
    }
    if let Some(user_header) = cli.user_header {
        config.user_header = user_header;
    }
    config.allow_insecure_transport |= cli.allow_insecure_transport;
    if !cli.admin_users.is_empty() {
        config.admin_users = parse_user_list(&cli.admin_users.join(","));
    }
    if config.admin_users.is_empty() {
        tracing::warn!("No admin users configured; connected apps can only be seeded from --apps-file");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host_url = %config.host(),
        insecure_transport = config.allow_insecure_transport,
        "Starting connected apps service"
    );

    let provider = ProviderClient::new(&config)?;
    let manager = TokenManager::new(Arc::new(MemoryRepository::new()), provider, config);

    if let Some(path) = cli.apps_file.as_deref() {
        for settings in read_apps_file(path)? {
            let provider_name = settings.provider_name.clone();
            manager
                .register_app(settings)
                .await
                .with_context(|| format!("registering {provider_name}"))?;
        }
    }

    ConnectedAppsServer::new(manager).run_http(cli.port).await
}
