//! aggrd - Query Aggregator Daemon
//!
//! Serves device, hub and process listings composed from the permission
//! search index, device repository, connection log, process services and
//! event manager.
//!
//! Usage:
//!   aggrd [config.toml]
//!
//! Without a config file the built-in defaults plus environment overrides
//! are used.

mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use aggr_api::{create_router, AppState};
use aggr_client::{
    ConnectionLogClient, EventStateClient, ProcessClient, RegistryClient, SearchClient,
};
use aggr_gateway::{Aggregator, Backends};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AggregatordConfig, LogFormat};

const DEFAULT_LOG_FILTER: &str = "aggrd=info,aggr_api=info,aggr_gateway=info,aggr_client=info";

/// Parsed command-line arguments
struct Args {
    /// Server config file (TOML)
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let mut result = Args { config_path: None };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
            }
            other => eprintln!("Unknown argument: {}", other),
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"aggrd - Query Aggregator Daemon

Usage: aggrd [config.toml]

Options:
  -h, --help    Print this help message

Environment:
  RUST_LOG                 tracing filter (default: {DEFAULT_LOG_FILTER})
  SERVER_PORT, LOG_FORMAT, LEGACY_ROUTES, FAIL_OPEN_LIVENESS,
  PERMISSION_SEARCH_URL, DEVICE_REPO_URL, CONNECTION_LOG_URL,
  PROCESS_ENGINE_URL, PROCESS_DEPLOYMENT_URL, EVENT_MANAGER_URL,
  BACKEND_TIMEOUT_MS       override the matching config values
"#
    );
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    );
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Build one client per backend from the config
fn create_backends(config: &AggregatordConfig) -> anyhow::Result<Backends> {
    let urls = &config.backends;

    let search = SearchClient::new(&urls.client(&urls.permission_search_url))
        .context("permission-search client")?;
    let registry = RegistryClient::new(search.clone(), &urls.client(&urls.device_repo_url))
        .context("device-repository client")?;
    let connection_log = ConnectionLogClient::new(&urls.client(&urls.connection_log_url))
        .context("connection-log client")?;
    let processes = ProcessClient::new(
        &urls.client(&urls.process_engine_url),
        &urls.client(&urls.process_deployment_url),
    )
    .context("process clients")?;
    let events = EventStateClient::new(&urls.client(&urls.event_manager_url))
        .context("event-manager client")?;

    Ok(Backends {
        search: Arc::new(search),
        registry: Arc::new(registry),
        connection_log: Arc::new(connection_log),
        processes: Arc::new(processes),
        events: Arc::new(events),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();
    let config = AggregatordConfig::load(args.config_path.as_deref().map(Path::new))?;

    init_tracing(config.server.log_format);
    tracing::info!("Starting aggrd (Query Aggregator Daemon)");
    match &args.config_path {
        Some(path) => tracing::info!("Loaded config from: {}", path),
        None => tracing::info!("No config file provided, using defaults and environment"),
    }
    tracing::debug!(?config, "Effective configuration");

    let backends = create_backends(&config)?;
    let aggregator = Aggregator::new(backends, config.aggregator_options());
    let state = AppState::new(aggregator).with_legacy_routes(config.features.legacy_routes);
    if config.features.legacy_routes {
        tracing::info!("Legacy routes enabled");
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
