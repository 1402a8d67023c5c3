//! ayur-api - AyurDrishti backend microservice
//!
//! Identifies plants from uploaded photos via Pl@ntNet (or an offline mock),
//! enriches the result from a local JSON knowledge store, and answers basic
//! wellness questions with canned tips.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ayur_common::config::{load_toml_config, CliOverrides, ServiceConfig};
use ayur_api::plantnet::provider_from_config;
use ayur_api::store::{JsonFileStore, KnowledgeStore};
use ayur_api::{bind_listener, build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ayur-api
///
/// Unset options fall back to environment variables, then the TOML config
/// file, then compiled defaults.
#[derive(Parser, Debug)]
#[command(name = "ayur-api")]
#[command(about = "AyurDrishti plant identification backend")]
#[command(version)]
struct Args {
    /// Port to listen on [env: AYUR_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind [env: AYUR_HOST]
    #[arg(long)]
    host: Option<String>,

    /// Directory holding plants.json [env: AYUR_DATA_DIR]
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// TOML config file (default: ~/.config/ayurdrishti/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pl@ntNet project / flora [env: PLANTNET_PROJECT]
    #[arg(long)]
    project: Option<String>,

    /// Pl@ntNet identify base URL [env: PLANTNET_BASE_URL]
    #[arg(long)]
    base_url: Option<String>,

    /// Force offline mock identification [env: MOCK_MODE]
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Credential usually lives in a local .env
    let dotenv_loaded = dotenv::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ayur_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AyurDrishti backend (ayur-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if dotenv_loaded {
        info!("Loaded environment from .env");
    }

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let cli = CliOverrides {
        plantnet_api_key: None,
        plantnet_project: args.project,
        plantnet_base_url: args.base_url,
        mock_mode: args.mock,
        data_dir: args.data_dir,
        host: args.host,
        port: args.port,
    };
    let config = ServiceConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;

    // Knowledge store: create if missing, refuse to start on a corrupt document
    let store = Arc::new(JsonFileStore::new(config.store_path()));
    store
        .ensure_initialized()
        .await
        .context("Failed to initialize knowledge store")?;
    let records = store
        .read()
        .await
        .context("Knowledge store is unreadable")?
        .len();
    info!("Knowledge store: {} ({} records)", store.path().display(), records);

    let provider = provider_from_config(&config).context("Failed to create identification client")?;
    if config.use_mock() {
        if config.mock_mode {
            info!("Mock mode enabled: identification runs offline");
        } else {
            warn!("PLANTNET_API_KEY not set: falling back to offline mock identification");
        }
    } else {
        info!(
            "Identification via Pl@ntNet project '{}' at {}",
            config.plantnet_project, config.plantnet_base_url
        );
    }

    let state = AppState::new(provider, store);
    let app = build_router(state);

    let listener = bind_listener(&config.host, config.port)
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.host, config.port))?;
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("ayur-api listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
