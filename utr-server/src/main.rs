//! Unlearning to Rest study server
//!
//! Serves the participant-facing study screens and their JSON API.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use utr_common::config::{ConfigOverrides, ConfigSource, StudyConfig};
use utr_server::services::{ProviderRegistry, ReplicateClient};
use utr_server::{build_router, db, logging, AppState};

/// Connect timeout for upstream model and image calls
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Command-line arguments for utr-server
#[derive(Parser, Debug)]
#[command(name = "utr-server")]
#[command(about = "Unlearning to Rest user study server")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "UTR_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "PORT")]
    port: u16,

    /// Folder holding the database, generated images and moodboard uploads
    #[arg(short, long, env = "UTR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Folder with the static study frontend
    #[arg(long, env = "UTR_FRONTEND_DIR")]
    frontend_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "UTR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    dotenv::dotenv().ok();
    let args = Args::parse();

    let overrides = ConfigOverrides {
        root_folder: args.root_folder.clone(),
        frontend_dir: args.frontend_dir.clone(),
        config_file: args.config.clone(),
    };
    let config = StudyConfig::resolve(&overrides).context("Failed to resolve configuration")?;

    let _log_guard = logging::init_tracing(&config.log_level, config.log_file.as_deref())
        .context("Failed to initialize logging")?;

    // Build identification goes out before any slow startup work
    info!(
        "Starting Unlearning to Rest study server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config.config_source {
        ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
        ConfigSource::Ignored { path, reason } => {
            warn!("Ignoring config file {}: {}", path.display(), reason)
        }
        ConfigSource::Defaults => info!("No config file found, using defaults"),
    }
    info!("Root folder: {}", config.root_folder.display());
    info!("Frontend folder: {}", config.frontend_dir.display());
    config
        .ensure_directories()
        .context("Failed to create root folder layout")?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    let pool = match db::init_database(&db_path, &config.catalog).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!("utr-server/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")?;

    let providers = ProviderRegistry::from_config(&config, http.clone());
    if config.secrets.replicate_api_token.is_none() {
        info!("REPLICATE_API_TOKEN not set; image generation will fail");
    }
    let images = Arc::new(ReplicateClient::new(
        http,
        config.secrets.replicate_api_token.clone(),
    ));

    let state = AppState::new(pool, config, providers, images);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("utr-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
