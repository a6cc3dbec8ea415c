//! cgm-ui - congregation dashboard server
//!
//! Serves the JSON API, CSV exports and the SSE event stream over one
//! SQLite database in the resolved root folder.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cgm_common::config::{
    config_file_path, read_config_file, ConfigFile, RootFolderInitializer, RootFolderResolver,
};
use cgm_common::db::init_database;
use cgm_common::events::EventBus;
use cgm_ui::services::WorkbookClient;
use cgm_ui::{build_router, AppState};

const MODULE_NAME: &str = "dashboard";
const DEFAULT_LOG_FILTER: &str = "cgm_ui=info,cgm_common=info,tower_http=info";
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "cgm-ui", version, about = "Congregation management dashboard")]
struct Args {
    /// Folder holding the database
    #[arg(long, env = "CGM_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Listen port (default from config file, then 5780)
    #[arg(long, env = "CGM_PORT")]
    port: Option<u16>,

    /// Bind address (default from config file, then 127.0.0.1)
    #[arg(long, env = "CGM_BIND")]
    bind: Option<String>,

    /// TOML config file (default: <config dir>/cgm/dashboard.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging level may come from the file, so the lookup is reported below
    // once the subscriber is installed
    let config_path = args.config.clone().or_else(|| config_file_path(MODULE_NAME));
    let file_config = match &config_path {
        Some(path) => Some(read_config_file(path)?),
        None => None,
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = match &file_config {
                Some(ConfigFile::Loaded(c)) => c.logging.level.as_str(),
                _ => DEFAULT_LOG_FILTER,
            };
            EnvFilter::try_new(directive).with_context(|| format!("invalid log filter '{}'", directive))?
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting cgm-ui v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match (&config_path, &file_config) {
        (Some(path), Some(ConfigFile::Loaded(_))) => info!("Config file: {}", path.display()),
        (Some(path), Some(ConfigFile::Missing)) => {
            warn!("Config file {} not found, using defaults", path.display())
        }
        _ => info!("No config directory on this platform, using defaults"),
    }
    let config = file_config.map(ConfigFile::into_config).unwrap_or_default();

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_config_path(args.config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = init_database(&db_path).await?;

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let workbook = WorkbookClient::new(config.workbook.clone()).context("failed to build workbook client")?;

    let state = AppState::new(db.clone(), event_bus, workbook);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("cgm-ui listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("cgm-ui stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
