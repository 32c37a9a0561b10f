//! dqv-validator - Delivery Quantity Validation service
//!
//! **Module Identity:**
//! - Name: dqv-validator
//! - Port: 5801 (default)
//!
//! Checks the quantity declared on a delivery record against the supporting
//! document: deterministic number extraction and tolerance matching first,
//! then an optional reasoning pass that can confirm or overrule it.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dqv_common::config::{load_bootstrap_config, resolve_root_folder, TomlConfig};
use dqv_common::time::secs_to_duration;
use dqv_validator::collaborators::{document_store_from_config, text_extractor_from_config};
use dqv_validator::config::{engine_config, resolve_api_key, OCR_API_KEY_ENV, REASONING_API_KEY_ENV};
use dqv_validator::services::ValidationOrchestrator;
use dqv_validator::{contextual, AppState};

/// Command-line arguments for dqv-validator
#[derive(Parser, Debug)]
#[command(name = "dqv-validator")]
#[command(about = "Delivery quantity validation service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML `port`)
    #[arg(short, long, env = "DQV_PORT")]
    port: Option<u16>,

    /// Root folder for the result database and local documents
    #[arg(short, long, env = "DQV_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML config file
    #[arg(short, long, env = "DQV_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_bootstrap_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG overrides the TOML level
    let default_filter = format!(
        "dqv_validator={},dqv_common={},tower_http=info",
        toml_config.logging.level, toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dqv-validator (Delivery Quantity Validation)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "DQV_ROOT_FOLDER", &toml_config);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let db_path = root_folder.join("dqv.db");
    let db = dqv_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize result database")?;
    info!("Database: {}", db_path.display());

    let orchestrator = build_orchestrator(&toml_config, &root_folder, db)?;
    let state = AppState::new(Arc::new(orchestrator));
    let app = dqv_validator::build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wire the configured collaborators into the engine
fn build_orchestrator(
    toml_config: &TomlConfig,
    root_folder: &std::path::Path,
    db: sqlx::SqlitePool,
) -> Result<ValidationOrchestrator> {
    let timeouts = &toml_config.timeouts;

    let store = document_store_from_config(
        &toml_config.storage,
        root_folder,
        secs_to_duration(timeouts.storage_secs),
    )
    .context("Invalid [storage] configuration")?;
    info!(store = store.name(), "Document store ready");

    let ocr_key = resolve_api_key(OCR_API_KEY_ENV, toml_config.ocr.api_key.as_deref(), "OCR");
    let ocr = text_extractor_from_config(&toml_config.ocr, ocr_key, secs_to_duration(timeouts.ocr_secs))
        .context("Invalid [ocr] configuration")?;
    info!(extractor = ocr.name(), "Text extractor ready");

    let reasoning_key = resolve_api_key(
        REASONING_API_KEY_ENV,
        toml_config.reasoning.api_key.as_deref(),
        "Reasoning",
    );
    let reasoning = contextual::from_config(
        &toml_config.reasoning,
        reasoning_key,
        secs_to_duration(timeouts.reasoning_secs),
    )
    .context("Invalid [reasoning] configuration")?;
    if reasoning.is_enabled() {
        info!(provider = reasoning.name(), "Reasoning validator ready");
    } else {
        warn!("No reasoning provider configured; results rely on deterministic matching only");
    }

    Ok(ValidationOrchestrator::new(
        engine_config(toml_config),
        store,
        ocr,
        reasoning,
        db,
    ))
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
