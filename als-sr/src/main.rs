//! als-sr (Strategy Recommender) - adaptive learning strategy service
//!
//! Startup: load config, resolve the data folder, load the dataset, load or build
//! the short-form selection, build the correlation model, then serve HTTP.

use als_common::arbitration::TieArbitrator;
use als_common::config::{load_toml_config, resolve_data_folder, DEFAULT_PORT};
use als_sr::llm::OpenAiArbitrator;
use als_sr::{build_router, cache, dataset::Dataset, logging, AppState, RecommendationService};
use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "als-sr")]
#[command(about = "Adaptive learning strategy recommender")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ALS_SR_PORT")]
    port: Option<u16>,

    /// Data folder holding the dataset and selection cache
    #[arg(short, long, env = "ALS_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Configuration file (default: <config dir>/als/config.toml)
    #[arg(short, long, env = "ALS_CONFIG")]
    config: Option<PathBuf>,

    /// Ignore the selection cache and rebuild the short forms
    #[arg(long)]
    rebuild_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing before anything logs
    let log_filter = logging::init_tracing();

    let args = Args::parse();
    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    log_filter.apply_config_level(&config.logging.level);

    info!("Starting ALS Strategy Recommender (als-sr) v{}", env!("CARGO_PKG_VERSION"));

    let data_folder = resolve_data_folder(args.data_folder.as_deref(), &config);
    info!("Data folder: {}", data_folder.display());

    let dataset_path = config.dataset_path(&data_folder);
    info!("Dataset: {}", dataset_path.display());
    let dataset = Dataset::load(&dataset_path).context("Failed to load dataset")?;

    let params = config.engine.clone();
    let cache_path = config.cache_path(&data_folder);
    let selection = cache::load_or_build(&cache_path, &dataset, &params, args.rebuild_cache)
        .context("Failed to prepare short-form selection")?;

    let arbitrator = OpenAiArbitrator::from_config(&config.llm)
        .map(|client| Arc::new(client) as Arc<dyn TieArbitrator>);

    let service = RecommendationService::new(dataset, selection, params, arbitrator)
        .context("Failed to build recommendation model")?;
    let state = AppState::new(service, StdRng::from_entropy());
    let app = build_router(state);

    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("als-sr listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

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
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
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
