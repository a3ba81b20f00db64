//! Scorecard API Server
//!
//! HTTP API serving advisor, store and market scorecards from the configured
//! dataset, plus health check and metrics endpoints.

use dotenvy::dotenv;
use scorecard::config::ServerConfig;
use scorecard::core::http::start_server;
use scorecard::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config = ServerConfig::from_env();
    let env = scorecard::config::get_environment();
    info!("Starting Scorecard API Server");
    info!(environment = %env, "Environment");
    info!(port = config.port, "HTTP Server: http://0.0.0.0:{}", config.port);
    if let Some(path) = &config.dataset_path {
        info!(dataset = %path.display(), "Dataset");
    }
    if let Some(path) = &config.field_map_path {
        info!(field_map = %path.display(), "Field map override");
    }

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(config).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
            info!("API server stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
