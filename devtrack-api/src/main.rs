//! `DevTrack` API server -- in-memory REST backend for local development.
//!
//! Serves the auth, project and task endpoints under `/api`. Nothing is
//! persisted; restarting the server starts from an empty store.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000
//! cargo run --bin devtrack-api
//!
//! # Run on custom address
//! cargo run --bin devtrack-api -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! DEVTRACK_API_ADDR=127.0.0.1:8080 cargo run --bin devtrack-api
//! ```

use std::sync::Arc;

use clap::Parser;
use devtrack_api::config::{ApiCliArgs, ApiConfig};
use devtrack_api::server::{self, ApiState};

#[tokio::main]
async fn main() {
    let cli = ApiCliArgs::parse();

    let config = match ApiConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting devtrack api server");

    let state = Arc::new(ApiState::with_config(
        config.default_page_size,
        config.max_page_size,
        config.register_issues_token,
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "api server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "api server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start api server");
            std::process::exit(1);
        }
    }
}
