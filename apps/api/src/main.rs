mod config;
mod errors;
mod formatting;
mod llm_client;
mod models;
mod render;
mod routes;
mod state;
mod transcripts;

#[cfg(test)]
mod test_utils;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::formatting::{ClaudeFormatter, TranscriptFormatter};
use crate::llm_client::{LlmClient, LlmSettings};
use crate::routes::build_app;
use crate::state::AppState;
use crate::transcripts::downloads::DownloadStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting transcript formatter v{}", env!("CARGO_PKG_VERSION"));

    if config.session_secret_generated {
        warn!("SESSION_SECRET not set; download links will not survive a restart");
    }

    // Initialize LLM client
    let llm = LlmClient::new(LlmSettings::from_config(&config))?;
    info!(
        "LLM client initialized (model: {}, attempts: {}, budget: {}s)",
        llm_client::MODEL,
        config.llm_max_attempts,
        config.llm_deadline().as_secs_f32()
    );

    let formatter: Arc<dyn TranscriptFormatter> = Arc::new(ClaudeFormatter::new(llm));

    // Parked documents for the two-step upload flow
    let downloads = DownloadStore::new(
        &config.scratch_dir,
        config.download_ttl,
        &config.session_secret,
    )?;
    let sweeper = downloads.spawn_sweeper(SWEEP_INTERVAL);
    info!("Download store at {}", downloads.path().display());

    let state = AppState {
        config: config.clone(),
        formatter,
        downloads,
    };

    let app = build_app(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
