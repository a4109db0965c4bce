//! Voice Agent Service - Main Entry Point

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use va_agent::agent::NullPipeline;
use va_agent::{api, config, session};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for WebRTC)
    // This must happen before any TLS/WebRTC operations
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "va_agent=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration; fails fast when required credentials are absent
    dotenvy::dotenv().ok();
    let config = Arc::new(config::Config::from_env()?);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Voice Agent API"
    );

    // The speech pipeline ships as the null reference implementation; a
    // real STT/LLM/TTS backend drops in here.
    let registry = session::SessionRegistry::new(Arc::clone(&config), Arc::new(NullPipeline))?;

    let state = api::AppState::new(Arc::clone(&registry), Arc::clone(&config));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Process shutdown destroys all remaining sessions.
    registry.shutdown().await;

    info!("Server shutdown complete");

    Ok(())
}
