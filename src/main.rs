//! Newsdesk newsletter service
//!
//! HTTP service that assembles daily editions from the article pool,
//! fills them with AI-written content, renders them to email HTML and
//! delivers them to confirmed subscribers, with open/click tracking.

mod clients;
mod config;
mod db;
mod errors;
mod metrics;
mod middleware;
mod routes;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::clients::{create_chat_client, create_email_client};
use crate::config::AppConfig;
use crate::db::Repository;
use crate::services::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting newsdesk v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(config);

    // Connect to the database
    info!("Connecting to database...");
    let repo = Repository::new(&config.database).await?;

    // Outbound clients
    let chat = create_chat_client(&config.chat)?;
    let email = create_email_client(&config.email)?;

    let state = AppState::new(repo, chat, email, config.clone());

    // Build the router
    let app = routes::create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
