//! Game API server lifecycle management.
//!
//! [`start_server`] binds to a TCP port and serves the router until the
//! process terminates. Transaction lifecycle events are drained into the
//! structured log; a notification collaborator would subscribe to the
//! same broadcast channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use apiary_types::TransactionEvent;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Read the bind address from `APIARY_HOST` / `APIARY_PORT`,
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("APIARY_HOST").unwrap_or(defaults.host),
            port: std::env::var("APIARY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

/// Errors that can occur when starting or running the game server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Start the game HTTP server.
///
/// Binds to the configured address, builds the router, spawns the
/// transaction event logger, and serves requests until the process is
/// terminated.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    tokio::spawn(log_transaction_events(Arc::clone(&state)));

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "apiary server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    Ok(())
}

/// Drain transaction lifecycle events into the log.
///
/// A delivery collaborator (email, push) would hold its own subscription
/// to the same channel; the server itself only records them.
async fn log_transaction_events(state: Arc<AppState>) {
    let mut events = state.service.subscribe_events();
    loop {
        match events.recv().await {
            Ok(TransactionEvent::Created { transaction }) => {
                info!(
                    transaction = %transaction.id,
                    player = %transaction.player,
                    "transaction created"
                );
            }
            Ok(TransactionEvent::Approved { transaction }) => {
                info!(transaction = %transaction.id, "transaction approved");
            }
            Ok(TransactionEvent::Rejected { transaction }) => {
                info!(transaction = %transaction.id, "transaction rejected");
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                info!(skipped, "transaction event logger lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
