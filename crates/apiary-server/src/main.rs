//! Game server entry point.
//!
//! Initializes structured logging, loads the economy configuration,
//! builds the ledger service, and serves the API until terminated.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use apiary_economy::EconomyConfig;
use apiary_ledger::LedgerService;
use apiary_server::{start_server, AppState, ServerConfig};

/// Default location of the economy configuration file.
const DEFAULT_CONFIG_PATH: &str = "apiary-economy.yaml";

/// Application entry point.
///
/// The economy configuration is read from the path in `APIARY_CONFIG`
/// (default `apiary-economy.yaml`); a missing file falls back to the
/// built-in defaults so a bare checkout still runs.
///
/// # Errors
///
/// Returns an error if the configuration file is malformed or the
/// server cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("apiary-server starting");

    let config_path =
        std::env::var("APIARY_CONFIG").unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
    let economy = if Path::new(&config_path).exists() {
        info!(path = %config_path, "loading economy configuration");
        EconomyConfig::from_file(Path::new(&config_path))?
    } else {
        info!(path = %config_path, "no config file, using built-in defaults");
        EconomyConfig::default()
    };

    let state = Arc::new(AppState::new(LedgerService::new(economy)));
    let server_config = ServerConfig::from_env();

    start_server(&server_config, state).await?;
    Ok(())
}
