//! Game API server for the Apiary economy.
//!
//! This crate provides an Axum HTTP server exposing:
//!
//! - **Player endpoints** for registration, resync, and every economy
//!   operation (sell, buy, unlock, exchange, missions, spin)
//! - **Transaction endpoints** for withdrawal submission and deposit
//!   declaration
//! - **Administrative endpoints** for the approve/reject review queue
//! - **Leaderboard endpoints** for the yearly top 100 and exact ranks
//!
//! Every handler delegates to [`apiary_ledger::LedgerService`], which
//! owns all authoritative state; the server layer only maps requests and
//! errors to HTTP.

pub mod admin;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::AppState;
