//! Axum router construction for the game API.
//!
//! Assembles the player, admin, and leaderboard routes into a single
//! [`Router`] with CORS middleware enabled for the browser client.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the game server.
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Catalog
        .route("/api/catalog", get(handlers::get_catalog))
        // Player lifecycle and economy
        .route(
            "/api/players/{id}",
            post(handlers::register).get(handlers::sync),
        )
        .route(
            "/api/players/{id}/transactions",
            get(handlers::list_transactions),
        )
        .route("/api/players/{id}/sell", post(handlers::sell_honey))
        .route("/api/players/{id}/colonies", post(handlers::buy_colony))
        .route("/api/players/{id}/tiers", post(handlers::unlock_tier))
        .route("/api/players/{id}/exchange", post(handlers::exchange))
        .route("/api/players/{id}/missions", post(handlers::claim_mission))
        .route("/api/players/{id}/spin", post(handlers::spin))
        .route(
            "/api/players/{id}/withdrawals",
            post(handlers::submit_withdrawal),
        )
        .route(
            "/api/players/{id}/deposits",
            post(handlers::declare_deposit),
        )
        // Leaderboard
        .route("/api/leaderboard/{year}", get(handlers::leaderboard_top))
        .route(
            "/api/leaderboard/{year}/players/{id}",
            get(handlers::leaderboard_rank),
        )
        // Administrative review queue
        .route(
            "/api/admin/transactions",
            get(admin::pending_transactions),
        )
        .route(
            "/api/admin/transactions/{id}/approve",
            post(admin::approve),
        )
        .route("/api/admin/transactions/{id}/reject", post(admin::reject))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
