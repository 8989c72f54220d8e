//! Administrative REST handlers for the transaction review queue.
//!
//! These endpoints sit apart from the player API: they are called by the
//! back office, not the game client, and would be protected by operator
//! authentication in a deployment.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/admin/transactions` | Pending transactions, oldest first |
//! | `POST` | `/api/admin/transactions/{id}/approve` | Approve a pending transaction |
//! | `POST` | `/api/admin/transactions/{id}/reject` | Reject and refund escrow |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use apiary_types::TransactionId;

use crate::error::ApiError;
use crate::state::AppState;

/// Pending transactions awaiting review, oldest first.
pub async fn pending_transactions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.pending_transactions().await)
}

/// Approve a pending transaction.
///
/// Withdrawals keep their escrow as a permanent debit; deposits credit
/// the declared amount minus the flat fee. A terminal transaction
/// returns `409 Conflict`.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TransactionId>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.service.approve_transaction(id, Utc::now()).await?;
    Ok(Json(transaction))
}

/// Reject a pending transaction, refunding any escrow in the currency
/// that was debited. A terminal transaction returns `409 Conflict`.
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TransactionId>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.service.reject_transaction(id, Utc::now()).await?;
    Ok(Json(transaction))
}
