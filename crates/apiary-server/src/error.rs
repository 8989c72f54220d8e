//! Error types for the game API server.
//!
//! [`ApiError`] wraps the ledger-layer taxonomy and maps each variant to
//! an HTTP status via its [`IntoResponse`](axum::response::IntoResponse)
//! implementation. Validation failures surface as 400 with the rule
//! engine's message so the client can show it to the player verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use apiary_economy::EconomyError;
use apiary_ledger::LedgerError;

/// Errors that can occur in the game API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A ledger or economy operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An invalid path or query parameter was provided.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Ledger(err) => match err {
                LedgerError::Economy(economy) => match economy {
                    EconomyError::InsufficientBalance { .. }
                    | EconomyError::BelowMinimumThreshold { .. }
                    | EconomyError::NonPositiveAmount { .. }
                    | EconomyError::UnknownColonyKind(_)
                    | EconomyError::UnknownTier(_)
                    | EconomyError::UnknownMission(_)
                    | EconomyError::EmptyAddress => StatusCode::BAD_REQUEST,
                    EconomyError::ArithmeticOverflow { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                LedgerError::PlayerNotFound(_) | LedgerError::TransactionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LedgerError::InvalidState { .. }
                | LedgerError::AlreadyUnlocked(_)
                | LedgerError::AlreadyClaimed(_)
                | LedgerError::DuplicateRequest(_)
                | LedgerError::DepositPending
                | LedgerError::SponsorAlreadySet(_) => StatusCode::CONFLICT,
                LedgerError::EmptyPrizeTable => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
