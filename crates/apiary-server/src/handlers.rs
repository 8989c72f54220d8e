//! REST API endpoint handlers for the game server.
//!
//! Every mutating endpoint takes a [`MutationEnvelope`] token in its
//! body; replays of the same token return `409 Conflict` without being
//! re-applied. Every operation that touches a ledger returns the full
//! authoritative [`LedgerSnapshot`] so the client can overwrite its
//! local cache wholesale.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/catalog` | Static economy catalog |
//! | `POST` | `/api/players/{id}` | Register (optionally under a sponsor) |
//! | `GET` | `/api/players/{id}` | Accrue and return the ledger snapshot |
//! | `GET` | `/api/players/{id}/transactions` | Transaction history |
//! | `POST` | `/api/players/{id}/sell` | Sell honey |
//! | `POST` | `/api/players/{id}/colonies` | Buy a bee colony |
//! | `POST` | `/api/players/{id}/tiers` | Unlock a hive tier |
//! | `POST` | `/api/players/{id}/exchange` | Exchange currencies |
//! | `POST` | `/api/players/{id}/missions` | Claim a mission reward |
//! | `POST` | `/api/players/{id}/spin` | Spend a ticket on the wheel |
//! | `POST` | `/api/players/{id}/withdrawals` | Submit a withdrawal |
//! | `POST` | `/api/players/{id}/deposits` | Declare a deposit |
//! | `GET` | `/api/leaderboard/{year}` | Top of the yearly board |
//! | `GET` | `/api/leaderboard/{year}/players/{id}` | Exact rank for one player |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;

use apiary_economy::{ColonyKind, HiveTier, Mission, PrizeEntry};
use apiary_types::{
    ColonyKindId, ExchangeKind, LedgerSnapshot, MissionId, NewDeposit, NewWithdrawal, PlayerId,
    RequestToken, WithdrawCurrency,
};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body for `POST /api/players/{id}`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RegisterRequest {
    /// Sponsoring player, when joining through a referral code.
    pub sponsor: Option<PlayerId>,
    /// The referral code used, recorded on the link.
    pub code: Option<String>,
}

/// Body for `POST /api/players/{id}/sell`.
#[derive(Debug, serde::Deserialize)]
pub struct SellRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// Honey amount to sell.
    pub amount: Decimal,
}

/// Body for `POST /api/players/{id}/colonies`.
#[derive(Debug, serde::Deserialize)]
pub struct BuyColonyRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// Colony kind to purchase.
    pub kind: ColonyKindId,
}

/// Body for `POST /api/players/{id}/tiers`.
#[derive(Debug, serde::Deserialize)]
pub struct UnlockTierRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// Hive tier level to unlock.
    pub level: u8,
}

/// Body for `POST /api/players/{id}/exchange`.
#[derive(Debug, serde::Deserialize)]
pub struct ExchangeRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// The exchange policy to apply.
    pub kind: ExchangeKind,
    /// Source-currency amount to convert.
    pub amount: Decimal,
}

/// Body for `POST /api/players/{id}/missions`.
#[derive(Debug, serde::Deserialize)]
pub struct ClaimMissionRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// The mission to claim.
    pub mission: MissionId,
}

/// Body for `POST /api/players/{id}/spin`.
#[derive(Debug, serde::Deserialize)]
pub struct SpinRequest {
    /// Idempotency token.
    pub token: RequestToken,
}

/// Body for `POST /api/players/{id}/withdrawals`.
#[derive(Debug, serde::Deserialize)]
pub struct WithdrawalRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// The currency to withdraw.
    pub currency: WithdrawCurrency,
    /// Amount in the escrow currency.
    pub amount: Decimal,
    /// Destination wallet address or account.
    pub address: String,
}

/// Body for `POST /api/players/{id}/deposits`.
#[derive(Debug, serde::Deserialize)]
pub struct DepositRequest {
    /// Idempotency token.
    pub token: RequestToken,
    /// Declared flower amount of the external payment.
    pub amount: Decimal,
    /// External payment reference.
    pub reference: String,
}

/// Response for `GET /api/catalog`.
#[derive(Debug, serde::Serialize)]
pub struct CatalogResponse {
    /// Purchasable colony kinds.
    pub colonies: Vec<ColonyKind>,
    /// Unlockable hive tiers.
    pub tiers: Vec<HiveTier>,
    /// Claimable missions.
    pub missions: Vec<Mission>,
    /// Spin-wheel prize table.
    pub prizes: Vec<PrizeEntry>,
}

/// Response for `POST /api/players/{id}/spin`.
#[derive(Debug, serde::Serialize)]
pub struct SpinResponse {
    /// The prize that was drawn.
    pub prize: PrizeEntry,
    /// Authoritative state after the ticket debit and award.
    pub snapshot: LedgerSnapshot,
}

/// Response for `GET /api/leaderboard/{year}/players/{id}`.
#[derive(Debug, serde::Serialize)]
pub struct RankResponse {
    /// One-based rank over the full score set, if the player scored.
    pub rank: Option<usize>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Return the static economy catalog the client renders its shop from.
pub async fn get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.service.config();
    Json(CatalogResponse {
        colonies: config.production.colonies.clone(),
        tiers: config.production.tiers.clone(),
        missions: config.missions.clone(),
        prizes: config.prizes.clone(),
    })
}

// ---------------------------------------------------------------------------
// Registration and sync
// ---------------------------------------------------------------------------

/// Register a player, optionally under a sponsor.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let snapshot = match body.sponsor {
        Some(sponsor) => {
            let code = body.code.unwrap_or_default();
            state
                .service
                .register_with_sponsor(player, sponsor, code, now)
                .await?
        }
        None => state.service.register(player, now).await?,
    };
    Ok(Json(snapshot))
}

/// Roll accrual forward and return the authoritative snapshot.
///
/// This is the endpoint the client's periodic resync polls.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.service.sync(player, Utc::now()).await?;
    Ok(Json(snapshot))
}

/// A player's transaction history, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
) -> impl IntoResponse {
    Json(state.service.transactions_for(player).await)
}

// ---------------------------------------------------------------------------
// Economy operations
// ---------------------------------------------------------------------------

/// Sell honey for flowers and diamonds.
pub async fn sell_honey(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<SellRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .service
        .sell_honey(player, body.token, body.amount, Utc::now())
        .await?;
    Ok(Json(snapshot))
}

/// Buy one bee colony of the requested kind.
pub async fn buy_colony(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<BuyColonyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .service
        .buy_colony(player, body.token, body.kind, Utc::now())
        .await?;
    Ok(Json(snapshot))
}

/// Unlock a hive capacity tier.
pub async fn unlock_tier(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<UnlockTierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .service
        .unlock_tier(player, body.token, body.level, Utc::now())
        .await?;
    Ok(Json(snapshot))
}

/// Exchange one currency for another, all-or-nothing.
pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<ExchangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .service
        .exchange(player, body.token, body.kind, body.amount, Utc::now())
        .await?;
    Ok(Json(snapshot))
}

/// Claim a one-time mission reward.
pub async fn claim_mission(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<ClaimMissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .service
        .claim_mission(player, body.token, body.mission, Utc::now())
        .await?;
    Ok(Json(snapshot))
}

/// Spend one ticket on the prize wheel. The draw runs server-side only.
pub async fn spin(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<SpinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.spin(player, body.token, Utc::now()).await?;
    Ok(Json(SpinResponse {
        prize: outcome.prize,
        snapshot: outcome.snapshot,
    }))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Submit a withdrawal; the requested amount is escrowed immediately.
pub async fn submit_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<WithdrawalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = NewWithdrawal {
        currency: body.currency,
        amount: body.amount,
        address: body.address,
    };
    let transaction = state
        .service
        .submit_withdrawal(player, body.token, request, Utc::now())
        .await?;
    Ok(Json(transaction))
}

/// Declare an external deposit awaiting administrative review.
pub async fn declare_deposit(
    State(state): State<Arc<AppState>>,
    Path(player): Path<PlayerId>,
    Json(body): Json<DepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = NewDeposit {
        amount: body.amount,
        reference: body.reference,
    };
    let transaction = state
        .service
        .declare_deposit(player, body.token, request, Utc::now())
        .await?;
    Ok(Json(transaction))
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// The top 100 of the yearly board, best first.
pub async fn leaderboard_top(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    Json(state.service.leaderboard_top(year).await)
}

/// A single player's exact rank, computed over the full score set.
pub async fn leaderboard_rank(
    State(state): State<Arc<AppState>>,
    Path((year, player)): Path<(i32, PlayerId)>,
) -> impl IntoResponse {
    let rank = state.service.leaderboard_rank(year, player).await;
    Json(RankResponse { rank })
}
