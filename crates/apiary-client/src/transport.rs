//! Transport to the authoritative ledger.
//!
//! Defines an enum-based dispatch over the two ways a client reaches
//! the authority, avoiding the dyn-compatibility issues with async
//! trait methods. [`HttpTransport`] talks to a remote game server over
//! `reqwest`; [`LocalTransport`] drives an in-process
//! [`LedgerService`], which doubles as the offline test double through
//! its unreachability toggle.
//!
//! The reconciliation layer does not care which one it holds -- it
//! sends an operation and gets back an authoritative snapshot or a
//! classified failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use apiary_economy::PrizeEntry;
use apiary_ledger::{LedgerError, LedgerService};
use apiary_types::{
    ColonyKindId, ExchangeKind, LedgerSnapshot, MissionId, NewDeposit, NewWithdrawal, PlayerId,
    RequestToken, Transaction,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Per-request deadline for authoritative calls. Mutating requests are
/// never retried; a timeout is reported as an unknown outcome.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of an authoritative spin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinResult {
    /// The prize the wheel landed on.
    pub prize: PrizeEntry,
    /// Authoritative state after the ticket debit and award.
    pub snapshot: LedgerSnapshot,
}

/// Map a definitive ledger rejection onto the wire-shaped client error.
///
/// The status codes mirror what the game server answers for the same
/// failure, so callers see one shape regardless of transport.
pub(crate) fn rejection(err: LedgerError) -> ClientError {
    let status = match &err {
        LedgerError::Economy(apiary_economy::EconomyError::ArithmeticOverflow { .. })
        | LedgerError::EmptyPrizeTable => 500,
        LedgerError::Economy(_) => 400,
        LedgerError::PlayerNotFound(_) | LedgerError::TransactionNotFound(_) => 404,
        LedgerError::InvalidState { .. }
        | LedgerError::AlreadyUnlocked(_)
        | LedgerError::AlreadyClaimed(_)
        | LedgerError::DuplicateRequest(_)
        | LedgerError::DepositPending
        | LedgerError::SponsorAlreadySet(_) => 409,
    };
    ClientError::Rejected {
        status,
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unified transport enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// A connection to the authoritative ledger.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum Transport {
    /// Remote game server over HTTP.
    Http(HttpTransport),
    /// In-process ledger service.
    Local(LocalTransport),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Self::Http(t) => t.$method($($arg),*).await,
            Self::Local(t) => t.$method($($arg),*).await,
        }
    };
}

impl Transport {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Local(_) => "local",
        }
    }

    /// Register the player, optionally under a sponsor's referral code.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the sponsor link is refused.
    pub async fn register(
        &self,
        player: PlayerId,
        sponsor: Option<(PlayerId, String)>,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.register(player, sponsor))
    }

    /// Fetch the authoritative snapshot, rolling accrual forward.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with status 404 for an unknown
    /// player.
    pub async fn sync(&self, player: PlayerId) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.sync(player))
    }

    /// Sell honey for flowers and diamonds.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn sell_honey(
        &self,
        player: PlayerId,
        token: RequestToken,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.sell_honey(player, token, amount))
    }

    /// Buy one colony of the given kind.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn buy_colony(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ColonyKindId,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.buy_colony(player, token, kind))
    }

    /// Unlock a hive capacity tier.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn unlock_tier(
        &self,
        player: PlayerId,
        token: RequestToken,
        level: u8,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.unlock_tier(player, token, level))
    }

    /// Convert between currencies under a fixed exchange policy.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn exchange(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ExchangeKind,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.exchange(player, token, kind, amount))
    }

    /// Claim a one-time mission reward.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn claim_mission(
        &self,
        player: PlayerId,
        token: RequestToken,
        mission: MissionId,
    ) -> Result<LedgerSnapshot, ClientError> {
        dispatch!(self.claim_mission(player, token, mission))
    }

    /// Spend a ticket on the authoritative prize wheel.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn spin(
        &self,
        player: PlayerId,
        token: RequestToken,
    ) -> Result<SpinResult, ClientError> {
        dispatch!(self.spin(player, token))
    }

    /// Submit a withdrawal; the amount is escrowed server-side.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn submit_withdrawal(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewWithdrawal,
    ) -> Result<Transaction, ClientError> {
        dispatch!(self.submit_withdrawal(player, token, request))
    }

    /// Declare an external deposit awaiting review.
    ///
    /// # Errors
    ///
    /// Propagates the server's rejection or the transport failure.
    pub async fn declare_deposit(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewDeposit,
    ) -> Result<Transaction, ClientError> {
        dispatch!(self.declare_deposit(player, token, request))
    }

    /// The player's transaction history, newest first.
    ///
    /// # Errors
    ///
    /// Propagates the transport failure.
    pub async fn transactions_for(
        &self,
        player: PlayerId,
    ) -> Result<Vec<Transaction>, ClientError> {
        dispatch!(self.transactions_for(player))
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RegisterBody {
    sponsor: Option<PlayerId>,
    code: Option<String>,
}

#[derive(Serialize)]
struct SellBody {
    token: RequestToken,
    amount: Decimal,
}

#[derive(Serialize)]
struct BuyColonyBody {
    token: RequestToken,
    kind: ColonyKindId,
}

#[derive(Serialize)]
struct UnlockTierBody {
    token: RequestToken,
    level: u8,
}

#[derive(Serialize)]
struct ExchangeBody {
    token: RequestToken,
    kind: ExchangeKind,
    amount: Decimal,
}

#[derive(Serialize)]
struct ClaimMissionBody {
    token: RequestToken,
    mission: MissionId,
}

#[derive(Serialize)]
struct SpinBody {
    token: RequestToken,
}

#[derive(Serialize)]
struct WithdrawalBody {
    token: RequestToken,
    currency: apiary_types::WithdrawCurrency,
    amount: Decimal,
    address: String,
}

#[derive(Serialize)]
struct DepositBody {
    token: RequestToken,
    amount: Decimal,
    reference: String,
}

/// Transport that talks to a remote game server over HTTP.
///
/// Carries a bounded per-request timeout and never retries mutating
/// calls on its own.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given server base URL, such as
    /// `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// GETs are idempotent, so an unreachable server gets one retry.
    /// Mutating POSTs never do.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        match self.get_once(&url).await {
            Err(ClientError::NetworkUnavailable(_)) => decode(self.get_once(&url).await?).await,
            result => decode(result?).await,
        }
    }

    async fn get_once(&self, url: &str) -> Result<reqwest::Response, ClientError> {
        self.client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| classify(url, &e))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(&url, &e))?;
        decode(response).await
    }

    async fn register(
        &self,
        player: PlayerId,
        sponsor: Option<(PlayerId, String)>,
    ) -> Result<LedgerSnapshot, ClientError> {
        let (sponsor, code) = match sponsor {
            Some((sponsor, code)) => (Some(sponsor), Some(code)),
            None => (None, None),
        };
        self.post_json(
            &format!("/api/players/{player}"),
            &RegisterBody { sponsor, code },
        )
        .await
    }

    async fn sync(&self, player: PlayerId) -> Result<LedgerSnapshot, ClientError> {
        self.get_json(&format!("/api/players/{player}")).await
    }

    async fn sell_honey(
        &self,
        player: PlayerId,
        token: RequestToken,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/sell"),
            &SellBody { token, amount },
        )
        .await
    }

    async fn buy_colony(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ColonyKindId,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/colonies"),
            &BuyColonyBody { token, kind },
        )
        .await
    }

    async fn unlock_tier(
        &self,
        player: PlayerId,
        token: RequestToken,
        level: u8,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/tiers"),
            &UnlockTierBody { token, level },
        )
        .await
    }

    async fn exchange(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ExchangeKind,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/exchange"),
            &ExchangeBody {
                token,
                kind,
                amount,
            },
        )
        .await
    }

    async fn claim_mission(
        &self,
        player: PlayerId,
        token: RequestToken,
        mission: MissionId,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/missions"),
            &ClaimMissionBody { token, mission },
        )
        .await
    }

    async fn spin(&self, player: PlayerId, token: RequestToken) -> Result<SpinResult, ClientError> {
        self.post_json(&format!("/api/players/{player}/spin"), &SpinBody { token })
            .await
    }

    async fn submit_withdrawal(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewWithdrawal,
    ) -> Result<Transaction, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/withdrawals"),
            &WithdrawalBody {
                token,
                currency: request.currency,
                amount: request.amount,
                address: request.address,
            },
        )
        .await
    }

    async fn declare_deposit(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewDeposit,
    ) -> Result<Transaction, ClientError> {
        self.post_json(
            &format!("/api/players/{player}/deposits"),
            &DepositBody {
                token,
                amount: request.amount,
                reference: request.reference,
            },
        )
        .await
    }

    async fn transactions_for(&self, player: PlayerId) -> Result<Vec<Transaction>, ClientError> {
        self.get_json(&format!("/api/players/{player}/transactions"))
            .await
    }
}

/// Split reqwest failures into "never sent" and "outcome unknown".
fn classify(url: &str, err: &reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::UnknownOutcome(format!("{url}: {err}"))
    } else {
        ClientError::NetworkUnavailable(format!("{url}: {err}"))
    }
}

/// Decode a response body, turning non-success statuses into
/// [`ClientError::Rejected`] with the server's error message.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::UnknownOutcome(format!("reading response body: {e}")))?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|m| m.as_str()).map(str::to_owned))
            .unwrap_or(body);
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

/// Transport that drives a ledger service in the same process.
///
/// The `offline` toggle makes every call fail with
/// [`ClientError::NetworkUnavailable`], which is how the fallback paths
/// of the reconciliation layer are exercised without a network.
pub struct LocalTransport {
    service: Arc<LedgerService>,
    offline: AtomicBool,
}

impl LocalTransport {
    /// Wrap an in-process ledger service.
    pub fn new(service: Arc<LedgerService>) -> Self {
        Self {
            service,
            offline: AtomicBool::new(false),
        }
    }

    /// Toggle simulated unreachability.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), ClientError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::NetworkUnavailable(
                "local transport is offline".to_owned(),
            ));
        }
        Ok(())
    }

    async fn register(
        &self,
        player: PlayerId,
        sponsor: Option<(PlayerId, String)>,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        let now = Utc::now();
        let result = match sponsor {
            Some((sponsor, code)) => {
                self.service
                    .register_with_sponsor(player, sponsor, code, now)
                    .await
            }
            None => self.service.register(player, now).await,
        };
        result.map_err(rejection)
    }

    async fn sync(&self, player: PlayerId) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service.sync(player, Utc::now()).await.map_err(rejection)
    }

    async fn sell_honey(
        &self,
        player: PlayerId,
        token: RequestToken,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service
            .sell_honey(player, token, amount, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn buy_colony(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ColonyKindId,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service
            .buy_colony(player, token, kind, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn unlock_tier(
        &self,
        player: PlayerId,
        token: RequestToken,
        level: u8,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service
            .unlock_tier(player, token, level, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn exchange(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ExchangeKind,
        amount: Decimal,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service
            .exchange(player, token, kind, amount, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn claim_mission(
        &self,
        player: PlayerId,
        token: RequestToken,
        mission: MissionId,
    ) -> Result<LedgerSnapshot, ClientError> {
        self.guard()?;
        self.service
            .claim_mission(player, token, mission, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn spin(&self, player: PlayerId, token: RequestToken) -> Result<SpinResult, ClientError> {
        self.guard()?;
        let outcome = self
            .service
            .spin(player, token, Utc::now())
            .await
            .map_err(rejection)?;
        Ok(SpinResult {
            prize: outcome.prize,
            snapshot: outcome.snapshot,
        })
    }

    async fn submit_withdrawal(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewWithdrawal,
    ) -> Result<Transaction, ClientError> {
        self.guard()?;
        self.service
            .submit_withdrawal(player, token, request, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn declare_deposit(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewDeposit,
    ) -> Result<Transaction, ClientError> {
        self.guard()?;
        self.service
            .declare_deposit(player, token, request, Utc::now())
            .await
            .map_err(rejection)
    }

    async fn transactions_for(&self, player: PlayerId) -> Result<Vec<Transaction>, ClientError> {
        self.guard()?;
        Ok(self.service.transactions_for(player).await)
    }
}
