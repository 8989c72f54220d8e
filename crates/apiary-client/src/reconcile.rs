//! Optimistic reconciliation between the local cache and the server.
//!
//! Every mutation follows the same shape: check the preconditions
//! against the cached ledger with the exact rules the server applies,
//! send the authoritative request under a fresh idempotency token, and
//! overwrite the cache wholesale with the server's snapshot. If the
//! server was never reached, cosmetic operations fall back to a
//! provisional local apply that the next resync overwrites; operations
//! that only the server can decide, such as the prize draw and the
//! escrow lifecycle, fail outright instead.
//!
//! Two background timers keep the cache alive: a fast local accrual
//! tick so honey visibly grows, and a slower resync that pulls the
//! authoritative state.

use std::sync::Arc;
use std::time::Duration;

use apiary_economy::{EconomyConfig, EconomyError, balances, conversion, production};
use apiary_ledger::LedgerError;
use apiary_types::{
    ColonyKindId, Currency, ExchangeKind, LedgerSnapshot, MissionId, NewDeposit, NewWithdrawal,
    PlayerId, PlayerLedger, RequestToken, Transaction,
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::cache::{CachedLedger, LedgerCache};
use crate::error::ClientError;
use crate::transport::{SpinResult, Transport, rejection};

/// Cadence of the local accrual tick.
pub const ACCRUAL_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence of the authoritative resync.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Game client
// ---------------------------------------------------------------------------

/// The client-side face of the economy.
///
/// Holds the transport, the cached ledger, and a copy of the economy
/// configuration so preconditions and fallbacks run the same rules the
/// server does. With no player identity the client operates in
/// local-only mode: every change is provisional and nothing is sent.
pub struct GameClient {
    transport: Transport,
    config: EconomyConfig,
    cache: Arc<LedgerCache>,
    player: Option<PlayerId>,
}

/// Handles for the two background timers, abortable as a unit.
pub struct ClientTimers {
    accrual: JoinHandle<()>,
    resync: JoinHandle<()>,
}

impl ClientTimers {
    /// Stop both timers.
    pub fn abort(&self) {
        self.accrual.abort();
        self.resync.abort();
    }
}

impl GameClient {
    /// Create a client over the given transport and cache.
    pub fn new(
        transport: Transport,
        config: EconomyConfig,
        cache: Arc<LedgerCache>,
        player: Option<PlayerId>,
    ) -> Self {
        Self {
            transport,
            config,
            cache,
            player,
        }
    }

    /// The transport in use.
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The cache backing this client.
    pub const fn cache(&self) -> &Arc<LedgerCache> {
        &self.cache
    }

    /// The current cached state.
    pub async fn snapshot(&self) -> CachedLedger {
        self.cache.read().await
    }

    /// Register the player with the server, optionally under a
    /// sponsor's referral code. Unreachable servers leave the client on
    /// its cached state; registration is retried by the next resync
    /// path that needs it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the server refuses the
    /// sponsor link.
    pub async fn register(
        &self,
        sponsor: Option<(PlayerId, String)>,
    ) -> Result<CachedLedger, ClientError> {
        let Some(player) = self.player else {
            return Ok(self.cache.read().await);
        };
        match self.transport.register(player, sponsor).await {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "registration deferred, staying on cached state");
                Ok(self.cache.read().await)
            }
            Err(other) => Err(other),
        }
    }

    /// Pull the authoritative snapshot, falling back to a local accrual
    /// tick when the server cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for definitive server answers
    /// such as an unknown player.
    pub async fn resync(&self) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        let Some(player) = self.player else {
            return self.tick_accrual(now).await;
        };
        match self.transport.sync(player).await {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(_) | ClientError::UnknownOutcome(_)) => {
                self.tick_accrual(now).await
            }
            Err(other) => Err(other),
        }
    }

    /// Roll local accrual forward to `now` on the cached ledger.
    ///
    /// Accrual is derivable from state the server already confirmed,
    /// so this does not demote an authoritative cache.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the cached ledger refers to
    /// a colony kind missing from the catalog.
    pub async fn tick_accrual(&self, now: DateTime<Utc>) -> Result<CachedLedger, ClientError> {
        self.cache
            .advance(|ledger| roll_accrual(ledger, &self.config, now))
            .await
            .map_err(rejection)?;
        Ok(self.cache.read().await)
    }

    // -----------------------------------------------------------------------
    // Economy operations
    // -----------------------------------------------------------------------

    /// Sell honey for flowers and diamonds.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the precondition check or
    /// the server refuses the sale.
    pub async fn sell_honey(&self, amount: Decimal) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        self.cache
            .dry_run(|ledger| apply_sell(ledger, &self.config, amount, now))
            .await
            .map_err(rejection)?;
        let Some(player) = self.player else {
            return self
                .commit_local(|ledger| apply_sell(ledger, &self.config, amount, now))
                .await;
        };
        match self
            .transport
            .sell_honey(player, RequestToken::new(), amount)
            .await
        {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "sell applied locally pending resync");
                self.commit_local(|ledger| apply_sell(ledger, &self.config, amount, now))
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// Buy one colony of the given kind.
    ///
    /// The referral cascade is a server-side effect; a local fallback
    /// skips it and the sponsor's credit appears on a later resync.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the precondition check or
    /// the server refuses the purchase.
    pub async fn buy_colony(&self, kind: ColonyKindId) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        self.cache
            .dry_run(|ledger| apply_buy_colony(ledger, &self.config, kind, now))
            .await
            .map_err(rejection)?;
        let Some(player) = self.player else {
            return self
                .commit_local(|ledger| apply_buy_colony(ledger, &self.config, kind, now))
                .await;
        };
        match self
            .transport
            .buy_colony(player, RequestToken::new(), kind)
            .await
        {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "colony purchase applied locally pending resync");
                self.commit_local(|ledger| apply_buy_colony(ledger, &self.config, kind, now))
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// Unlock a hive capacity tier.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the tier is unknown,
    /// already unlocked, or unaffordable.
    pub async fn unlock_tier(&self, level: u8) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        self.cache
            .dry_run(|ledger| apply_unlock_tier(ledger, &self.config, level, now))
            .await
            .map_err(rejection)?;
        let Some(player) = self.player else {
            return self
                .commit_local(|ledger| apply_unlock_tier(ledger, &self.config, level, now))
                .await;
        };
        match self
            .transport
            .unlock_tier(player, RequestToken::new(), level)
            .await
        {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "tier unlock applied locally pending resync");
                self.commit_local(|ledger| apply_unlock_tier(ledger, &self.config, level, now))
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// Convert between currencies under a fixed exchange policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the precondition check or
    /// the server refuses the conversion.
    pub async fn exchange(
        &self,
        kind: ExchangeKind,
        amount: Decimal,
    ) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        self.cache
            .dry_run(|ledger| apply_exchange(ledger, &self.config, kind, amount, now))
            .await
            .map_err(rejection)?;
        let Some(player) = self.player else {
            return self
                .commit_local(|ledger| apply_exchange(ledger, &self.config, kind, amount, now))
                .await;
        };
        match self
            .transport
            .exchange(player, RequestToken::new(), kind, amount)
            .await
        {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "exchange applied locally pending resync");
                self.commit_local(|ledger| apply_exchange(ledger, &self.config, kind, amount, now))
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// Claim a one-time mission reward.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the mission is unknown or
    /// already claimed.
    pub async fn claim_mission(&self, mission: MissionId) -> Result<CachedLedger, ClientError> {
        let now = Utc::now();
        self.cache
            .dry_run(|ledger| apply_claim_mission(ledger, &self.config, mission, now))
            .await
            .map_err(rejection)?;
        let Some(player) = self.player else {
            return self
                .commit_local(|ledger| apply_claim_mission(ledger, &self.config, mission, now))
                .await;
        };
        match self
            .transport
            .claim_mission(player, RequestToken::new(), mission)
            .await
        {
            Ok(snapshot) => self.accept(snapshot).await,
            Err(ClientError::NetworkUnavailable(reason)) => {
                debug!(%reason, "mission claim applied locally pending resync");
                self.commit_local(|ledger| apply_claim_mission(ledger, &self.config, mission, now))
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// Spend a ticket on the prize wheel. Only the server holds the
    /// wheel; there is no local fallback and no faked prize.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::LocalFallbackImpossible`] without a
    /// reachable server or a player identity, and
    /// [`ClientError::Rejected`] for definitive refusals.
    pub async fn spin(&self) -> Result<SpinResult, ClientError> {
        let cached = self.cache.read().await;
        if cached.ledger.tickets == 0 {
            return Err(rejection(LedgerError::from(
                EconomyError::InsufficientBalance {
                    currency: Currency::Tickets,
                    requested: Decimal::ONE,
                    available: Decimal::ZERO,
                },
            )));
        }
        let Some(player) = self.player else {
            return Err(ClientError::LocalFallbackImpossible { operation: "spin" });
        };
        match self.transport.spin(player, RequestToken::new()).await {
            Ok(result) => {
                self.cache
                    .overwrite(result.snapshot.ledger.clone(), result.snapshot.as_of)
                    .await;
                Ok(result)
            }
            Err(ClientError::NetworkUnavailable(_)) => {
                Err(ClientError::LocalFallbackImpossible { operation: "spin" })
            }
            Err(other) => Err(other),
        }
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Submit a withdrawal. Escrow only exists server-side, so this
    /// never falls back to a local apply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for precondition or server
    /// refusals and [`ClientError::LocalFallbackImpossible`] without a
    /// reachable server.
    pub async fn submit_withdrawal(
        &self,
        request: NewWithdrawal,
    ) -> Result<Transaction, ClientError> {
        conversion::quote_withdrawal(
            request.currency,
            request.amount,
            &request.address,
            &self.config,
        )
        .map_err(|e| rejection(LedgerError::from(e)))?;
        let escrow = request.currency.escrow_currency();
        let available = self.cache.read().await.ledger.balance(escrow);
        if available < request.amount {
            return Err(rejection(LedgerError::from(
                EconomyError::InsufficientBalance {
                    currency: escrow,
                    requested: request.amount,
                    available,
                },
            )));
        }
        let Some(player) = self.player else {
            return Err(ClientError::LocalFallbackImpossible {
                operation: "withdrawal",
            });
        };
        match self
            .transport
            .submit_withdrawal(player, RequestToken::new(), request)
            .await
        {
            Ok(tx) => {
                self.refresh_after_transaction(player).await;
                Ok(tx)
            }
            Err(ClientError::NetworkUnavailable(_)) => Err(ClientError::LocalFallbackImpossible {
                operation: "withdrawal",
            }),
            Err(other) => Err(other),
        }
    }

    /// Declare an external deposit awaiting review.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for precondition or server
    /// refusals and [`ClientError::LocalFallbackImpossible`] without a
    /// reachable server.
    pub async fn declare_deposit(&self, request: NewDeposit) -> Result<Transaction, ClientError> {
        conversion::deposit_credit(request.amount, &self.config)
            .map_err(|e| rejection(LedgerError::from(e)))?;
        if self.cache.read().await.ledger.funds_pending {
            return Err(rejection(LedgerError::DepositPending));
        }
        let Some(player) = self.player else {
            return Err(ClientError::LocalFallbackImpossible {
                operation: "deposit",
            });
        };
        match self
            .transport
            .declare_deposit(player, RequestToken::new(), request)
            .await
        {
            Ok(tx) => {
                self.refresh_after_transaction(player).await;
                Ok(tx)
            }
            Err(ClientError::NetworkUnavailable(_)) => Err(ClientError::LocalFallbackImpossible {
                operation: "deposit",
            }),
            Err(other) => Err(other),
        }
    }

    /// The player's transaction history, newest first. Empty in
    /// local-only mode.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        let Some(player) = self.player else {
            return Ok(Vec::new());
        };
        self.transport.transactions_for(player).await
    }

    // -----------------------------------------------------------------------
    // Background timers
    // -----------------------------------------------------------------------

    /// Spawn the accrual tick and the resync loop.
    pub fn spawn_timers(self: &Arc<Self>) -> ClientTimers {
        let accrual_client = Arc::clone(self);
        let accrual = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ACCRUAL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = accrual_client.tick_accrual(Utc::now()).await {
                    debug!(error = %err, "accrual tick skipped");
                }
            }
        });

        let resync_client = Arc::clone(self);
        let resync = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RESYNC_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = resync_client.resync().await {
                    warn!(error = %err, "resync failed");
                }
            }
        });

        ClientTimers { accrual, resync }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn accept(&self, snapshot: LedgerSnapshot) -> Result<CachedLedger, ClientError> {
        self.cache.overwrite(snapshot.ledger, snapshot.as_of).await;
        Ok(self.cache.read().await)
    }

    async fn commit_local(
        &self,
        f: impl FnOnce(&mut PlayerLedger) -> Result<(), LedgerError>,
    ) -> Result<CachedLedger, ClientError> {
        self.cache.apply_provisional(f).await.map_err(rejection)?;
        Ok(self.cache.read().await)
    }

    /// Escrow changed the balances server-side; pull them if we can.
    /// Best effort, the next resync gets them otherwise.
    async fn refresh_after_transaction(&self, player: PlayerId) {
        if let Ok(snapshot) = self.transport.sync(player).await {
            self.cache.overwrite(snapshot.ledger, snapshot.as_of).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Local rule application (the server's rules on the cached copy)
// ---------------------------------------------------------------------------

/// Roll honey accrual forward to `now` on the cached ledger, the same
/// way the authority does it.
fn roll_accrual(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let elapsed = now.signed_duration_since(ledger.last_accrual).num_seconds();
    let elapsed = u64::try_from(elapsed).unwrap_or(0);
    if elapsed > 0 {
        let rate = production::production_rate(&ledger.colonies, config)?;
        let capacity = production::capacity(&ledger.unlocked_tiers, config);
        ledger.honey = production::accrue(ledger.honey, rate, elapsed, capacity);
    }
    ledger.last_accrual = now;
    Ok(())
}

fn apply_sell(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    roll_accrual(ledger, config, now)?;
    let quote = conversion::quote_honey_sale(amount, config)?;
    balances::debit(ledger, Currency::Honey, quote.honey_debited)?;
    balances::credit(ledger, Currency::Flowers, quote.flowers)?;
    balances::credit(ledger, Currency::Diamonds, quote.diamonds)?;
    let year = now.year();
    let score = ledger
        .score_for_year(year)
        .checked_add(amount)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "yearly score".to_owned(),
        })?;
    ledger.yearly_scores.insert(year, score);
    Ok(())
}

fn apply_buy_colony(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    kind: ColonyKindId,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let cost = config
        .colony(kind)
        .ok_or(EconomyError::UnknownColonyKind(kind))?
        .cost_flowers;
    roll_accrual(ledger, config, now)?;
    balances::debit(ledger, Currency::Flowers, cost)?;
    let count = ledger.colonies.entry(kind).or_insert(0);
    *count = count
        .checked_add(1)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "colony count".to_owned(),
        })?;
    Ok(())
}

fn apply_unlock_tier(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    level: u8,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    if ledger.unlocked_tiers.contains(&level) {
        return Err(LedgerError::AlreadyUnlocked(level));
    }
    let cost = config
        .tier(level)
        .ok_or(EconomyError::UnknownTier(level))?
        .cost_flowers;
    roll_accrual(ledger, config, now)?;
    if cost > Decimal::ZERO {
        balances::debit(ledger, Currency::Flowers, cost)?;
    }
    ledger.unlocked_tiers.insert(level);
    Ok(())
}

fn apply_exchange(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    kind: ExchangeKind,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    roll_accrual(ledger, config, now)?;
    let quote = conversion::quote_exchange(kind, amount, config)?;
    balances::debit(ledger, kind.source(), quote.debit)?;
    balances::credit(ledger, kind.target(), quote.credit)?;
    Ok(())
}

fn apply_claim_mission(
    ledger: &mut PlayerLedger,
    config: &EconomyConfig,
    mission: MissionId,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    if ledger.claimed_missions.contains(&mission) {
        return Err(LedgerError::AlreadyClaimed(mission));
    }
    let reward = config
        .mission(mission)
        .ok_or(EconomyError::UnknownMission(mission))?
        .reward_flowers;
    roll_accrual(ledger, config, now)?;
    balances::credit(ledger, Currency::Flowers, reward)?;
    ledger.claimed_missions.insert(mission);
    Ok(())
}
