//! The ledger service: the single entry point for every game operation.
//!
//! Wires the pure rules engine, the ledger store, the transaction
//! lifecycle manager, the referral processor, and the leaderboard into
//! the operation set the API exposes. Every operation returns the full
//! authoritative [`LedgerSnapshot`] so the client can overwrite its
//! cache wholesale instead of merging field-by-field.
//!
//! Honey accrual is applied lazily: each operation that touches a ledger
//! first rolls accrual forward to the current instant, so a player who
//! was away still finds the honey their colonies produced, capped at
//! hive capacity.

use chrono::{DateTime, Datelike, Utc};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use apiary_types::{
    Currency, ExchangeKind, LeaderboardEntry, LedgerSnapshot, MissionId, NewDeposit,
    NewWithdrawal, PlayerId, PlayerLedger, PurchaseId, ReferralLink, RequestToken, Transaction,
    TransactionEvent, TransactionId, ColonyKindId,
};

use apiary_economy::{
    balances, conversion, production, EconomyConfig, EconomyError, PrizeEntry,
};

use crate::error::LedgerError;
use crate::leaderboard::Leaderboard;
use crate::prize;
use crate::referral::ReferralProcessor;
use crate::store::LedgerStore;
use crate::transactions::TransactionManager;

/// The result of a spin: what was drawn, and the ledger after the
/// ticket debit and award were applied atomically.
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    /// The prize entry that was drawn.
    pub prize: PrizeEntry,
    /// Authoritative state after the spin.
    pub snapshot: LedgerSnapshot,
}

/// Facade over the whole authoritative economy.
#[derive(Debug)]
pub struct LedgerService {
    store: Arc<LedgerStore>,
    config: Arc<EconomyConfig>,
    transactions: TransactionManager,
    referrals: ReferralProcessor,
    leaderboard: Leaderboard,
    rng: Mutex<SmallRng>,
}

impl LedgerService {
    /// Build a service around the given economy configuration.
    pub fn new(config: EconomyConfig) -> Self {
        Self::with_rng(config, SmallRng::from_os_rng())
    }

    /// Build a service with an explicit prize RNG. Tests seed this for
    /// deterministic draws.
    pub fn with_rng(config: EconomyConfig, rng: SmallRng) -> Self {
        let store = Arc::new(LedgerStore::new());
        let config = Arc::new(config);
        let transactions = TransactionManager::new(Arc::clone(&store), Arc::clone(&config));
        let referrals = ReferralProcessor::new(Arc::clone(&store), Arc::clone(&config));
        Self {
            store,
            config,
            transactions,
            referrals,
            leaderboard: Leaderboard::new(),
            rng: Mutex::new(rng),
        }
    }

    /// The economy configuration this service runs under.
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Direct access to the authoritative store.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Subscribe to transaction lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TransactionEvent> {
        self.transactions.subscribe()
    }

    // -----------------------------------------------------------------------
    // Registration and reads
    // -----------------------------------------------------------------------

    /// Register a player, creating a fresh ledger if none exists.
    ///
    /// # Errors
    ///
    /// Never fails for the creation itself; propagates store errors from
    /// the snapshot read.
    pub async fn register(
        &self,
        player: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        self.store.create_if_absent(player, now).await;
        info!(player = %player, "player registered");
        self.sync(player, now).await
    }

    /// Register a player under a sponsor code. The link is established
    /// once and never reassigned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SponsorAlreadySet`] if the player already
    /// has a sponsor.
    pub async fn register_with_sponsor(
        &self,
        player: PlayerId,
        sponsor: PlayerId,
        code: String,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        self.store.create_if_absent(sponsor, now).await;
        self.store.create_if_absent(player, now).await;
        self.store
            .link_sponsor(player, ReferralLink::new(sponsor, code, now))
            .await?;
        info!(player = %player, sponsor = %sponsor, "player registered with sponsor");
        self.sync(player, now).await
    }

    /// Roll accrual forward and return the authoritative snapshot.
    ///
    /// This is the resync endpoint the client polls; it is the only
    /// read that also mutates (the accrued honey and the accrual clock).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] for unknown players.
    pub async fn sync(
        &self,
        player: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let config = Arc::clone(&self.config);
        let ledger = self
            .store
            .update(player, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                Ok(rec.ledger.clone())
            })
            .await?;
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    // -----------------------------------------------------------------------
    // Economy operations
    // -----------------------------------------------------------------------

    /// Sell honey for flowers and diamonds.
    ///
    /// The sold amount feeds the player's yearly score and the
    /// leaderboard as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::BelowMinimumThreshold`] under the sell
    /// threshold, [`EconomyError::InsufficientBalance`] if the honey is
    /// not there, or [`LedgerError::DuplicateRequest`] on a replay.
    pub async fn sell_honey(
        &self,
        player: PlayerId,
        token: RequestToken,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let config = Arc::clone(&self.config);
        let year = now.year();
        let (ledger, score) = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                let quote = conversion::quote_honey_sale(amount, &config)?;
                balances::debit(&mut rec.ledger, Currency::Honey, quote.honey_debited)?;
                balances::credit(&mut rec.ledger, Currency::Flowers, quote.flowers)?;
                balances::credit(&mut rec.ledger, Currency::Diamonds, quote.diamonds)?;

                let score = rec
                    .ledger
                    .score_for_year(year)
                    .checked_add(amount)
                    .ok_or_else(|| EconomyError::ArithmeticOverflow {
                        context: "yearly score".to_owned(),
                    })?;
                rec.ledger.yearly_scores.insert(year, score);
                Ok((rec.ledger.clone(), score))
            })
            .await?;

        self.leaderboard.record(year, player, score, now).await;
        info!(player = %player, amount = %amount, "honey sold");
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    /// Buy one bee colony of the given kind with flowers.
    ///
    /// Completing the purchase triggers the referral cascade as a
    /// best-effort side effect.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::UnknownColonyKind`] for a kind not in the
    /// catalog, [`EconomyError::InsufficientBalance`] if flowers do not
    /// cover the cost, or [`LedgerError::DuplicateRequest`] on a replay.
    pub async fn buy_colony(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ColonyKindId,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let cost = self
            .config
            .colony(kind)
            .ok_or(EconomyError::UnknownColonyKind(kind))?
            .cost_flowers;

        let config = Arc::clone(&self.config);
        let ledger = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                balances::debit(&mut rec.ledger, Currency::Flowers, cost)?;
                let count = rec.ledger.colonies.entry(kind).or_insert(0);
                *count = count
                    .checked_add(1)
                    .ok_or_else(|| EconomyError::ArithmeticOverflow {
                        context: "colony count".to_owned(),
                    })?;
                Ok(rec.ledger.clone())
            })
            .await?;

        self.cascade_referral(player, cost).await;
        info!(player = %player, kind = %kind, cost = %cost, "colony purchased");
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    /// Unlock a hive capacity tier with flowers. Unlocking is monotonic.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::UnknownTier`] for a level not in the
    /// catalog, [`LedgerError::AlreadyUnlocked`] if the tier is owned,
    /// or [`EconomyError::InsufficientBalance`] if flowers do not cover
    /// the cost.
    pub async fn unlock_tier(
        &self,
        player: PlayerId,
        token: RequestToken,
        level: u8,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let cost = self
            .config
            .tier(level)
            .ok_or(EconomyError::UnknownTier(level))?
            .cost_flowers;

        let config = Arc::clone(&self.config);
        let ledger = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                if rec.ledger.unlocked_tiers.contains(&level) {
                    return Err(LedgerError::AlreadyUnlocked(level));
                }
                if cost > Decimal::ZERO {
                    balances::debit(&mut rec.ledger, Currency::Flowers, cost)?;
                }
                rec.ledger.unlocked_tiers.insert(level);
                Ok(rec.ledger.clone())
            })
            .await?;

        if cost > Decimal::ZERO {
            self.cascade_referral(player, cost).await;
        }
        info!(player = %player, level, "hive tier unlocked");
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    /// Exchange one currency for another under the configured policy.
    ///
    /// All-or-nothing: the full source amount is debited and the full
    /// computed output credited, or nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::BelowMinimumThreshold`] for gated
    /// exchanges under their minimum, or
    /// [`EconomyError::InsufficientBalance`] if the source balance does
    /// not cover the amount.
    pub async fn exchange(
        &self,
        player: PlayerId,
        token: RequestToken,
        kind: ExchangeKind,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let config = Arc::clone(&self.config);
        let ledger = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                let quote = conversion::quote_exchange(kind, amount, &config)?;
                balances::debit(&mut rec.ledger, kind.source(), quote.debit)?;
                balances::credit(&mut rec.ledger, kind.target(), quote.credit)?;
                Ok(rec.ledger.clone())
            })
            .await?;

        info!(player = %player, kind = ?kind, amount = %amount, "currencies exchanged");
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    /// Claim a one-time mission reward.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyClaimed`] on a repeat claim, with
    /// no balance change, and [`EconomyError::UnknownMission`] for a
    /// mission not in the catalog.
    pub async fn claim_mission(
        &self,
        player: PlayerId,
        token: RequestToken,
        mission: MissionId,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot, LedgerError> {
        let reward = self
            .config
            .mission(mission)
            .ok_or(EconomyError::UnknownMission(mission))?
            .reward_flowers;

        let config = Arc::clone(&self.config);
        let ledger = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                if rec.ledger.claimed_missions.contains(&mission) {
                    return Err(LedgerError::AlreadyClaimed(mission));
                }
                balances::credit(&mut rec.ledger, Currency::Flowers, reward)?;
                rec.ledger.claimed_missions.insert(mission);
                Ok(rec.ledger.clone())
            })
            .await?;

        info!(player = %player, mission = %mission, "mission claimed");
        Ok(LedgerSnapshot { ledger, as_of: now })
    }

    /// Spend one ticket on a weighted prize draw.
    ///
    /// The draw runs server-side; the ticket debit and the award are
    /// applied atomically with it, so a drawn prize is always credited.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InsufficientBalance`] with a zero ticket
    /// balance and [`LedgerError::EmptyPrizeTable`] for a misconfigured
    /// wheel.
    pub async fn spin(
        &self,
        player: PlayerId,
        token: RequestToken,
        now: DateTime<Utc>,
    ) -> Result<SpinOutcome, LedgerError> {
        let entry = {
            let mut rng = self.rng.lock().await;
            prize::draw(&self.config.prizes, &mut *rng)?.clone()
        };

        let config = Arc::clone(&self.config);
        let award = entry.award.clone();
        let ledger = self
            .store
            .mutate(player, token, |rec| {
                apply_accrual(&mut rec.ledger, &config, now)?;
                balances::debit(&mut rec.ledger, Currency::Tickets, Decimal::ONE)?;
                prize::apply_award(&mut rec.ledger, &award)?;
                Ok(rec.ledger.clone())
            })
            .await?;

        info!(player = %player, prize = %entry.id, "spin resolved");
        Ok(SpinOutcome {
            prize: entry,
            snapshot: LedgerSnapshot { ledger, as_of: now },
        })
    }

    /// Run the referral cascade for a completed purchase. Best effort:
    /// a cascade failure never rolls back or blocks the purchase.
    async fn cascade_referral(&self, buyer: PlayerId, amount: Decimal) {
        if let Err(err) = self
            .referrals
            .process_purchase(buyer, PurchaseId::new(), amount)
            .await
        {
            warn!(buyer = %buyer, error = %err, "referral cascade failed");
        }
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Submit a withdrawal request; the amount is escrowed immediately.
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::create_withdrawal`].
    pub async fn submit_withdrawal(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewWithdrawal,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.transactions
            .create_withdrawal(player, token, request, now)
            .await
    }

    /// Declare an external deposit awaiting administrative review.
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::declare_deposit`].
    pub async fn declare_deposit(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewDeposit,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.transactions
            .declare_deposit(player, token, request, now)
            .await
    }

    /// Approve a pending transaction (administrative).
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::approve`].
    pub async fn approve_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.transactions.approve(id, now).await
    }

    /// Reject a pending transaction, refunding any escrow (administrative).
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::reject`].
    pub async fn reject_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.transactions.reject(id, now).await
    }

    /// All transactions awaiting review.
    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.transactions.pending().await
    }

    /// One player's transaction history, newest first.
    pub async fn transactions_for(&self, player: PlayerId) -> Vec<Transaction> {
        self.transactions.for_player(player).await
    }

    // -----------------------------------------------------------------------
    // Leaderboard
    // -----------------------------------------------------------------------

    /// The top of the yearly leaderboard.
    pub async fn leaderboard_top(&self, year: i32) -> Vec<LeaderboardEntry> {
        self.leaderboard.top(year).await
    }

    /// A player's exact rank for the year, computed over the full score
    /// set even beyond the visible board.
    pub async fn leaderboard_rank(&self, year: i32, player: PlayerId) -> Option<usize> {
        self.leaderboard.rank_of(year, player).await
    }
}

/// Roll honey accrual forward to `now` on a ledger in place.
fn apply_accrual(
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> LedgerService {
        LedgerService::with_rng(EconomyConfig::default(), SmallRng::seed_from_u64(7))
    }

    async fn seed(
        service: &LedgerService,
        f: impl FnOnce(&mut PlayerLedger),
    ) -> PlayerId {
        let player = PlayerId::new();
        service.register(player, Utc::now()).await.ok();
        service
            .store()
            .update(player, |rec| {
                f(&mut rec.ledger);
                Ok(())
            })
            .await
            .ok();
        player
    }

    #[tokio::test]
    async fn sync_accrues_up_to_capacity() {
        let service = service();
        let player = PlayerId::new();
        let start = Utc::now();
        service.register(player, start).await.ok();
        service
            .store()
            .update(player, |rec| {
                // One Forager Colony: 60 honey per hour.
                rec.ledger.colonies.insert(ColonyKindId(2), 1);
                Ok(())
            })
            .await
            .ok();

        let later = start
            .checked_add_signed(Duration::hours(1))
            .unwrap_or(start);
        let snapshot = service.sync(player, later).await;
        assert_eq!(
            snapshot.ok().map(|s| s.ledger.honey),
            Some(Decimal::new(60, 0)),
        );

        // Far in the future the balance clamps at tier-1 capacity.
        let much_later = start
            .checked_add_signed(Duration::hours(1_000))
            .unwrap_or(start);
        let snapshot = service.sync(player, much_later).await;
        assert_eq!(
            snapshot.ok().map(|s| s.ledger.honey),
            Some(Decimal::new(1_000, 0)),
        );
    }

    #[tokio::test]
    async fn sell_honey_feeds_score_and_leaderboard() {
        let service = service();
        let player = seed(&service, |l| l.honey = Decimal::new(500, 0)).await;
        let now = Utc::now();

        let snapshot = service
            .sell_honey(player, RequestToken::new(), Decimal::new(500, 0), now)
            .await;
        assert!(snapshot.is_ok());
        let ledger = snapshot.ok().map(|s| s.ledger);
        // 500 honey = 50 units -> 50 flowers, 250 diamonds.
        assert_eq!(ledger.as_ref().map(|l| l.flowers), Some(Decimal::new(50, 0)));
        assert_eq!(
            ledger.as_ref().map(|l| l.diamonds),
            Some(Decimal::new(250, 0)),
        );
        assert_eq!(
            ledger.map(|l| l.score_for_year(now.year())),
            Some(Decimal::new(500, 0)),
        );

        let top = service.leaderboard_top(now.year()).await;
        assert_eq!(top.first().map(|e| e.player), Some(player));
        assert_eq!(
            service.leaderboard_rank(now.year(), player).await,
            Some(1),
        );
    }

    #[tokio::test]
    async fn exchange_scenarios_match_economy_design() {
        let service = service();
        let player = seed(&service, |l| {
            l.diamonds = Decimal::new(500, 0);
            l.bvr = Decimal::new(50, 0);
        })
        .await;
        let now = Utc::now();

        // 100 diamonds at 10% bonus -> 110 flowers, 400 diamonds left.
        let snapshot = service
            .exchange(
                player,
                RequestToken::new(),
                ExchangeKind::DiamondsToFlowers,
                Decimal::new(100, 0),
                now,
            )
            .await;
        let ledger = snapshot.ok().map(|s| s.ledger);
        assert_eq!(
            ledger.as_ref().map(|l| l.diamonds),
            Some(Decimal::new(400, 0)),
        );
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(110, 0)));

        // 50 BVR under the 100 minimum: rejected, balances unchanged.
        let result = service
            .exchange(
                player,
                RequestToken::new(),
                ExchangeKind::BvrToFlowers,
                Decimal::new(50, 0),
                now,
            )
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Economy(
                EconomyError::BelowMinimumThreshold { .. }
            )),
        ));
        let ledger = service.store().get(player).await.ok();
        assert_eq!(ledger.as_ref().map(|l| l.bvr), Some(Decimal::new(50, 0)));
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(110, 0)));
    }

    #[tokio::test]
    async fn colony_purchase_cascades_to_sponsor() {
        let service = service();
        let now = Utc::now();
        let sponsor = PlayerId::new();
        let buyer = PlayerId::new();
        service
            .register_with_sponsor(buyer, sponsor, String::from("HIVE-1"), now)
            .await
            .ok();
        service
            .store()
            .update(buyer, |rec| {
                rec.ledger.flowers = Decimal::new(1_000, 0);
                Ok(())
            })
            .await
            .ok();

        // Worker Swarm costs 50 flowers.
        let snapshot = service
            .buy_colony(buyer, RequestToken::new(), ColonyKindId(1), now)
            .await;
        let ledger = snapshot.ok().map(|s| s.ledger);
        assert_eq!(ledger.as_ref().map(|l| l.flowers), Some(Decimal::new(950, 0)));
        assert_eq!(
            ledger.and_then(|l| l.colonies.get(&ColonyKindId(1)).copied()),
            Some(1),
        );

        // First purchase: floor(50 * 0.1) + 100 = 105 to the sponsor.
        let sponsor_ledger = service.store().get(sponsor).await.ok();
        assert_eq!(
            sponsor_ledger.map(|l| l.flowers),
            Some(Decimal::new(105, 0)),
        );
    }

    #[tokio::test]
    async fn tier_unlock_is_monotonic() {
        let service = service();
        let player = seed(&service, |l| l.flowers = Decimal::new(1_000, 0)).await;
        let now = Utc::now();

        let snapshot = service
            .unlock_tier(player, RequestToken::new(), 2, now)
            .await;
        let ledger = snapshot.ok().map(|s| s.ledger);
        assert_eq!(
            ledger.as_ref().map(|l| l.flowers),
            Some(Decimal::new(700, 0)),
        );
        assert_eq!(
            ledger.map(|l| l.unlocked_tiers.contains(&2)),
            Some(true),
        );

        let again = service
            .unlock_tier(player, RequestToken::new(), 2, now)
            .await;
        assert!(matches!(again, Err(LedgerError::AlreadyUnlocked(2))));
        let ledger = service.store().get(player).await.ok();
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(700, 0)));
    }

    #[tokio::test]
    async fn mission_claims_are_once_only() {
        let service = service();
        let player = seed(&service, |_| {}).await;
        let now = Utc::now();

        let first = service
            .claim_mission(player, RequestToken::new(), MissionId(1), now)
            .await;
        assert_eq!(
            first.ok().map(|s| s.ledger.flowers),
            Some(Decimal::new(25, 0)),
        );

        // Repeat claims error and change nothing, however often retried.
        for _ in 0..3 {
            let repeat = service
                .claim_mission(player, RequestToken::new(), MissionId(1), now)
                .await;
            assert!(matches!(repeat, Err(LedgerError::AlreadyClaimed(_))));
        }
        let ledger = service.store().get(player).await.ok();
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(25, 0)));
    }

    #[tokio::test]
    async fn spin_consumes_one_ticket_and_credits_atomically() {
        let service = service();
        let player = seed(&service, |l| l.tickets = 2).await;
        let now = Utc::now();

        let outcome = service.spin(player, RequestToken::new(), now).await;
        assert!(outcome.is_ok());
        let tickets = outcome.ok().map(|o| o.snapshot.ledger.tickets);
        assert_eq!(tickets, Some(1));

        service.spin(player, RequestToken::new(), now).await.ok();

        // Third spin with zero tickets is rejected outright.
        let broke = service.spin(player, RequestToken::new(), now).await;
        assert!(matches!(
            broke,
            Err(LedgerError::Economy(EconomyError::InsufficientBalance { .. })),
        ));
        let ledger = service.store().get(player).await.ok();
        assert_eq!(ledger.map(|l| l.tickets), Some(0));
    }

    #[tokio::test]
    async fn replayed_token_is_not_reapplied() {
        let service = service();
        let player = seed(&service, |l| l.diamonds = Decimal::new(500, 0)).await;
        let now = Utc::now();
        let token = RequestToken::new();

        let first = service
            .exchange(
                player,
                token,
                ExchangeKind::DiamondsToFlowers,
                Decimal::new(100, 0),
                now,
            )
            .await;
        assert!(first.is_ok());

        let replay = service
            .exchange(
                player,
                token,
                ExchangeKind::DiamondsToFlowers,
                Decimal::new(100, 0),
                now,
            )
            .await;
        assert!(matches!(replay, Err(LedgerError::DuplicateRequest(_))));
        let ledger = service.store().get(player).await.ok();
        assert_eq!(ledger.map(|l| l.diamonds), Some(Decimal::new(400, 0)));
    }
}
