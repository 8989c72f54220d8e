//! The authoritative ledger store: one record per player, single writer
//! per player.
//!
//! # Design
//!
//! - The outer map is guarded by an async `RwLock`; each player record
//!   sits behind its own async `Mutex`. Two requests touching the same
//!   player serialize on that mutex; requests for different players run
//!   concurrently.
//! - Mutations run against a scratch clone of the record and are written
//!   back only on success, so a failed operation can never leave a
//!   half-applied record visible to other readers.
//! - Every client mutation carries a [`RequestToken`]; applied tokens are
//!   remembered per player so a blind retry after a timeout cannot
//!   double-debit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use apiary_types::{PlayerId, PlayerLedger, ReferralLink, RequestToken};

use crate::error::LedgerError;
use crate::token_log::TokenLog;

/// Everything the store holds for one player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    /// The authoritative balance ledger.
    pub ledger: PlayerLedger,
    /// The sponsor link, if one was established at registration.
    pub referral: Option<ReferralLink>,
    /// Idempotency tokens already applied to this record.
    pub applied_tokens: TokenLog,
}

impl PlayerRecord {
    /// A fresh record with default balances and no sponsor.
    pub fn new(player: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            ledger: PlayerLedger::new(player, now),
            referral: None,
            applied_tokens: TokenLog::new(),
        }
    }
}

/// In-memory authoritative store of all player records.
///
/// The store is deliberately agnostic of persistence technology; a
/// durable backend would load records into it at startup and write
/// through on mutation.
#[derive(Debug, Default)]
pub struct LedgerStore {
    players: RwLock<BTreeMap<PlayerId, Arc<Mutex<PlayerRecord>>>>,
}

impl LedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a record exists for `player`, creating a default one if
    /// absent. Existing records are left untouched.
    pub async fn create_if_absent(&self, player: PlayerId, now: DateTime<Utc>) {
        let mut players = self.players.write().await;
        players
            .entry(player)
            .or_insert_with(|| Arc::new(Mutex::new(PlayerRecord::new(player, now))));
    }

    /// Establish a sponsor link for `player`. At most one link may ever
    /// exist; re-linking fails.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] if the player has no
    /// record, or [`LedgerError::SponsorAlreadySet`] on a second link.
    pub async fn link_sponsor(
        &self,
        player: PlayerId,
        link: ReferralLink,
    ) -> Result<(), LedgerError> {
        let record = self.record(player).await?;
        let mut guard = record.lock().await;
        if guard.referral.is_some() {
            return Err(LedgerError::SponsorAlreadySet(player));
        }
        guard.referral = Some(link);
        Ok(())
    }

    /// Return a consistent snapshot of the player's ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] if no record exists.
    pub async fn get(&self, player: PlayerId) -> Result<PlayerLedger, LedgerError> {
        let record = self.record(player).await?;
        let guard = record.lock().await;
        Ok(guard.ledger.clone())
    }

    /// Return a consistent snapshot of the full player record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] if no record exists.
    pub async fn get_record(&self, player: PlayerId) -> Result<PlayerRecord, LedgerError> {
        let record = self.record(player).await?;
        let guard = record.lock().await;
        Ok(guard.clone())
    }

    /// Apply a client mutation under the player lock, deduplicated on
    /// `token`.
    ///
    /// The closure runs against a scratch clone; the record is replaced
    /// only if the closure succeeds, and the token is remembered so a
    /// replay returns [`LedgerError::DuplicateRequest`] without touching
    /// the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] if no record exists,
    /// [`LedgerError::DuplicateRequest`] on a replayed token, or
    /// whatever the closure fails with.
    pub async fn mutate<T>(
        &self,
        player: PlayerId,
        token: RequestToken,
        f: impl FnOnce(&mut PlayerRecord) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let record = self.record(player).await?;
        let mut guard = record.lock().await;
        if guard.applied_tokens.contains(token) {
            return Err(LedgerError::DuplicateRequest(token));
        }
        let mut scratch = guard.clone();
        let out = f(&mut scratch)?;
        scratch.applied_tokens.push(token);
        *guard = scratch;
        Ok(out)
    }

    /// Apply an internal mutation (accrual, refunds, referral credits)
    /// under the player lock, without token bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] if no record exists, or
    /// whatever the closure fails with.
    pub async fn update<T>(
        &self,
        player: PlayerId,
        f: impl FnOnce(&mut PlayerRecord) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let record = self.record(player).await?;
        let mut guard = record.lock().await;
        let mut scratch = guard.clone();
        let out = f(&mut scratch)?;
        *guard = scratch;
        Ok(out)
    }

    /// All player IDs currently in the store.
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        let players = self.players.read().await;
        players.keys().copied().collect()
    }

    async fn record(&self, player: PlayerId) -> Result<Arc<Mutex<PlayerRecord>>, LedgerError> {
        let players = self.players.read().await;
        players
            .get(&player)
            .cloned()
            .ok_or(LedgerError::PlayerNotFound(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_economy::balances;
    use apiary_types::Currency;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn missing_player_is_not_found() {
        let store = LedgerStore::new();
        let result = store.get(PlayerId::new()).await;
        assert!(matches!(result, Err(LedgerError::PlayerNotFound(_))));
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = LedgerStore::new();
        let player = PlayerId::new();
        store.create_if_absent(player, Utc::now()).await;

        store
            .update(player, |rec| {
                balances::credit(&mut rec.ledger, Currency::Flowers, Decimal::new(10, 0))?;
                Ok(())
            })
            .await
            .ok();

        // Second create must not reset the balance.
        store.create_if_absent(player, Utc::now()).await;
        let ledger = store.get(player).await.ok();
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(10, 0)));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_record_untouched() {
        let store = LedgerStore::new();
        let player = PlayerId::new();
        store.create_if_absent(player, Utc::now()).await;

        let token = RequestToken::new();
        let result: Result<(), LedgerError> = store
            .mutate(player, token, |rec| {
                // Credit something, then fail: nothing may stick.
                balances::credit(&mut rec.ledger, Currency::Flowers, Decimal::new(50, 0))?;
                Err(LedgerError::DepositPending)
            })
            .await;
        assert!(result.is_err());

        let ledger = store.get(player).await.ok();
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::ZERO));

        // The token was not consumed by the failed attempt.
        let retry: Result<(), LedgerError> = store.mutate(player, token, |_rec| Ok(())).await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn replayed_token_is_rejected_without_reapplying() {
        let store = LedgerStore::new();
        let player = PlayerId::new();
        store.create_if_absent(player, Utc::now()).await;

        let token = RequestToken::new();
        let apply = |rec: &mut PlayerRecord| {
            balances::credit(&mut rec.ledger, Currency::Diamonds, Decimal::new(5, 0))?;
            Ok(())
        };

        let first: Result<(), LedgerError> = store.mutate(player, token, apply).await;
        assert!(first.is_ok());

        let replay: Result<(), LedgerError> = store.mutate(player, token, apply).await;
        assert!(matches!(replay, Err(LedgerError::DuplicateRequest(_))));

        let ledger = store.get(player).await.ok();
        assert_eq!(ledger.map(|l| l.diamonds), Some(Decimal::new(5, 0)));
    }

    #[tokio::test]
    async fn sponsor_link_is_set_once() {
        let store = LedgerStore::new();
        let player = PlayerId::new();
        let sponsor = PlayerId::new();
        store.create_if_absent(player, Utc::now()).await;

        let link = ReferralLink::new(sponsor, String::from("HIVE-01"), Utc::now());
        assert!(store.link_sponsor(player, link.clone()).await.is_ok());
        assert!(matches!(
            store.link_sponsor(player, link).await,
            Err(LedgerError::SponsorAlreadySet(_)),
        ));
    }
}
