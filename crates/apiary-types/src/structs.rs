//! Core entity structs for the Apiary game economy.
//!
//! Covers the player ledger (the authoritative balance record), the
//! referral link, leaderboard entries, prize awards, and the snapshot
//! payload exchanged between server and client.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Currency;
use crate::ids::{ColonyKindId, MissionId, PlayerId, PurchaseId, RequestToken};

// ---------------------------------------------------------------------------
// Player ledger
// ---------------------------------------------------------------------------

/// The authoritative record of a single player's balances.
///
/// Invariants (enforced by the mutation helpers, not by this struct):
/// - every balance is non-negative at rest;
/// - `honey` never exceeds the capacity of the highest unlocked hive tier;
/// - `unlocked_tiers` only ever grows (tiers are never re-locked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerLedger {
    /// The owning player.
    pub player: PlayerId,
    /// Time-accruing honey, bounded by hive capacity.
    #[ts(as = "String")]
    pub honey: Decimal,
    /// Spendable flower balance.
    #[ts(as = "String")]
    pub flowers: Decimal,
    /// Withdrawable diamond balance.
    #[ts(as = "String")]
    pub diamonds: Decimal,
    /// Withdrawable BVR token balance.
    #[ts(as = "String")]
    pub bvr: Decimal,
    /// Consumable spin tickets.
    pub tickets: u32,
    /// Owned bee colonies by kind.
    pub colonies: BTreeMap<ColonyKindId, u32>,
    /// Unlocked hive tier levels. Tier 1 is always present.
    pub unlocked_tiers: BTreeSet<u8>,
    /// Missions already claimed by this player.
    pub claimed_missions: BTreeSet<MissionId>,
    /// Set while a declared deposit awaits review; gates further deposits.
    pub funds_pending: bool,
    /// Cumulative competitive score per calendar year (honey sold).
    #[ts(as = "BTreeMap<i32, String>")]
    pub yearly_scores: BTreeMap<i32, Decimal>,
    /// Lifetime flowers earned through the referral program.
    #[ts(as = "String")]
    pub referral_earnings: Decimal,
    /// Instant up to which honey accrual has been applied.
    pub last_accrual: DateTime<Utc>,
    /// When the ledger was created.
    pub created_at: DateTime<Utc>,
}

impl PlayerLedger {
    /// Create a fresh ledger with zero balances and tier 1 unlocked.
    pub fn new(player: PlayerId, now: DateTime<Utc>) -> Self {
        let mut unlocked_tiers = BTreeSet::new();
        unlocked_tiers.insert(1);
        Self {
            player,
            honey: Decimal::ZERO,
            flowers: Decimal::ZERO,
            diamonds: Decimal::ZERO,
            bvr: Decimal::ZERO,
            tickets: 0,
            colonies: BTreeMap::new(),
            unlocked_tiers,
            claimed_missions: BTreeSet::new(),
            funds_pending: false,
            yearly_scores: BTreeMap::new(),
            referral_earnings: Decimal::ZERO,
            last_accrual: now,
            created_at: now,
        }
    }

    /// Read the balance of a decimal-denominated currency.
    ///
    /// `Tickets` is an integer count; it is reported as a [`Decimal`] here
    /// so callers can treat all balances uniformly.
    pub fn balance(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Honey => self.honey,
            Currency::Flowers => self.flowers,
            Currency::Diamonds => self.diamonds,
            Currency::Bvr => self.bvr,
            Currency::Tickets => Decimal::from(self.tickets),
        }
    }

    /// The score recorded for the given calendar year.
    pub fn score_for_year(&self, year: i32) -> Decimal {
        self.yearly_scores
            .get(&year)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Referral link
// ---------------------------------------------------------------------------

/// A fixed sponsor relationship established at registration.
///
/// At most one link exists per player and it is never reassigned. The
/// `first_purchase_done` flag is the single source of truth for whether
/// the one-time first-purchase bonus has been granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReferralLink {
    /// The sponsoring player who receives the bonus cascade.
    pub sponsor: PlayerId,
    /// The sponsor code the player joined with.
    pub code: String,
    /// When the link was established.
    pub joined_at: DateTime<Utc>,
    /// Lifetime flowers this link has earned the sponsor.
    #[ts(as = "String")]
    pub earned: Decimal,
    /// Whether the one-time first-purchase bonus was already granted.
    pub first_purchase_done: bool,
    /// Purchase events already cascaded, for idempotency.
    pub processed_purchases: BTreeSet<PurchaseId>,
}

impl ReferralLink {
    /// Create a new link to `sponsor` under `code`.
    pub const fn new(sponsor: PlayerId, code: String, joined_at: DateTime<Utc>) -> Self {
        Self {
            sponsor,
            code,
            joined_at,
            earned: Decimal::ZERO,
            first_purchase_done: false,
            processed_purchases: BTreeSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// A derived, ephemeral ranking entry.
///
/// Not independently authoritative: the whole board can be rebuilt from
/// the per-ledger yearly scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeaderboardEntry {
    /// The ranked player.
    pub player: PlayerId,
    /// Yearly cumulative score.
    #[ts(as = "String")]
    pub score: Decimal,
    /// When this entry last changed.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Snapshot and request envelope
// ---------------------------------------------------------------------------

/// Authoritative ledger state returned by every server operation.
///
/// The client overwrites its whole cached ledger with this payload; it
/// never merges field-by-field, which is what keeps optimistic local
/// drift bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerSnapshot {
    /// The full ledger state after the operation.
    pub ledger: PlayerLedger,
    /// Server time at which the snapshot was taken.
    pub as_of: DateTime<Utc>,
}

/// Envelope fields common to every mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MutationEnvelope {
    /// Client-generated idempotency token; replays are not re-applied.
    pub token: RequestToken,
}
