//! Error types for the apiary-ledger crate.
//!
//! [`LedgerError`] is the full server-side error taxonomy. Validation
//! errors from the pure rules engine pass through unchanged so callers
//! can surface them to the player; lifecycle and idempotency guards are
//! defined here.

use apiary_types::{MissionId, PlayerId, RequestToken, TransactionId, TransactionStatus};

use apiary_economy::EconomyError;

/// Errors that can occur in the authoritative ledger layer.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A pure economy rule rejected the operation (insufficient balance,
    /// below minimum, unknown catalog entry, overflow).
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// No ledger exists for the player and auto-creation was not requested.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// No transaction exists with the given ID.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// A terminal transaction was asked to transition again. Reported as
    /// an error, never silently ignored.
    #[error("transaction {id} is already {status:?} and cannot transition")]
    InvalidState {
        /// The transaction that was asked to transition.
        id: TransactionId,
        /// Its current (terminal) status.
        status: TransactionStatus,
    },

    /// The hive tier is already unlocked; unlocking is monotonic.
    #[error("hive tier {0} is already unlocked")]
    AlreadyUnlocked(u8),

    /// The mission was already claimed by this player.
    #[error("mission {0} has already been claimed")]
    AlreadyClaimed(MissionId),

    /// The request token was already applied; the mutation is not re-run.
    #[error("request {0} was already applied")]
    DuplicateRequest(RequestToken),

    /// A declared deposit is still pending review; further deposits are
    /// gated until it resolves.
    #[error("a declared deposit is already pending review")]
    DepositPending,

    /// The spin wheel has no entries (or zero total weight).
    #[error("prize table is empty or has zero total weight")]
    EmptyPrizeTable,

    /// A player already has a sponsor; links are never reassigned.
    #[error("player {0} already has a sponsor link")]
    SponsorAlreadySet(PlayerId),
}
