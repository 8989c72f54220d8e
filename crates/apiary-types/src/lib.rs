//! Shared type definitions for the Apiary game economy.
//!
//! This crate is the single source of truth for all types used across the
//! Apiary workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the game dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers and catalog identifiers
//! - [`enums`] -- Enumeration types (currencies, statuses, exchange kinds)
//! - [`structs`] -- Core entity structs (ledger, referral link, snapshot)
//! - [`transaction`] -- The transaction tagged union and lifecycle events

pub mod enums;
pub mod ids;
pub mod structs;
pub mod transaction;

// Re-export all public types at crate root for convenience.
pub use enums::{Currency, ExchangeKind, TransactionStatus, WithdrawCurrency};
pub use ids::{
    ColonyKindId, MissionId, PlayerId, PrizeId, PurchaseId, RequestToken, TransactionId,
};
pub use structs::{
    LeaderboardEntry, LedgerSnapshot, MutationEnvelope, PlayerLedger, ReferralLink,
};
pub use transaction::{
    NewDeposit, NewWithdrawal, Transaction, TransactionEvent, TransactionKind,
};
