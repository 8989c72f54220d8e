//! Authoritative ledger layer for the Apiary economy.
//!
//! This crate owns the single source of truth: player ledgers, the
//! transaction lifecycle, the referral cascade, the spin-wheel draw, and
//! the yearly leaderboard. The pure pricing rules live in
//! `apiary-economy`; this crate applies them under per-player
//! serialization so concurrent requests can never interleave into an
//! inconsistent balance.
//!
//! [`LedgerService`] is the facade the API layer talks to. Each of its
//! operations rolls honey accrual forward, applies the mutation
//! all-or-nothing, and returns a full authoritative snapshot for the
//! client to overwrite its cache with.

pub mod error;
pub mod leaderboard;
pub mod prize;
pub mod referral;
pub mod service;
pub mod store;
mod token_log;
pub mod transactions;

pub use error::LedgerError;
pub use leaderboard::{Leaderboard, BOARD_SIZE};
pub use referral::{ReferralCredit, ReferralProcessor};
pub use service::{LedgerService, SpinOutcome};
pub use store::{LedgerStore, PlayerRecord};
pub use token_log::TokenLog;
pub use transactions::TransactionManager;
