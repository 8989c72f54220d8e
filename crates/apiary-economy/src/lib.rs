//! Pure economy rules for the Apiary game.
//!
//! Everything in this crate is deterministic and free of I/O: production
//! rates, hive capacity, time-based accrual, conversion pricing, referral
//! bonus arithmetic, and the typed economy configuration. The ledger
//! crate applies these rules under its per-player serialization; this
//! crate never touches a store.
//!
//! # Modules
//!
//! - [`config`] -- YAML-loaded [`EconomyConfig`] with catalogs and defaults
//! - [`production`] -- production rate, capacity, and accrual
//! - [`conversion`] -- sale, exchange, withdrawal, and deposit pricing
//! - [`balances`] -- checked credit/debit helpers for the player ledger
//! - [`bonus`] -- referral bonus arithmetic
//! - [`error`] -- the [`EconomyError`] taxonomy

pub mod balances;
pub mod bonus;
pub mod config;
pub mod conversion;
pub mod error;
pub mod production;

pub use config::{
    ColonyKind, ConfigError, EconomyConfig, HiveTier, Mission, PrizeAward, PrizeEntry,
};
pub use conversion::{ExchangeQuote, SaleQuote, WithdrawalQuote};
pub use error::EconomyError;
