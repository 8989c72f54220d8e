//! Error types for the apiary-economy crate.
//!
//! All rule evaluations that can fail return typed errors rather than
//! panicking. Validation errors are returned synchronously to the caller
//! and never partially applied.

use rust_decimal::Decimal;

use apiary_types::{ColonyKindId, Currency, MissionId};

/// Errors produced by the pure economy rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EconomyError {
    /// A debit was requested that exceeds the available balance.
    #[error("insufficient {currency:?}: wanted {requested} but only have {available}")]
    InsufficientBalance {
        /// The currency being debited.
        currency: Currency,
        /// The amount the caller attempted to debit.
        requested: Decimal,
        /// The balance actually held.
        available: Decimal,
    },

    /// An amount fell below the minimum the operation requires.
    #[error("amount {requested} is below the minimum of {minimum}")]
    BelowMinimumThreshold {
        /// The amount requested.
        requested: Decimal,
        /// The required minimum.
        minimum: Decimal,
    },

    /// A credit or debit amount was zero or negative.
    #[error("amount must be strictly positive, got {amount}")]
    NonPositiveAmount {
        /// The invalid amount.
        amount: Decimal,
    },

    /// An arithmetic operation overflowed the decimal range.
    #[error("arithmetic overflow in economy computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// A colony kind is not present in the catalog.
    #[error("unknown colony kind: {0}")]
    UnknownColonyKind(ColonyKindId),

    /// A hive tier level is not present in the catalog.
    #[error("unknown hive tier: {0}")]
    UnknownTier(u8),

    /// A mission is not present in the catalog.
    #[error("unknown mission: {0}")]
    UnknownMission(MissionId),

    /// A wallet address or payment reference was empty.
    #[error("destination address must not be empty")]
    EmptyAddress,
}
