//! Transaction types for the deposit/withdrawal approval workflow.
//!
//! A [`Transaction`] is created `Pending`, reviewed by an administrator,
//! and moves to exactly one terminal state. Withdrawals escrow the
//! requested amount at creation time; deposits have no balance effect
//! until approved.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{TransactionStatus, WithdrawCurrency};
use crate::ids::{PlayerId, TransactionId};

// ---------------------------------------------------------------------------
// Transaction kind (tagged union)
// ---------------------------------------------------------------------------

/// What a transaction does, as a tagged union.
///
/// Each variant carries only the fields that apply to it, so there are no
/// optional fields whose presence depends on an out-of-band kind code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Withdraw a value-bearing currency to an external address.
    Withdrawal {
        /// The currency being withdrawn.
        currency: WithdrawCurrency,
        /// Destination wallet address or account. Never empty.
        address: String,
    },
    /// Declare an external payment that, once approved, credits flowers.
    Deposit {
        /// External payment reference supplied by the player.
        reference: String,
    },
}

// ---------------------------------------------------------------------------
// Transaction record
// ---------------------------------------------------------------------------

/// A deposit or withdrawal request moving through the approval workflow.
///
/// Once `status` is terminal the record is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// The requesting player.
    pub player: PlayerId,
    /// Withdrawal or deposit, with kind-specific fields.
    pub kind: TransactionKind,
    /// Amount requested, in the escrow currency (withdrawals) or declared
    /// flower amount (deposits). For withdrawals this equals the escrowed
    /// debit exactly.
    #[ts(as = "String")]
    pub requested: Decimal,
    /// Currency-converted value (e.g. USD) of the request.
    #[ts(as = "String")]
    pub converted: Decimal,
    /// Fee charged on the converted value.
    #[ts(as = "String")]
    pub fee: Decimal,
    /// Net value after the fee.
    #[ts(as = "String")]
    pub net: Decimal,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request reached a terminal state, if it has.
    pub processed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Player request to create a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewWithdrawal {
    /// The currency to withdraw.
    pub currency: WithdrawCurrency,
    /// Amount in the escrow currency.
    #[ts(as = "String")]
    pub amount: Decimal,
    /// Destination wallet address or account.
    pub address: String,
}

/// Player declaration of an external deposit payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewDeposit {
    /// Declared flower amount of the external payment.
    #[ts(as = "String")]
    pub amount: Decimal,
    /// External payment reference.
    pub reference: String,
}

// ---------------------------------------------------------------------------
// Lifecycle events
// ---------------------------------------------------------------------------

/// Notification emitted on every transaction lifecycle change.
///
/// Delivery (email, push) is a collaborator's responsibility; the core
/// only publishes the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransactionEvent {
    /// A new transaction entered the pending queue.
    Created {
        /// The transaction as created.
        transaction: Transaction,
    },
    /// A pending transaction was approved.
    Approved {
        /// The transaction in its terminal state.
        transaction: Transaction,
    },
    /// A pending transaction was rejected and any escrow refunded.
    Rejected {
        /// The transaction in its terminal state.
        transaction: Transaction,
    },
}

impl TransactionEvent {
    /// The transaction this event concerns.
    pub const fn transaction(&self) -> &Transaction {
        match self {
            Self::Created { transaction }
            | Self::Approved { transaction }
            | Self::Rejected { transaction } => transaction,
        }
    }
}
