//! Enumeration types for the Apiary game economy.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Currencies
// ---------------------------------------------------------------------------

/// A balance held on a player ledger.
///
/// - `Honey` accrues over time, bounded by the unlocked hive capacity.
/// - `Flowers` is the spendable currency (colonies, tiers, purchases).
/// - `Diamonds` and `Bvr` are value-bearing and can be withdrawn.
/// - `Tickets` is the consumable spin-wheel resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Currency {
    /// Time-accruing primary resource, capped by hive capacity.
    Honey,
    /// Spendable currency used for purchases.
    Flowers,
    /// Withdrawable premium currency.
    Diamonds,
    /// Withdrawable token currency.
    Bvr,
    /// Consumable spin-wheel tickets.
    Tickets,
}

/// The currency a withdrawal request is denominated in.
///
/// `Flowers` withdrawals are quoted in USD but escrow and refund in the
/// spendable flower currency; `Diamonds` and `Bvr` escrow and refund in
/// their own currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum WithdrawCurrency {
    /// Withdraw diamonds to an external address.
    Diamonds,
    /// Withdraw BVR tokens to an external address.
    Bvr,
    /// Withdraw the USD value of flowers to an external account.
    Flowers,
}

impl WithdrawCurrency {
    /// The ledger currency that is escrowed at creation and refunded on
    /// rejection. The refund always uses this currency, never a converted
    /// amount.
    pub const fn escrow_currency(self) -> Currency {
        match self {
            Self::Diamonds => Currency::Diamonds,
            Self::Bvr => Currency::Bvr,
            Self::Flowers => Currency::Flowers,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a deposit or withdrawal transaction.
///
/// `Pending -> Approved` and `Pending -> Rejected` are the only legal
/// transitions; both end states are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TransactionStatus {
    /// Awaiting administrative review. Withdrawal amounts are escrowed.
    Pending,
    /// Approved and paid out. Terminal.
    Approved,
    /// Rejected; escrow (if any) has been refunded. Terminal.
    Rejected,
}

impl TransactionStatus {
    /// Whether this status can never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

// ---------------------------------------------------------------------------
// Exchange policies
// ---------------------------------------------------------------------------

/// A currency-to-currency exchange supported by the rules engine.
///
/// Each variant is a distinct pricing policy, so the compiler enforces
/// which parameters apply to which exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ExchangeKind {
    /// Diamonds to flowers with a bonus multiplier on the output.
    DiamondsToFlowers,
    /// BVR to flowers through a divisor, gated by a minimum amount.
    BvrToFlowers,
}

impl ExchangeKind {
    /// The currency debited by this exchange.
    pub const fn source(self) -> Currency {
        match self {
            Self::DiamondsToFlowers => Currency::Diamonds,
            Self::BvrToFlowers => Currency::Bvr,
        }
    }

    /// The currency credited by this exchange.
    pub const fn target(self) -> Currency {
        match self {
            Self::DiamondsToFlowers | Self::BvrToFlowers => Currency::Flowers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Approved.is_terminal());
        assert!(TransactionStatus::Rejected.is_terminal());
    }

    #[test]
    fn escrow_currency_matches_kind() {
        assert_eq!(
            WithdrawCurrency::Bvr.escrow_currency(),
            Currency::Bvr,
        );
        // USD-quoted flower withdrawals escrow the spendable flower
        // currency, which is also what a rejection refunds.
        assert_eq!(
            WithdrawCurrency::Flowers.escrow_currency(),
            Currency::Flowers,
        );
    }

    #[test]
    fn exchange_endpoints() {
        assert_eq!(ExchangeKind::DiamondsToFlowers.source(), Currency::Diamonds);
        assert_eq!(ExchangeKind::BvrToFlowers.source(), Currency::Bvr);
        assert_eq!(ExchangeKind::BvrToFlowers.target(), Currency::Flowers);
    }
}
