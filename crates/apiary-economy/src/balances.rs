//! Checked balance mutation helpers for the player ledger.
//!
//! All balance changes anywhere in the workspace go through these
//! functions. Debits are validated against the current balance before
//! anything is written, so a negative balance can never materialize,
//! even transiently.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use apiary_types::{Currency, PlayerLedger};

use crate::error::EconomyError;

/// Credit `amount` of `currency` to the ledger.
///
/// # Errors
///
/// Returns [`EconomyError::NonPositiveAmount`] for zero or negative
/// amounts and [`EconomyError::ArithmeticOverflow`] if the balance would
/// leave the representable range.
pub fn credit(
    ledger: &mut PlayerLedger,
    currency: Currency,
    amount: Decimal,
) -> Result<(), EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }

    match currency {
        Currency::Honey => ledger.honey = checked_add(ledger.honey, amount, currency)?,
        Currency::Flowers => ledger.flowers = checked_add(ledger.flowers, amount, currency)?,
        Currency::Diamonds => ledger.diamonds = checked_add(ledger.diamonds, amount, currency)?,
        Currency::Bvr => ledger.bvr = checked_add(ledger.bvr, amount, currency)?,
        Currency::Tickets => {
            let count = ticket_count(amount)?;
            ledger.tickets = ledger.tickets.checked_add(count).ok_or_else(|| {
                EconomyError::ArithmeticOverflow {
                    context: "ticket credit".to_owned(),
                }
            })?;
        }
    }
    Ok(())
}

/// Debit `amount` of `currency` from the ledger.
///
/// # Errors
///
/// Returns [`EconomyError::NonPositiveAmount`] for zero or negative
/// amounts and [`EconomyError::InsufficientBalance`] if the ledger does
/// not hold enough. The ledger is untouched on failure.
pub fn debit(
    ledger: &mut PlayerLedger,
    currency: Currency,
    amount: Decimal,
) -> Result<(), EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }

    let available = ledger.balance(currency);
    if available < amount {
        return Err(EconomyError::InsufficientBalance {
            currency,
            requested: amount,
            available,
        });
    }

    match currency {
        Currency::Honey => ledger.honey = checked_sub(ledger.honey, amount, currency)?,
        Currency::Flowers => ledger.flowers = checked_sub(ledger.flowers, amount, currency)?,
        Currency::Diamonds => ledger.diamonds = checked_sub(ledger.diamonds, amount, currency)?,
        Currency::Bvr => ledger.bvr = checked_sub(ledger.bvr, amount, currency)?,
        Currency::Tickets => {
            let count = ticket_count(amount)?;
            ledger.tickets = ledger.tickets.checked_sub(count).ok_or(
                EconomyError::InsufficientBalance {
                    currency,
                    requested: amount,
                    available,
                },
            )?;
        }
    }
    Ok(())
}

fn checked_add(
    balance: Decimal,
    amount: Decimal,
    currency: Currency,
) -> Result<Decimal, EconomyError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: format!("credit of {amount} {currency:?}"),
        })
}

fn checked_sub(
    balance: Decimal,
    amount: Decimal,
    currency: Currency,
) -> Result<Decimal, EconomyError> {
    balance
        .checked_sub(amount)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: format!("debit of {amount} {currency:?}"),
        })
}

/// Convert a decimal ticket amount to an integer count.
///
/// Tickets are consumed one at a time; fractional amounts are invalid.
fn ticket_count(amount: Decimal) -> Result<u32, EconomyError> {
    if amount.fract() != Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }
    amount
        .to_u32()
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "ticket count conversion".to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_types::PlayerId;
    use chrono::Utc;

    fn ledger() -> PlayerLedger {
        PlayerLedger::new(PlayerId::new(), Utc::now())
    }

    #[test]
    fn credit_then_debit_roundtrip() {
        let mut l = ledger();
        assert!(credit(&mut l, Currency::Flowers, Decimal::new(100, 0)).is_ok());
        assert!(debit(&mut l, Currency::Flowers, Decimal::new(40, 0)).is_ok());
        assert_eq!(l.flowers, Decimal::new(60, 0));
    }

    #[test]
    fn overdraft_rejected_without_mutation() {
        let mut l = ledger();
        l.diamonds = Decimal::new(5, 0);
        let result = debit(&mut l, Currency::Diamonds, Decimal::new(10, 0));
        assert!(matches!(
            result,
            Err(EconomyError::InsufficientBalance { .. })
        ));
        assert_eq!(l.diamonds, Decimal::new(5, 0));
    }

    #[test]
    fn zero_amount_rejected() {
        let mut l = ledger();
        assert!(credit(&mut l, Currency::Flowers, Decimal::ZERO).is_err());
        assert!(debit(&mut l, Currency::Flowers, Decimal::ZERO).is_err());
    }

    #[test]
    fn negative_amount_rejected() {
        let mut l = ledger();
        assert!(credit(&mut l, Currency::Bvr, Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn ticket_credit_and_debit_are_integral() {
        let mut l = ledger();
        assert!(credit(&mut l, Currency::Tickets, Decimal::new(3, 0)).is_ok());
        assert_eq!(l.tickets, 3);
        assert!(debit(&mut l, Currency::Tickets, Decimal::ONE).is_ok());
        assert_eq!(l.tickets, 2);
        // Fractional tickets are invalid.
        assert!(credit(&mut l, Currency::Tickets, Decimal::new(15, 1)).is_err());
    }

    #[test]
    fn ticket_debit_at_zero_rejected() {
        let mut l = ledger();
        let result = debit(&mut l, Currency::Tickets, Decimal::ONE);
        assert!(matches!(
            result,
            Err(EconomyError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn honey_balance_mutates_only_honey() {
        let mut l = ledger();
        assert!(credit(&mut l, Currency::Honey, Decimal::new(7, 0)).is_ok());
        assert_eq!(l.honey, Decimal::new(7, 0));
        assert_eq!(l.flowers, Decimal::ZERO);
        assert_eq!(l.bvr, Decimal::ZERO);
    }
}
