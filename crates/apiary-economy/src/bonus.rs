//! Referral bonus arithmetic.
//!
//! Pure bonus computation only; the cascade itself (link lookup,
//! idempotency, sponsor crediting) lives in the ledger crate.

use rust_decimal::Decimal;

use crate::config::EconomyConfig;
use crate::error::EconomyError;

/// Bonus for a sponsored player's first flower purchase:
/// `floor(amount * first_purchase_rate) + first_purchase_fixed_bonus`.
///
/// # Errors
///
/// Returns [`EconomyError::ArithmeticOverflow`] on range overflow and
/// [`EconomyError::NonPositiveAmount`] for non-positive amounts.
pub fn first_purchase_bonus(
    amount: Decimal,
    config: &EconomyConfig,
) -> Result<Decimal, EconomyError> {
    let proportional = proportional_bonus(amount, config.referral.first_purchase_rate)?;
    proportional
        .checked_add(config.referral.first_purchase_fixed_bonus)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "first purchase bonus".to_owned(),
        })
}

/// Bonus for every later purchase: `floor(amount * recurring_rate)`.
///
/// # Errors
///
/// Returns [`EconomyError::ArithmeticOverflow`] on range overflow and
/// [`EconomyError::NonPositiveAmount`] for non-positive amounts.
pub fn recurring_bonus(amount: Decimal, config: &EconomyConfig) -> Result<Decimal, EconomyError> {
    proportional_bonus(amount, config.referral.recurring_rate)
}

fn proportional_bonus(amount: Decimal, rate: Decimal) -> Result<Decimal, EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }
    Ok(amount
        .checked_mul(rate)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "proportional referral bonus".to_owned(),
        })?
        .floor())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EconomyConfig {
        EconomyConfig::default()
    }

    #[test]
    fn first_bonus_floors_then_adds_fixed() {
        // 10% of 255 = 25.5, floored to 25, plus fixed 100 = 125.
        let bonus = first_purchase_bonus(Decimal::new(255, 0), &config());
        assert_eq!(bonus.ok(), Some(Decimal::new(125, 0)));
    }

    #[test]
    fn recurring_bonus_floors() {
        // 5% of 99 = 4.95, floored to 4.
        let bonus = recurring_bonus(Decimal::new(99, 0), &config());
        assert_eq!(bonus.ok(), Some(Decimal::new(4, 0)));
    }

    #[test]
    fn non_positive_purchase_rejected() {
        assert!(first_purchase_bonus(Decimal::ZERO, &config()).is_err());
        assert!(recurring_bonus(Decimal::new(-10, 0), &config()).is_err());
    }
}
