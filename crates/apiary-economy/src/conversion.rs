//! Conversion quoting: honey liquidation, currency exchange, withdrawal
//! and deposit pricing.
//!
//! Every function here only *quotes* -- it computes what would be debited
//! and credited without touching any ledger. Callers apply the quote
//! under the player lock, all-or-nothing. Outputs destined for
//! withdrawal are floored so fractional units beyond representable
//! precision are never credited.

use rust_decimal::{Decimal, RoundingStrategy};

use apiary_types::{ExchangeKind, WithdrawCurrency};

use crate::config::EconomyConfig;
use crate::error::EconomyError;

/// Decimal places kept on USD-converted values.
const USD_PRECISION: u32 = 2;

// ---------------------------------------------------------------------------
// Honey liquidation
// ---------------------------------------------------------------------------

/// The priced outcome of selling honey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleQuote {
    /// Honey debited (the full requested amount).
    pub honey_debited: Decimal,
    /// Whole payout units: `floor(amount / unit_size)`.
    pub units: Decimal,
    /// Flowers credited.
    pub flowers: Decimal,
    /// Diamonds credited.
    pub diamonds: Decimal,
}

/// Price a honey sale.
///
/// # Errors
///
/// Returns [`EconomyError::BelowMinimumThreshold`] below the configured
/// sell threshold, [`EconomyError::NonPositiveAmount`] for non-positive
/// amounts, and [`EconomyError::ArithmeticOverflow`] on range overflow.
pub fn quote_honey_sale(
    amount: Decimal,
    config: &EconomyConfig,
) -> Result<SaleQuote, EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }
    if amount < config.sale.min_sell_threshold {
        return Err(EconomyError::BelowMinimumThreshold {
            requested: amount,
            minimum: config.sale.min_sell_threshold,
        });
    }

    let units = amount
        .checked_div(config.sale.unit_size)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "sale unit division".to_owned(),
        })?
        .floor();

    let flowers = units.checked_mul(config.sale.flowers_per_unit).ok_or_else(|| {
        EconomyError::ArithmeticOverflow {
            context: "sale flower payout".to_owned(),
        }
    })?;
    let diamonds = units
        .checked_mul(config.sale.diamonds_per_unit)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "sale diamond payout".to_owned(),
        })?;

    Ok(SaleQuote {
        honey_debited: amount,
        units,
        flowers,
        diamonds,
    })
}

// ---------------------------------------------------------------------------
// Currency exchange
// ---------------------------------------------------------------------------

/// The priced outcome of a currency-to-currency exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeQuote {
    /// The exchange policy applied.
    pub kind: ExchangeKind,
    /// Amount debited from the source currency.
    pub debit: Decimal,
    /// Amount credited to the target currency.
    pub credit: Decimal,
}

/// Price a currency exchange under the policy for `kind`.
///
/// - `DiamondsToFlowers` multiplies by `1 + diamond_bonus`.
/// - `BvrToFlowers` divides by `bvr_divisor` and rejects amounts below
///   `bvr_minimum`.
///
/// # Errors
///
/// Returns [`EconomyError::BelowMinimumThreshold`] for gated exchanges
/// below their minimum, [`EconomyError::NonPositiveAmount`] for
/// non-positive amounts, and [`EconomyError::ArithmeticOverflow`] on
/// range overflow or a zero divisor.
pub fn quote_exchange(
    kind: ExchangeKind,
    amount: Decimal,
    config: &EconomyConfig,
) -> Result<ExchangeQuote, EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }

    let credit = match kind {
        ExchangeKind::DiamondsToFlowers => {
            let multiplier = Decimal::ONE
                .checked_add(config.exchange.diamond_bonus)
                .ok_or_else(|| EconomyError::ArithmeticOverflow {
                    context: "exchange bonus multiplier".to_owned(),
                })?;
            amount
                .checked_mul(multiplier)
                .ok_or_else(|| EconomyError::ArithmeticOverflow {
                    context: "diamond exchange output".to_owned(),
                })?
        }
        ExchangeKind::BvrToFlowers => {
            if amount < config.exchange.bvr_minimum {
                return Err(EconomyError::BelowMinimumThreshold {
                    requested: amount,
                    minimum: config.exchange.bvr_minimum,
                });
            }
            amount
                .checked_div(config.exchange.bvr_divisor)
                .ok_or_else(|| EconomyError::ArithmeticOverflow {
                    context: "BVR exchange divisor".to_owned(),
                })?
        }
    };

    Ok(ExchangeQuote {
        kind,
        debit: amount,
        credit,
    })
}

// ---------------------------------------------------------------------------
// Withdrawal and deposit pricing
// ---------------------------------------------------------------------------

/// The priced outcome of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalQuote {
    /// USD value of the escrowed amount, floored to cents.
    pub converted: Decimal,
    /// Fee on the converted value, floored to cents.
    pub fee: Decimal,
    /// Net USD payout after the fee.
    pub net: Decimal,
}

/// Price a withdrawal on the rail for `currency`.
///
/// # Errors
///
/// Returns [`EconomyError::EmptyAddress`] for a blank destination,
/// [`EconomyError::BelowMinimumThreshold`] below the rail minimum,
/// [`EconomyError::NonPositiveAmount`] for non-positive amounts, and
/// [`EconomyError::ArithmeticOverflow`] on range overflow.
pub fn quote_withdrawal(
    currency: WithdrawCurrency,
    amount: Decimal,
    address: &str,
    config: &EconomyConfig,
) -> Result<WithdrawalQuote, EconomyError> {
    if address.trim().is_empty() {
        return Err(EconomyError::EmptyAddress);
    }
    if amount <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount });
    }

    let rail = config.rail(currency);
    if amount < rail.minimum {
        return Err(EconomyError::BelowMinimumThreshold {
            requested: amount,
            minimum: rail.minimum,
        });
    }

    let converted = amount
        .checked_mul(rail.usd_rate)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "withdrawal USD conversion".to_owned(),
        })?
        .round_dp_with_strategy(USD_PRECISION, RoundingStrategy::ToZero);

    let fee = converted
        .checked_mul(rail.fee_rate)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "withdrawal fee".to_owned(),
        })?
        .round_dp_with_strategy(USD_PRECISION, RoundingStrategy::ToZero);

    let net = converted
        .checked_sub(fee)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "withdrawal net".to_owned(),
        })?;

    Ok(WithdrawalQuote {
        converted,
        fee,
        net,
    })
}

/// Net flowers credited when a declared deposit is approved.
///
/// # Errors
///
/// Returns [`EconomyError::BelowMinimumThreshold`] if the declared amount
/// does not exceed the flat fee, and [`EconomyError::NonPositiveAmount`]
/// for non-positive declarations.
pub fn deposit_credit(declared: Decimal, config: &EconomyConfig) -> Result<Decimal, EconomyError> {
    if declared <= Decimal::ZERO {
        return Err(EconomyError::NonPositiveAmount { amount: declared });
    }
    let fee = config.withdrawal.deposit_flat_fee;
    if declared <= fee {
        return Err(EconomyError::BelowMinimumThreshold {
            requested: declared,
            minimum: fee,
        });
    }
    declared
        .checked_sub(fee)
        .ok_or_else(|| EconomyError::ArithmeticOverflow {
            context: "deposit net credit".to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EconomyConfig {
        EconomyConfig::default()
    }

    #[test]
    fn sale_below_threshold_rejected() {
        let result = quote_honey_sale(Decimal::new(99, 0), &config());
        assert!(matches!(
            result,
            Err(EconomyError::BelowMinimumThreshold { .. })
        ));
    }

    #[test]
    fn sale_floors_units() {
        // 105 honey at unit size 10 -> 10 whole units, remainder forfeited.
        let quote = quote_honey_sale(Decimal::new(105, 0), &config());
        assert!(quote.is_ok());
        let quote = quote.unwrap_or(SaleQuote {
            honey_debited: Decimal::ZERO,
            units: Decimal::ZERO,
            flowers: Decimal::ZERO,
            diamonds: Decimal::ZERO,
        });
        assert_eq!(quote.units, Decimal::new(10, 0));
        assert_eq!(quote.flowers, Decimal::new(10, 0));
        assert_eq!(quote.diamonds, Decimal::new(50, 0));
        assert_eq!(quote.honey_debited, Decimal::new(105, 0));
    }

    #[test]
    fn diamond_exchange_applies_bonus() {
        // 100 diamonds at 10% bonus -> 110 flowers.
        let quote = quote_exchange(ExchangeKind::DiamondsToFlowers, Decimal::new(100, 0), &config());
        assert_eq!(
            quote.map(|q| q.credit).ok(),
            Some(Decimal::new(110, 0)),
        );
    }

    #[test]
    fn bvr_exchange_below_minimum_rejected() {
        // 50 BVR with minimum 100 -> rejected, nothing priced.
        let result = quote_exchange(ExchangeKind::BvrToFlowers, Decimal::new(50, 0), &config());
        assert_eq!(
            result,
            Err(EconomyError::BelowMinimumThreshold {
                requested: Decimal::new(50, 0),
                minimum: Decimal::new(100, 0),
            }),
        );
    }

    #[test]
    fn bvr_exchange_divides() {
        let quote = quote_exchange(ExchangeKind::BvrToFlowers, Decimal::new(200, 0), &config());
        assert_eq!(quote.map(|q| q.credit).ok(), Some(Decimal::new(20, 0)));
    }

    #[test]
    fn withdrawal_quote_floors_to_cents() {
        // 10001 diamonds at 0.01 USD = 100.01 USD; 5% fee = 5.0005 -> 5.00.
        let quote = quote_withdrawal(
            WithdrawCurrency::Diamonds,
            Decimal::new(10_001, 0),
            "0xfeed",
            &config(),
        );
        assert!(quote.is_ok());
        let quote = quote.unwrap_or(WithdrawalQuote {
            converted: Decimal::ZERO,
            fee: Decimal::ZERO,
            net: Decimal::ZERO,
        });
        assert_eq!(quote.converted, Decimal::new(10_001, 2));
        assert_eq!(quote.fee, Decimal::new(500, 2));
        assert_eq!(quote.net, Decimal::new(9_501, 2));
    }

    #[test]
    fn withdrawal_empty_address_rejected() {
        let result = quote_withdrawal(
            WithdrawCurrency::Bvr,
            Decimal::new(100, 0),
            "   ",
            &config(),
        );
        assert_eq!(result, Err(EconomyError::EmptyAddress));
    }

    #[test]
    fn withdrawal_below_rail_minimum_rejected() {
        let result = quote_withdrawal(
            WithdrawCurrency::Diamonds,
            Decimal::new(500, 0),
            "0xfeed",
            &config(),
        );
        assert!(matches!(
            result,
            Err(EconomyError::BelowMinimumThreshold { .. })
        ));
    }

    #[test]
    fn deposit_credit_subtracts_flat_fee() {
        assert_eq!(
            deposit_credit(Decimal::new(100, 0), &config()).ok(),
            Some(Decimal::new(95, 0)),
        );
    }

    #[test]
    fn deposit_at_or_below_fee_rejected() {
        assert!(deposit_credit(Decimal::new(5, 0), &config()).is_err());
        assert!(deposit_credit(Decimal::new(3, 0), &config()).is_err());
    }
}
