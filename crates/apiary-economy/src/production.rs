//! Honey production: rate, capacity, and time-based accrual.
//!
//! All functions here are pure and deterministic. The same inputs always
//! produce the same outputs; callers own the clock.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use apiary_types::ColonyKindId;

use crate::config::EconomyConfig;
use crate::error::EconomyError;

/// Seconds in one production hour; per-colony rates are hourly.
const SECONDS_PER_HOUR: u32 = 3_600;

/// Compute the total hourly honey production for a set of owned colonies.
///
/// The rate is the sum over owned kinds of `honey_per_hour * quantity`.
///
/// # Errors
///
/// Returns [`EconomyError::UnknownColonyKind`] if an owned kind is not in
/// the catalog, or [`EconomyError::ArithmeticOverflow`] if the sum leaves
/// the decimal range.
pub fn production_rate(
    colonies: &BTreeMap<ColonyKindId, u32>,
    config: &EconomyConfig,
) -> Result<Decimal, EconomyError> {
    let mut rate = Decimal::ZERO;
    for (kind, quantity) in colonies {
        let entry = config
            .colony(*kind)
            .ok_or(EconomyError::UnknownColonyKind(*kind))?;
        let contribution = entry
            .honey_per_hour
            .checked_mul(Decimal::from(*quantity))
            .ok_or_else(|| EconomyError::ArithmeticOverflow {
                context: format!("production contribution of colony kind {kind}"),
            })?;
        rate = rate
            .checked_add(contribution)
            .ok_or_else(|| EconomyError::ArithmeticOverflow {
                context: "total production rate".to_owned(),
            })?;
    }
    Ok(rate)
}

/// Compute the effective hive capacity for a set of unlocked tiers.
///
/// The capacity is the maximum over all unlocked tiers that exist in the
/// catalog; zero if none do. Unlocking a tier can therefore only raise
/// the ceiling, never lower it.
pub fn capacity(unlocked_tiers: &BTreeSet<u8>, config: &EconomyConfig) -> Decimal {
    unlocked_tiers
        .iter()
        .filter_map(|level| config.tier(*level))
        .map(|tier| tier.capacity)
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// Apply time-based accrual to a honey balance.
///
/// Returns `min(current + rate * elapsed / 3600, capacity)`, clamped so
/// the result is never below `current`: accrual on its own is monotonic
/// non-decreasing. If `current` already exceeds `capacity` (a lowered
/// catalog after a reload), the balance is left untouched rather than
/// truncated.
pub fn accrue(
    current: Decimal,
    rate: Decimal,
    elapsed_seconds: u64,
    capacity: Decimal,
) -> Decimal {
    let gained = rate
        .saturating_mul(Decimal::from(elapsed_seconds))
        .checked_div(Decimal::from(SECONDS_PER_HOUR))
        .unwrap_or(Decimal::ZERO);

    current.saturating_add(gained).min(capacity).max(current)
}
