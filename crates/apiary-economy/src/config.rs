//! Configuration loading and typed catalog structures for the economy.
//!
//! The canonical configuration lives in `apiary-economy.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure, and provides a loader that reads and validates the
//! file. Every section has defaults, so a missing or partial file still
//! yields a playable economy.
//!
//! Catalog entries (colony kinds, hive tiers, prizes, missions) are
//! immutable once loaded; the rules engine only ever reads them.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apiary_types::{ColonyKindId, MissionId, PrizeId};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed configuration violates a structural invariant.
    #[error("invalid economy config: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// A purchasable bee colony kind (producer unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyKind {
    /// Catalog identifier.
    pub id: ColonyKindId,
    /// Display name.
    pub name: String,
    /// Honey produced per colony per hour.
    pub honey_per_hour: Decimal,
    /// Acquisition cost in flowers.
    pub cost_flowers: Decimal,
}

/// An unlockable hive capacity tier.
///
/// Tiers are ordered by `level`; unlocking is monotonic and the effective
/// capacity is the maximum over all unlocked tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveTier {
    /// Ordered tier level, starting at 1.
    pub level: u8,
    /// Honey capacity granted by this tier.
    pub capacity: Decimal,
    /// Unlock cost in flowers. Tier 1 is free and pre-unlocked.
    pub cost_flowers: Decimal,
}

/// What a spin-wheel prize awards when drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrizeAward {
    /// Credit flowers.
    Flowers {
        /// Amount credited.
        amount: Decimal,
    },
    /// Credit diamonds.
    Diamonds {
        /// Amount credited.
        amount: Decimal,
    },
    /// Grant bee colonies.
    Colony {
        /// The colony kind granted.
        kind: ColonyKindId,
        /// How many colonies are granted.
        quantity: u32,
    },
}

/// A weighted entry on the spin wheel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeEntry {
    /// Catalog identifier.
    pub id: PrizeId,
    /// Positive selection weight.
    pub weight: u32,
    /// The award granted when this entry is drawn.
    pub award: PrizeAward,
}

/// A one-time claimable mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    /// Catalog identifier.
    pub id: MissionId,
    /// Display name.
    pub name: String,
    /// Flowers credited when the mission is claimed.
    pub reward_flowers: Decimal,
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// Production catalog: colony kinds and hive tiers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductionConfig {
    /// Purchasable colony kinds.
    #[serde(default = "default_colonies")]
    pub colonies: Vec<ColonyKind>,
    /// Unlockable hive tiers, ordered by level.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<HiveTier>,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            colonies: default_colonies(),
            tiers: default_tiers(),
        }
    }
}

fn default_colonies() -> Vec<ColonyKind> {
    vec![
        ColonyKind {
            id: ColonyKindId(1),
            name: String::from("Worker Swarm"),
            honey_per_hour: Decimal::new(10, 0),
            cost_flowers: Decimal::new(50, 0),
        },
        ColonyKind {
            id: ColonyKindId(2),
            name: String::from("Forager Colony"),
            honey_per_hour: Decimal::new(60, 0),
            cost_flowers: Decimal::new(250, 0),
        },
        ColonyKind {
            id: ColonyKindId(3),
            name: String::from("Royal Hive"),
            honey_per_hour: Decimal::new(400, 0),
            cost_flowers: Decimal::new(1_200, 0),
        },
    ]
}

fn default_tiers() -> Vec<HiveTier> {
    vec![
        HiveTier {
            level: 1,
            capacity: Decimal::new(1_000, 0),
            cost_flowers: Decimal::ZERO,
        },
        HiveTier {
            level: 2,
            capacity: Decimal::new(5_000, 0),
            cost_flowers: Decimal::new(300, 0),
        },
        HiveTier {
            level: 3,
            capacity: Decimal::new(25_000, 0),
            cost_flowers: Decimal::new(1_500, 0),
        },
    ]
}

/// Honey liquidation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaleConfig {
    /// Minimum honey amount that can be sold in one request.
    #[serde(default = "default_min_sell")]
    pub min_sell_threshold: Decimal,
    /// Honey per payout unit; payout scales with `floor(amount / unit_size)`.
    #[serde(default = "default_unit_size")]
    pub unit_size: Decimal,
    /// Flowers credited per payout unit.
    #[serde(default = "default_flowers_per_unit")]
    pub flowers_per_unit: Decimal,
    /// Diamonds credited per payout unit.
    #[serde(default = "default_diamonds_per_unit")]
    pub diamonds_per_unit: Decimal,
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            min_sell_threshold: default_min_sell(),
            unit_size: default_unit_size(),
            flowers_per_unit: default_flowers_per_unit(),
            diamonds_per_unit: default_diamonds_per_unit(),
        }
    }
}

fn default_min_sell() -> Decimal {
    Decimal::new(100, 0)
}

fn default_unit_size() -> Decimal {
    Decimal::new(10, 0)
}

fn default_flowers_per_unit() -> Decimal {
    Decimal::ONE
}

fn default_diamonds_per_unit() -> Decimal {
    Decimal::new(5, 0)
}

/// Currency-to-currency exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeConfig {
    /// Bonus multiplier for diamonds-to-flowers (0.10 = +10%).
    #[serde(default = "default_diamond_bonus")]
    pub diamond_bonus: Decimal,
    /// Divisor applied to BVR-to-flowers conversions.
    #[serde(default = "default_bvr_divisor")]
    pub bvr_divisor: Decimal,
    /// Minimum BVR amount accepted for conversion.
    #[serde(default = "default_bvr_minimum")]
    pub bvr_minimum: Decimal,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            diamond_bonus: default_diamond_bonus(),
            bvr_divisor: default_bvr_divisor(),
            bvr_minimum: default_bvr_minimum(),
        }
    }
}

fn default_diamond_bonus() -> Decimal {
    // 10% bonus on the flower output.
    Decimal::new(1, 1)
}

fn default_bvr_divisor() -> Decimal {
    Decimal::new(10, 0)
}

fn default_bvr_minimum() -> Decimal {
    Decimal::new(100, 0)
}

/// Parameters for one withdrawal currency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WithdrawalRail {
    /// USD value of one unit of the escrow currency.
    pub usd_rate: Decimal,
    /// Fee as a fraction of the converted value (0.05 = 5%).
    pub fee_rate: Decimal,
    /// Minimum withdrawal amount in the escrow currency.
    pub minimum: Decimal,
}

/// Withdrawal and deposit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WithdrawalConfig {
    /// Diamond withdrawal rail.
    #[serde(default = "default_diamond_rail")]
    pub diamonds: WithdrawalRail,
    /// BVR withdrawal rail.
    #[serde(default = "default_bvr_rail")]
    pub bvr: WithdrawalRail,
    /// USD-quoted flower withdrawal rail.
    #[serde(default = "default_flower_rail")]
    pub flowers: WithdrawalRail,
    /// Flat flower fee subtracted when a deposit is approved.
    #[serde(default = "default_deposit_fee")]
    pub deposit_flat_fee: Decimal,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            diamonds: default_diamond_rail(),
            bvr: default_bvr_rail(),
            flowers: default_flower_rail(),
            deposit_flat_fee: default_deposit_fee(),
        }
    }
}

fn default_diamond_rail() -> WithdrawalRail {
    WithdrawalRail {
        usd_rate: Decimal::new(1, 2),
        fee_rate: Decimal::new(5, 2),
        minimum: Decimal::new(10_000, 0),
    }
}

fn default_bvr_rail() -> WithdrawalRail {
    WithdrawalRail {
        usd_rate: Decimal::new(5, 1),
        fee_rate: Decimal::new(2, 2),
        minimum: Decimal::new(25, 0),
    }
}

fn default_flower_rail() -> WithdrawalRail {
    WithdrawalRail {
        usd_rate: Decimal::new(1, 1),
        fee_rate: Decimal::new(5, 2),
        minimum: Decimal::new(100, 0),
    }
}

fn default_deposit_fee() -> Decimal {
    Decimal::new(5, 0)
}

/// Referral bonus cascade parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferralConfig {
    /// Fraction of the first purchase credited to the sponsor.
    #[serde(default = "default_first_rate")]
    pub first_purchase_rate: Decimal,
    /// Fixed flower bonus added on the first purchase.
    #[serde(default = "default_first_fixed")]
    pub first_purchase_fixed_bonus: Decimal,
    /// Fraction of every later purchase credited to the sponsor.
    #[serde(default = "default_recurring_rate")]
    pub recurring_rate: Decimal,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            first_purchase_rate: default_first_rate(),
            first_purchase_fixed_bonus: default_first_fixed(),
            recurring_rate: default_recurring_rate(),
        }
    }
}

fn default_first_rate() -> Decimal {
    Decimal::new(1, 1)
}

fn default_first_fixed() -> Decimal {
    Decimal::new(100, 0)
}

fn default_recurring_rate() -> Decimal {
    Decimal::new(5, 2)
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level economy configuration.
///
/// Mirrors the structure of `apiary-economy.yaml`. All sections have
/// defaults matching the numbers the game design documents describe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Colony and hive tier catalogs.
    #[serde(default)]
    pub production: ProductionConfig,

    /// Honey liquidation parameters.
    #[serde(default)]
    pub sale: SaleConfig,

    /// Exchange policy parameters.
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Withdrawal rails and deposit fee.
    #[serde(default)]
    pub withdrawal: WithdrawalConfig,

    /// Referral cascade parameters.
    #[serde(default)]
    pub referral: ReferralConfig,

    /// Spin-wheel prize table.
    #[serde(default = "default_prizes")]
    pub prizes: Vec<PrizeEntry>,

    /// Claimable mission catalog.
    #[serde(default = "default_missions")]
    pub missions: Vec<Mission>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            production: ProductionConfig::default(),
            sale: SaleConfig::default(),
            exchange: ExchangeConfig::default(),
            withdrawal: WithdrawalConfig::default(),
            referral: ReferralConfig::default(),
            prizes: default_prizes(),
            missions: default_missions(),
        }
    }
}

fn default_prizes() -> Vec<PrizeEntry> {
    vec![
        PrizeEntry {
            id: PrizeId(1),
            weight: 60,
            award: PrizeAward::Flowers {
                amount: Decimal::new(10, 0),
            },
        },
        PrizeEntry {
            id: PrizeId(2),
            weight: 30,
            award: PrizeAward::Flowers {
                amount: Decimal::new(50, 0),
            },
        },
        PrizeEntry {
            id: PrizeId(3),
            weight: 9,
            award: PrizeAward::Diamonds {
                amount: Decimal::new(100, 0),
            },
        },
        PrizeEntry {
            id: PrizeId(4),
            weight: 1,
            award: PrizeAward::Colony {
                kind: ColonyKindId(1),
                quantity: 1,
            },
        },
    ]
}

fn default_missions() -> Vec<Mission> {
    vec![
        Mission {
            id: MissionId(1),
            name: String::from("First Harvest"),
            reward_flowers: Decimal::new(25, 0),
        },
        Mission {
            id: MissionId(2),
            name: String::from("Busy Bee"),
            reward_flowers: Decimal::new(75, 0),
        },
        Mission {
            id: MissionId(3),
            name: String::from("Queen's Favor"),
            reward_flowers: Decimal::new(200, 0),
        },
    ]
}

impl EconomyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a structural invariant is violated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a structural invariant is violated.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a tier-1 entry is missing,
    /// a prize weight is zero, or the prize table is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.production.tiers.iter().any(|t| t.level == 1) {
            return Err(ConfigError::Invalid {
                reason: "hive tier 1 must exist (it is pre-unlocked)".to_owned(),
            });
        }
        if self.prizes.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "prize table must not be empty".to_owned(),
            });
        }
        if self.prizes.iter().any(|p| p.weight == 0) {
            return Err(ConfigError::Invalid {
                reason: "prize weights must be strictly positive".to_owned(),
            });
        }
        Ok(())
    }

    /// Look up a colony kind in the catalog.
    pub fn colony(&self, id: ColonyKindId) -> Option<&ColonyKind> {
        self.production.colonies.iter().find(|c| c.id == id)
    }

    /// Look up a hive tier in the catalog.
    pub fn tier(&self, level: u8) -> Option<&HiveTier> {
        self.production.tiers.iter().find(|t| t.level == level)
    }

    /// Look up a mission in the catalog.
    pub fn mission(&self, id: MissionId) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == id)
    }

    /// The withdrawal rail for the given currency.
    pub const fn rail(&self, currency: apiary_types::WithdrawCurrency) -> &WithdrawalRail {
        match currency {
            apiary_types::WithdrawCurrency::Diamonds => &self.withdrawal.diamonds,
            apiary_types::WithdrawCurrency::Bvr => &self.withdrawal.bvr,
            apiary_types::WithdrawCurrency::Flowers => &self.withdrawal.flowers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EconomyConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.tier(1).is_some());
        assert!(!config.prizes.is_empty());
    }

    #[test]
    fn parse_empty_yaml_uses_defaults() {
        let config = EconomyConfig::parse("{}");
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.exchange.diamond_bonus, Decimal::new(1, 1));
        assert_eq!(config.exchange.bvr_minimum, Decimal::new(100, 0));
    }

    #[test]
    fn parse_overrides_section() {
        let yaml = r"
exchange:
  diamond_bonus: 0.25
  bvr_divisor: 20
  bvr_minimum: 500
";
        let config = EconomyConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.exchange.diamond_bonus, Decimal::new(25, 2));
        assert_eq!(config.exchange.bvr_minimum, Decimal::new(500, 0));
        // Untouched sections keep defaults.
        assert_eq!(config.sale.min_sell_threshold, Decimal::new(100, 0));
    }

    #[test]
    fn zero_weight_prize_rejected() {
        let yaml = r"
prizes:
  - id: 1
    weight: 0
    award:
      type: flowers
      amount: 10
";
        assert!(EconomyConfig::parse(yaml).is_err());
    }

    #[test]
    fn missing_tier_one_rejected() {
        let yaml = r"
production:
  tiers:
    - level: 2
      capacity: 5000
      cost_flowers: 300
";
        assert!(EconomyConfig::parse(yaml).is_err());
    }

    #[test]
    fn catalog_lookup() {
        let config = EconomyConfig::default();
        assert!(config.colony(ColonyKindId(1)).is_some());
        assert!(config.colony(ColonyKindId(99)).is_none());
        assert!(config.mission(MissionId(2)).is_some());
    }
}
