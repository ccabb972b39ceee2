//! Per-level reward constants and multiplier scaling

use anyhow::{Context, Result, bail};
use ethers::types::U256;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::reputation::{MULTIPLIER_DENOMINATOR_BPS, MultiplierTier};
use crate::voucher::types::{ChainId, RewardQuantities};

/// Decimals of every reward token
pub const TOKEN_DECIMALS: u32 = 18;

/// Reward constants for one chain at one level, in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRewards {
    /// Scaled by the multiplier
    pub primary_base: U256,
    /// Paid as-is
    pub secondary: U256,
}

impl ChainRewards {
    /// `None` when the scaled primary amount does not fit in a uint256.
    pub fn quantities(&self, tier: MultiplierTier) -> Option<RewardQuantities> {
        Some(RewardQuantities {
            primary_amount: scale_by_bps(self.primary_base, tier.basis_points())?,
            secondary_amount: self.secondary,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRewards {
    pub base: ChainRewards,
    pub celo: ChainRewards,
}

impl LevelRewards {
    pub fn chain(&self, chain: ChainId) -> &ChainRewards {
        match chain {
            ChainId::Base => &self.base,
            ChainId::Celo => &self.celo,
        }
    }
}

/// Reward constants for every playable level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardSchedule {
    levels: BTreeMap<u32, LevelRewards>,
}

impl RewardSchedule {
    pub fn new(levels: BTreeMap<u32, LevelRewards>) -> Self {
        Self { levels }
    }

    pub fn for_level(&self, level: u32) -> Option<&LevelRewards> {
        self.levels.get(&level)
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Every level and chain must scale at every tier without overflowing.
    pub fn check_scalable(&self) -> Result<()> {
        for (level, rewards) in &self.levels {
            for chain in ChainId::ALL {
                let chain_rewards = rewards.chain(chain);
                for tier in MultiplierTier::ALL {
                    if chain_rewards.quantities(tier).is_none() {
                        bail!(
                            "Level {} {} primary amount {} overflows at the {} tier",
                            level,
                            chain,
                            format_token_amount(chain_rewards.primary_base),
                            tier.label()
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for RewardSchedule {
    /// 10 PUZZ + 0.1 WCT on Base, 10 RWRD + 0.05 CELO on Celo, levels 1 and 2
    fn default() -> Self {
        let per_level = LevelRewards {
            base: ChainRewards {
                primary_base: U256::from(10u64) * U256::exp10(TOKEN_DECIMALS as usize),
                secondary: U256::exp10(TOKEN_DECIMALS as usize - 1),
            },
            celo: ChainRewards {
                primary_base: U256::from(10u64) * U256::exp10(TOKEN_DECIMALS as usize),
                secondary: U256::from(5u64) * U256::exp10(TOKEN_DECIMALS as usize - 2),
            },
        };
        Self::new(BTreeMap::from([(1, per_level), (2, per_level)]))
    }
}

/// `round(amount * bps / 10_000)`, half up. `None` on overflow.
pub fn scale_by_bps(amount: U256, bps: u32) -> Option<U256> {
    let denominator = U256::from(MULTIPLIER_DENOMINATOR_BPS);
    let scaled = amount
        .checked_mul(U256::from(bps))?
        .checked_add(denominator / 2)?;
    Some(scaled / denominator)
}

/// Parse a whole-token decimal string ("10", "0.05") into base units.
pub fn parse_token_amount(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('-') {
        return Err(anyhow::anyhow!("invalid token amount: {:?}", value));
    }
    let units = ethers::utils::parse_units(value, TOKEN_DECIMALS)
        .with_context(|| format!("invalid token amount: {:?}", value))?;
    Ok(units.into())
}

/// Format base units as a trimmed whole-token decimal ("20", "0.1").
pub fn format_token_amount(amount: U256) -> String {
    let divisor = U256::exp10(TOKEN_DECIMALS as usize);
    let whole = amount / divisor;
    let fraction = amount % divisor;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Human-readable reward totals for one win. Held as exact decimals,
/// written to JSON as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardBreakdown {
    #[serde(serialize_with = "decimal_as_number")]
    pub puzz: String,
    #[serde(serialize_with = "decimal_as_number")]
    pub rwrd: String,
    #[serde(serialize_with = "decimal_as_number")]
    pub wct: String,
    #[serde(serialize_with = "decimal_as_number")]
    pub celo: String,
}

fn decimal_as_number<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    if let Ok(whole) = value.parse::<u64>() {
        return serializer.serialize_u64(whole);
    }
    let number = value.parse::<f64>().map_err(serde::ser::Error::custom)?;
    serializer.serialize_f64(number)
}

impl RewardBreakdown {
    pub fn new(base: &RewardQuantities, celo: &RewardQuantities) -> Self {
        Self {
            puzz: format_token_amount(base.primary_amount),
            wct: format_token_amount(base.secondary_amount),
            rwrd: format_token_amount(celo.primary_amount),
            celo: format_token_amount(celo.secondary_amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_elite_doubles_primary_only() {
        let rewards = RewardSchedule::default();
        let base = rewards.for_level(1).unwrap().chain(ChainId::Base);

        let q = base.quantities(MultiplierTier::Elite).unwrap();
        assert_eq!(q.primary_amount, tokens(20));
        assert_eq!(q.secondary_amount, base.secondary);
    }

    #[test]
    fn test_secondary_invariant_across_tiers() {
        let rewards = RewardSchedule::default();
        let celo = rewards.for_level(2).unwrap().chain(ChainId::Celo);
        for tier in MultiplierTier::ALL {
            let quantities = celo.quantities(tier).unwrap();
            assert_eq!(quantities.secondary_amount, parse_token_amount("0.05").unwrap());
        }
    }

    #[test]
    fn test_fractional_multipliers_are_exact() {
        assert_eq!(scale_by_bps(tokens(10), 12_000), Some(tokens(12)));
        assert_eq!(scale_by_bps(tokens(10), 15_000), Some(tokens(15)));
        assert_eq!(scale_by_bps(tokens(10), 10_000), Some(tokens(10)));
    }

    #[test]
    fn test_scaling_rounds_half_up() {
        // 3 * 1.5 = 4.5 -> 5, 1 * 1.2 = 1.2 -> 1
        assert_eq!(scale_by_bps(U256::from(3), 15_000), Some(U256::from(5)));
        assert_eq!(scale_by_bps(U256::from(1), 12_000), Some(U256::from(1)));
    }

    #[test]
    fn test_parse_and_format_amounts() {
        assert_eq!(parse_token_amount("10").unwrap(), tokens(10));
        assert_eq!(parse_token_amount("0.1").unwrap(), U256::exp10(17));
        assert!(parse_token_amount("-1").is_err());
        assert!(parse_token_amount("ten").is_err());
        assert!(parse_token_amount("").is_err());

        assert_eq!(format_token_amount(tokens(20)), "20");
        assert_eq!(format_token_amount(U256::exp10(17)), "0.1");
        assert_eq!(format_token_amount(parse_token_amount("0.05").unwrap()), "0.05");
        assert_eq!(format_token_amount(parse_token_amount("12.5").unwrap()), "12.5");
    }

    #[test]
    fn test_breakdown_serializes_as_numbers() {
        let base = RewardQuantities {
            primary_amount: tokens(15),
            secondary_amount: U256::exp10(17),
        };
        let celo = RewardQuantities {
            primary_amount: parse_token_amount("12.5").unwrap(),
            secondary_amount: parse_token_amount("0.05").unwrap(),
        };
        let json = serde_json::to_value(RewardBreakdown::new(&base, &celo)).unwrap();
        assert_eq!(json, serde_json::json!({"puzz": 15, "rwrd": 12.5, "wct": 0.1, "celo": 0.05}));
    }

    #[test]
    fn test_default_schedule_levels() {
        let rewards = RewardSchedule::default();
        assert_eq!(rewards.levels().collect::<Vec<_>>(), vec![1, 2]);
        assert!(rewards.for_level(3).is_none());
        assert!(rewards.check_scalable().is_ok());
    }

    #[test]
    fn test_scaling_overflow_is_detected() {
        assert_eq!(scale_by_bps(U256::MAX / 2, 20_000), None);
        assert_eq!(scale_by_bps(U256::MAX, 10_000), None);

        // 1e58 whole tokens = 1e76 base units; fits a uint256 but not at 2x
        let huge = parse_token_amount(&format!("1{}", "0".repeat(58))).unwrap();
        let rewards = ChainRewards {
            primary_base: huge,
            secondary: U256::zero(),
        };
        assert!(rewards.quantities(MultiplierTier::Standard).is_some());
        assert!(rewards.quantities(MultiplierTier::Elite).is_none());

        let schedule = RewardSchedule::new(BTreeMap::from([(
            1,
            LevelRewards {
                base: rewards,
                celo: rewards,
            },
        )]));
        let err = schedule.check_scalable().unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
