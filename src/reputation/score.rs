//! Reputation Scores and Multiplier Tiers
//!
//! A player's builder score maps onto one of four tiers. The numeric
//! multiplier and the display text are both derived from the tier, so they
//! cannot disagree.

use serde::{Deserialize, Deserializer, Serialize};

/// Basis-point denominator for multipliers (1.0x = 10_000)
pub const MULTIPLIER_DENOMINATOR_BPS: u32 = 10_000;

/// Reward multiplier tier, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiplierTier {
    Standard,
    Rising,
    Top,
    Elite,
}

impl MultiplierTier {
    /// Lowest to highest
    pub const ALL: [MultiplierTier; 4] = [
        MultiplierTier::Standard,
        MultiplierTier::Rising,
        MultiplierTier::Top,
        MultiplierTier::Elite,
    ];

    pub const ELITE_THRESHOLD: u32 = 80;
    pub const TOP_THRESHOLD: u32 = 60;
    pub const RISING_THRESHOLD: u32 = 40;

    /// Tier for a score; an absent score is treated as 0.
    pub fn from_score(score: Option<u32>) -> Self {
        match score.unwrap_or(0) {
            s if s >= Self::ELITE_THRESHOLD => MultiplierTier::Elite,
            s if s >= Self::TOP_THRESHOLD => MultiplierTier::Top,
            s if s >= Self::RISING_THRESHOLD => MultiplierTier::Rising,
            _ => MultiplierTier::Standard,
        }
    }

    pub fn basis_points(&self) -> u32 {
        match self {
            MultiplierTier::Elite => 20_000,
            MultiplierTier::Top => 15_000,
            MultiplierTier::Rising => 12_000,
            MultiplierTier::Standard => MULTIPLIER_DENOMINATOR_BPS,
        }
    }

    /// Multiplier as a decimal factor, for display only
    pub fn factor(&self) -> f64 {
        self.basis_points() as f64 / MULTIPLIER_DENOMINATOR_BPS as f64
    }

    pub fn label(&self) -> &'static str {
        match self {
            MultiplierTier::Elite => "elite",
            MultiplierTier::Top => "top",
            MultiplierTier::Rising => "rising",
            MultiplierTier::Standard => "standard",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MultiplierTier::Elite => "2x Bonus (Elite Builder)",
            MultiplierTier::Top => "1.5x Bonus (Top Builder)",
            MultiplierTier::Rising => "1.2x Bonus (Rising Builder)",
            MultiplierTier::Standard => "Standard Rewards",
        }
    }

    pub fn has_bonus(&self) -> bool {
        *self != MultiplierTier::Standard
    }
}

/// Reward multiplier for a score.
pub fn multiplier(score: Option<u32>) -> f64 {
    MultiplierTier::from_score(score).factor()
}

/// Identity links the provider knows for a player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityGraph {
    #[serde(default)]
    pub wallet_addresses: Vec<String>,
    #[serde(default)]
    pub ens_names: Vec<String>,
}

/// Builder score as reported by the reputation provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationScore {
    pub fid: u64,
    #[serde(deserialize_with = "non_negative_score")]
    pub score: u32,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub identity_graph: Option<IdentityGraph>,
}

impl ReputationScore {
    pub fn tier(&self) -> MultiplierTier {
        MultiplierTier::from_score(Some(self.score))
    }
}

/// Providers report scores as JSON numbers that may carry a fraction; the
/// tier thresholds only look at the integer part.
fn non_negative_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("score must be finite"));
    }
    Ok(raw.max(0.0).floor().min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(multiplier(Some(79)), 1.5);
        assert_eq!(multiplier(Some(80)), 2.0);
        assert_eq!(multiplier(Some(39)), 1.0);
        assert_eq!(multiplier(Some(40)), 1.2);
        assert_eq!(multiplier(Some(59)), 1.2);
        assert_eq!(multiplier(Some(60)), 1.5);
        assert_eq!(multiplier(Some(0)), 1.0);
        assert_eq!(multiplier(None), 1.0);
    }

    #[test]
    fn test_labels_follow_tier() {
        assert_eq!(MultiplierTier::from_score(Some(85)).label(), "elite");
        assert_eq!(MultiplierTier::from_score(Some(65)).label(), "top");
        assert_eq!(MultiplierTier::from_score(Some(45)).label(), "rising");
        assert_eq!(MultiplierTier::from_score(None).label(), "standard");
        assert!(!MultiplierTier::Standard.has_bonus());
        assert!(MultiplierTier::Rising.has_bonus());
    }

    #[test]
    fn test_score_deserialization() {
        let score: ReputationScore =
            serde_json::from_str(r#"{"fid": 42, "score": 61.7, "rank": 3}"#).unwrap();
        assert_eq!(score.score, 61);
        assert_eq!(score.tier(), MultiplierTier::Top);
        assert!(score.identity_graph.is_none());

        let negative: ReputationScore =
            serde_json::from_str(r#"{"fid": 1, "score": -5}"#).unwrap();
        assert_eq!(negative.score, 0);

        assert!(serde_json::from_str::<ReputationScore>(r#"{"fid": 1, "score": "high"}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_multiplier_is_monotonic(a in any::<u32>(), b in any::<u32>()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(multiplier(Some(lo)) <= multiplier(Some(hi)));
            prop_assert!(MultiplierTier::from_score(Some(lo)) <= MultiplierTier::from_score(Some(hi)));
        }

        #[test]
        fn prop_multiplier_takes_four_values(score in any::<u32>()) {
            let m = multiplier(Some(score));
            prop_assert!([1.0, 1.2, 1.5, 2.0].contains(&m));
        }

        #[test]
        fn prop_label_agrees_with_factor(score in 0u32..200) {
            let tier = MultiplierTier::from_score(Some(score));
            let expected = match tier.label() {
                "elite" => 2.0,
                "top" => 1.5,
                "rising" => 1.2,
                _ => 1.0,
            };
            prop_assert_eq!(tier.factor(), expected);
        }
    }
}
