//! Reputation-Based Reward Multipliers
//!
//! Maps a player's builder score to a reward multiplier tier.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌───────────────────┐     ┌────────────────┐
//! │ ReputationProvider   │────►│ ReputationManager │────►│ MultiplierTier │
//! │ (Talent API, stubs)  │     │ (timeout, degrade)│     │ (score → bps)  │
//! └──────────────────────┘     └───────────────────┘     └────────────────┘
//! ```
//!
//! ## Tier Model
//!
//! - score >= 80: elite, 2.0x
//! - score >= 60: top, 1.5x
//! - score >= 40: rising, 1.2x
//! - otherwise, or no score: standard, 1.0x

mod manager;
mod score;
pub mod talent;

pub use manager::{NoReputation, ReputationManager, ReputationProvider, ResolvedReputation};
pub use score::{
    IdentityGraph, MULTIPLIER_DENOMINATOR_BPS, MultiplierTier, ReputationScore, multiplier,
};
pub use talent::TalentReputationClient;
