//! Voucher issuance
//!
//! A verified win becomes one signed voucher per chain. Each voucher binds a
//! primary amount (scaled by the player's multiplier), a fixed secondary
//! amount, a fresh 32-byte nonce and a timestamp. The vault contracts verify
//! the signature and reject reused nonces.

mod error;
mod issuer;
pub mod rewards;
mod types;

pub use error::VoucherError;
pub use issuer::{IssuedWin, VoucherIssuer, WinClaim, answers_match};
pub use rewards::{
    ChainRewards, LevelRewards, RewardBreakdown, RewardSchedule, TOKEN_DECIMALS,
    format_token_amount, parse_token_amount, scale_by_bps,
};
pub use types::{
    ChainId, ClaimSignatures, RewardQuantities, SignedClaim, Voucher, VoucherPair,
};
