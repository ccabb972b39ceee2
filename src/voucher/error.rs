use thiserror::Error;

use crate::crypto::SignerError;
use crate::voucher::types::ChainId;

/// Reasons a win produced no vouchers
#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("Incorrect answer")]
    IncorrectAnswer,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown level: {0}")]
    UnknownLevel(u32),

    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("No unused nonce after {0} draws")]
    NonceExhausted(usize),

    #[error("Signature for {0} does not recover to the issuer")]
    SelfCheckFailed(ChainId),

    #[error("Level {level} reward on {chain} overflows uint256")]
    RewardOverflow { level: u32, chain: ChainId },
}

impl VoucherError {
    /// Errors caused by the request itself, as opposed to the issuer
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VoucherError::IncorrectAnswer
                | VoucherError::MissingField(_)
                | VoucherError::UnknownLevel(_)
        )
    }
}
