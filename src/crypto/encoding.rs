//! Canonical voucher fields and their two wire encodings
//!
//! A vault receives `abi.encode(uint256, uint256, bytes32, uint256)` as the
//! `databytes` argument of `claim`, decodes it, and recomputes
//! `keccak256(abi.encodePacked(primary, secondary, nonce, timestamp))` to check
//! the signature. Both byte layouts are produced here from one value so they
//! can never drift apart.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::crypto::security::VoucherNonce;

/// Length of the packed message: four 32-byte words.
pub const PACKED_MESSAGE_LEN: usize = 128;

/// Length of the ABI tuple payload. All four fields are static, so this is
/// also four words.
pub const ABI_PAYLOAD_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("payload must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("timestamp does not fit in 64 bits")]
    TimestampOverflow,
}

/// The four logical values a vault authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalVoucherFields {
    pub primary_amount: U256,
    pub secondary_amount: U256,
    pub nonce: VoucherNonce,
    pub timestamp: u64,
}

impl CanonicalVoucherFields {
    pub fn new(
        primary_amount: U256,
        secondary_amount: U256,
        nonce: VoucherNonce,
        timestamp: u64,
    ) -> Self {
        Self {
            primary_amount,
            secondary_amount,
            nonce,
            timestamp,
        }
    }

    /// `abi.encodePacked(uint256, uint256, bytes32, uint256)`
    pub fn packed(&self) -> [u8; PACKED_MESSAGE_LEN] {
        let mut out = [0u8; PACKED_MESSAGE_LEN];
        self.primary_amount.to_big_endian(&mut out[0..32]);
        self.secondary_amount.to_big_endian(&mut out[32..64]);
        out[64..96].copy_from_slice(self.nonce.as_bytes());
        U256::from(self.timestamp).to_big_endian(&mut out[96..128]);
        out
    }

    /// keccak256 over the packed message. This is the value that gets
    /// personal-signed.
    pub fn digest(&self) -> H256 {
        H256::from_slice(&Keccak256::digest(self.packed()))
    }

    /// `abi.encode(uint256, uint256, bytes32, uint256)`
    pub fn abi_encode(&self) -> Vec<u8> {
        abi::encode(&self.tokens())
    }

    /// Decode a vault payload back into fields, rejecting anything that is
    /// not exactly one encoded tuple.
    pub fn abi_decode(payload: &[u8]) -> Result<Self, EncodingError> {
        if payload.len() != ABI_PAYLOAD_LEN {
            return Err(EncodingError::InvalidLength {
                expected: ABI_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let tokens = abi::decode(&Self::param_types(), payload)
            .map_err(|e| EncodingError::Malformed(e.to_string()))?;

        match tokens.as_slice() {
            [
                Token::Uint(primary),
                Token::Uint(secondary),
                Token::FixedBytes(nonce),
                Token::Uint(timestamp),
            ] if nonce.len() == 32 => {
                if *timestamp > U256::from(u64::MAX) {
                    return Err(EncodingError::TimestampOverflow);
                }
                Ok(Self {
                    primary_amount: *primary,
                    secondary_amount: *secondary,
                    nonce: VoucherNonce::from_slice(nonce),
                    timestamp: timestamp.as_u64(),
                })
            }
            _ => Err(EncodingError::Malformed(
                "unexpected token layout".to_string(),
            )),
        }
    }

    fn tokens(&self) -> Vec<Token> {
        vec![
            Token::Uint(self.primary_amount),
            Token::Uint(self.secondary_amount),
            Token::FixedBytes(self.nonce.as_bytes().to_vec()),
            Token::Uint(U256::from(self.timestamp)),
        ]
    }

    fn param_types() -> [ParamType; 4] {
        [
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::FixedBytes(32),
            ParamType::Uint(256),
        ]
    }
}
