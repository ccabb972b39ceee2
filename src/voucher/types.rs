//! Voucher data model and the client-facing claim payloads

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{
    CanonicalVoucherFields, EncodingError, VoucherNonce, VoucherSignature, verify_voucher,
};

/// Chains hosting a reward vault, in claim order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Base,
    Celo,
}

impl ChainId {
    /// Claim order: Base first, then Celo
    pub const ALL: [ChainId; 2] = [ChainId::Base, ChainId::Celo];

    pub fn evm_chain_id(&self) -> u64 {
        match self {
            ChainId::Base => 8453,
            ChainId::Celo => 42220,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChainId::Base => "base",
            ChainId::Celo => "celo",
        }
    }

    /// Custom token paid by this chain's vault; scaled by the multiplier
    pub fn primary_symbol(&self) -> &'static str {
        match self {
            ChainId::Base => "PUZZ",
            ChainId::Celo => "RWRD",
        }
    }

    /// Fixed token paid alongside the primary one
    pub fn secondary_symbol(&self) -> &'static str {
        match self {
            ChainId::Base => "WCT",
            ChainId::Celo => "CELO",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Token amounts for one chain, in 18-decimal base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardQuantities {
    pub primary_amount: U256,
    pub secondary_amount: U256,
}

/// A signed, chain-specific authorization for one vault withdrawal.
///
/// Only the issuer constructs these, and the signature is always over the
/// digest of `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    chain: ChainId,
    quantities: RewardQuantities,
    nonce: VoucherNonce,
    timestamp: u64,
    message: Bytes,
    digest: H256,
    payload: Bytes,
    signature: VoucherSignature,
}

impl Voucher {
    pub(crate) fn new(
        chain: ChainId,
        fields: &CanonicalVoucherFields,
        signature: VoucherSignature,
    ) -> Self {
        Self {
            chain,
            quantities: RewardQuantities {
                primary_amount: fields.primary_amount,
                secondary_amount: fields.secondary_amount,
            },
            nonce: fields.nonce,
            timestamp: fields.timestamp,
            message: Bytes::from(fields.packed().to_vec()),
            digest: fields.digest(),
            payload: Bytes::from(fields.abi_encode()),
            signature,
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn quantities(&self) -> &RewardQuantities {
        &self.quantities
    }

    pub fn nonce(&self) -> &VoucherNonce {
        &self.nonce
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Packed message that was hashed
    pub fn message(&self) -> &Bytes {
        &self.message
    }

    pub fn digest(&self) -> H256 {
        self.digest
    }

    /// ABI-encoded tuple handed to the vault's `claim`
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn signature(&self) -> &VoucherSignature {
        &self.signature
    }

    pub fn to_claim(&self) -> SignedClaim {
        SignedClaim {
            databytes: self.payload.clone(),
            v: self.signature.v,
            r: self.signature.r,
            s: self.signature.s,
        }
    }
}

/// One voucher per chain from a single win
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherPair {
    pub base: Voucher,
    pub celo: Voucher,
}

impl VoucherPair {
    pub fn get(&self, chain: ChainId) -> &Voucher {
        match chain {
            ChainId::Base => &self.base,
            ChainId::Celo => &self.celo,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voucher> {
        ChainId::ALL.into_iter().map(move |chain| self.get(chain))
    }

    pub fn to_claims(&self) -> ClaimSignatures {
        ClaimSignatures {
            base: self.base.to_claim(),
            celo: self.celo.to_claim(),
        }
    }
}

/// The `claim(bytes, uint8, bytes32, bytes32)` arguments for one vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaim {
    pub databytes: Bytes,
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl SignedClaim {
    pub fn signature(&self) -> VoucherSignature {
        VoucherSignature {
            v: self.v,
            r: self.r,
            s: self.s,
        }
    }

    pub fn fields(&self) -> Result<CanonicalVoucherFields, EncodingError> {
        CanonicalVoucherFields::abi_decode(&self.databytes)
    }

    /// Address a vault would recover from this claim
    pub fn recover_signer(&self) -> anyhow::Result<Address> {
        verify_voucher(&self.databytes, &self.signature())
    }
}

/// Claim arguments for both vaults, as returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignatures {
    pub base: SignedClaim,
    pub celo: SignedClaim,
}

impl ClaimSignatures {
    pub fn get(&self, chain: ChainId) -> &SignedClaim {
        match chain {
            ChainId::Base => &self.base,
            ChainId::Celo => &self.celo,
        }
    }
}
