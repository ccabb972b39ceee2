use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, RecoveryMessage, Signature, U256};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::crypto::encoding::CanonicalVoucherFields;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing key is missing")]
    MissingKey,
    #[error("signing key is malformed: {0}")]
    MalformedKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// ECDSA signature in the `(v, r, s)` shape vault contracts accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSignature {
    /// Recovery id, 27 or 28
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl VoucherSignature {
    pub fn to_signature(&self) -> Signature {
        Signature {
            r: U256::from_big_endian(self.r.as_bytes()),
            s: U256::from_big_endian(self.s.as_bytes()),
            v: self.v as u64,
        }
    }
}

impl TryFrom<Signature> for VoucherSignature {
    type Error = SignerError;

    fn try_from(sig: Signature) -> Result<Self, Self::Error> {
        let v = u8::try_from(sig.v)
            .map_err(|_| SignerError::Signing(format!("recovery id out of range: {}", sig.v)))?;
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        sig.r.to_big_endian(&mut r);
        sig.s.to_big_endian(&mut s);
        Ok(Self {
            v,
            r: H256(r),
            s: H256(s),
        })
    }
}

/// Backend signing key for vouchers (secp256k1).
#[derive(Clone)]
pub struct VoucherSigner {
    wallet: LocalWallet,
}

impl VoucherSigner {
    /// Load from a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self, SignerError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SignerError::MissingKey);
        }
        let hex_key = key.strip_prefix("0x").unwrap_or(key);
        if hex_key.len() != 64 || !hex_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SignerError::MalformedKey(
                "expected 32 bytes of hex".to_string(),
            ));
        }

        let wallet =
            LocalWallet::from_str(hex_key).map_err(|e| SignerError::MalformedKey(e.to_string()))?;
        Ok(Self { wallet })
    }

    /// Fresh random key, for tests and local tooling.
    pub fn random() -> Self {
        Self {
            wallet: LocalWallet::new(&mut OsRng),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign a message digest with the personal-message convention:
    /// `keccak256("\x19Ethereum Signed Message:\n32" || digest)`.
    pub fn sign_digest(&self, digest: H256) -> Result<VoucherSignature, SignerError> {
        let prefixed = ethers::utils::hash_message(digest.as_bytes());
        let signature = self
            .wallet
            .sign_hash(prefixed)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        VoucherSignature::try_from(signature)
    }
}

impl std::fmt::Debug for VoucherSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoucherSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Recover the address that personal-signed `digest`.
pub fn recover_signer(digest: H256, signature: &VoucherSignature) -> Result<Address, SignerError> {
    signature
        .to_signature()
        .recover(RecoveryMessage::Data(digest.as_bytes().to_vec()))
        .map_err(|e| SignerError::Recovery(e.to_string()))
}

/// Recover the signer of a vault payload the way the vault does: decode the
/// tuple, re-pack, re-hash, then `ecrecover` over the personal-message hash.
pub fn verify_voucher(payload: &[u8], signature: &VoucherSignature) -> anyhow::Result<Address> {
    let fields = CanonicalVoucherFields::abi_decode(payload)?;
    Ok(recover_signer(fields.digest(), signature)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::security::VoucherNonce;
    use ethers::utils::keccak256;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_key_loading() {
        let with_prefix = VoucherSigner::from_private_key(TEST_KEY).unwrap();
        let without = VoucherSigner::from_private_key(&TEST_KEY[2..]).unwrap();
        assert_eq!(with_prefix.address(), without.address());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            VoucherSigner::from_private_key(""),
            Err(SignerError::MissingKey)
        ));
        assert!(matches!(
            VoucherSigner::from_private_key("0x1234"),
            Err(SignerError::MalformedKey(_))
        ));
        assert!(matches!(
            VoucherSigner::from_private_key(&"zz".repeat(32)),
            Err(SignerError::MalformedKey(_))
        ));
        // Zero is not a valid secp256k1 scalar
        assert!(matches!(
            VoucherSigner::from_private_key(&"00".repeat(32)),
            Err(SignerError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = VoucherSigner::random();
        let digest = H256::from(keccak256(b"voucher"));

        let sig = signer.sign_digest(digest).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(digest, &sig).unwrap(), signer.address());

        let other = H256::from(keccak256(b"other"));
        assert_ne!(recover_signer(other, &sig).unwrap(), signer.address());
    }

    #[test]
    fn test_signature_matches_ethers_personal_sign() {
        let signer = VoucherSigner::from_private_key(TEST_KEY).unwrap();
        let digest = H256::from(keccak256(b"payload"));

        let ours = signer.sign_digest(digest).unwrap();
        let expected = signer
            .wallet
            .sign_hash(ethers::utils::hash_message(digest.as_bytes()))
            .unwrap();
        assert_eq!(ours.to_signature(), expected);
        assert!(expected.verify(digest.as_bytes(), signer.address()).is_ok());
    }

    #[test]
    fn test_verify_voucher_payload() {
        let signer = VoucherSigner::random();
        let fields = CanonicalVoucherFields::new(
            U256::exp10(18),
            U256::exp10(17),
            VoucherNonce::generate(),
            1_700_000_000,
        );
        let sig = signer.sign_digest(fields.digest()).unwrap();

        let recovered = verify_voucher(&fields.abi_encode(), &sig).unwrap();
        assert_eq!(recovered, signer.address());

        let mut tampered = fields;
        tampered.primary_amount = U256::exp10(19);
        let recovered = verify_voucher(&tampered.abi_encode(), &sig).unwrap();
        assert_ne!(recovered, signer.address());
    }
}
