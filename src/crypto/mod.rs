//! Cryptographic utilities for voucher issuance
//!
//! Provides:
//! - Canonical voucher fields with packed (hashing) and ABI (transport) encodings
//! - secp256k1 personal-message signing and signer recovery
//! - Nonce generation and the replay guard store
//! - Audit logging for security-relevant issuer events

pub mod encoding;
pub mod security;
pub mod signing;

pub use encoding::{CanonicalVoucherFields, EncodingError};
pub use security::{
    AuditEntry, AuditEventType, AuditLogger, AuditSeverity, InMemoryNonceStore, NonceStore,
    ReservedNonce, VoucherNonce, reserve_fresh_nonce,
};
pub use signing::{SignerError, VoucherSignature, VoucherSigner, recover_signer, verify_voucher};
