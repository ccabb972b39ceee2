//! Reward Voucher Oracle
//!
//! Turns verified puzzle wins into signed withdrawal vouchers for the Base and
//! Celo reward vaults, scaled by the player's Talent Protocol builder score,
//! and sequences the client-side claims against both vaults.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── bin/voucher-claim.rs - Claim CLI
//! ├── config.rs      - Configuration management
//! ├── voucher/       - Voucher issuance
//! │   ├── types.rs   - Chains, vouchers, claim payloads
//! │   ├── rewards.rs - Per-level reward constants and scaling
//! │   ├── issuer.rs  - Answer check, nonce reservation, signing
//! │   └── error.rs   - Issuance errors
//! ├── crypto/        - Cryptographic utilities
//! │   ├── encoding.rs - Packed and ABI encodings of voucher fields
//! │   ├── signing.rs - secp256k1 personal-message signing
//! │   └── security.rs - Nonces, replay guard, audit logging
//! ├── reputation/    - Builder score to multiplier
//! │   ├── score.rs   - Tiers and thresholds
//! │   ├── manager.rs - Timeout-bounded provider front
//! │   └── talent.rs  - Talent Protocol client
//! ├── claim/         - Client-side claim flow
//! │   ├── orchestrator.rs - Base-then-Celo state machine
//! │   └── vault.rs   - Vault gateway (ethers JSON-RPC)
//! └── api/           - HTTP API endpoints
//!     ├── game.rs    - Win submission
//!     ├── talent.rs  - Score and leaderboard
//!     ├── stats.rs   - Player counters
//!     ├── error.rs   - Error responses
//!     ├── http.rs    - Secure HTTP client
//!     └── middleware.rs - Auth, limits, headers, logging
//! ```

pub mod api;
pub mod claim;
pub mod config;
pub mod crypto;
pub mod reputation;
pub mod voucher;

// Re-export main types for convenience
pub use config::VoucherConfig;
pub use crypto::{
    AuditEntry, AuditEventType, AuditLogger, AuditSeverity, CanonicalVoucherFields,
    InMemoryNonceStore, NonceStore, VoucherNonce, VoucherSignature, VoucherSigner,
    verify_voucher,
};

// Re-export issuance types
pub use voucher::{
    ChainId, ClaimSignatures, IssuedWin, RewardQuantities, RewardSchedule, SignedClaim, Voucher,
    VoucherError, VoucherIssuer, VoucherPair, WinClaim,
};

// Re-export reputation types
pub use reputation::{
    MultiplierTier, NoReputation, ReputationManager, ReputationProvider, ReputationScore,
    TalentReputationClient, multiplier,
};

// Re-export claim flow types
pub use claim::{
    ChainClaimStatus, ClaimError, ClaimOrchestrator, ClaimPhase, ClaimReceipt, ClaimSession,
    Confirmation, EthersVaultGateway, VaultGateway,
};
