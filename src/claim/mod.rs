//! Client-side claim flow
//!
//! Submits an issued voucher pair to the Base vault, then the Celo vault,
//! advancing only on confirmed receipts.

mod orchestrator;
pub mod vault;

pub use orchestrator::{
    ChainClaimStatus, ClaimError, ClaimOrchestrator, ClaimPhase, ClaimSession, StepOutcome,
};
pub use vault::{
    CLAIM_FUNCTION, ClaimReceipt, Confirmation, EthersVaultGateway, VaultEndpoint, VaultGateway,
    encode_claim_call,
};
