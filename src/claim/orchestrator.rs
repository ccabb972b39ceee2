use ethers::types::H256;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::claim::vault::{ClaimReceipt, Confirmation, VaultGateway};
use crate::voucher::{ChainId, ClaimSignatures};

/// Where a claim flow stands. Base is always claimed before Celo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimPhase {
    /// No vouchers received yet
    Idle,
    AwaitingBase,
    AwaitingCelo,
    Complete,
}

impl ClaimPhase {
    /// Chain whose claim must be confirmed next
    pub fn pending_chain(&self) -> Option<ChainId> {
        match self {
            ClaimPhase::AwaitingBase => Some(ChainId::Base),
            ClaimPhase::AwaitingCelo => Some(ChainId::Celo),
            ClaimPhase::Idle | ClaimPhase::Complete => None,
        }
    }

    fn after(chain: ChainId) -> Self {
        match chain {
            ChainId::Base => ClaimPhase::AwaitingCelo,
            ChainId::Celo => ClaimPhase::Complete,
        }
    }
}

/// Per-chain submission progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainClaimStatus {
    NotStarted,
    /// Broadcast as this transaction, confirmation not yet observed
    Submitted(H256),
    Confirmed,
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Nothing to claim in phase {0:?}")]
    NothingPending(ClaimPhase),

    #[error("{chain} claim failed after {attempts} attempt(s): {reason}")]
    Rejected {
        chain: ChainId,
        attempts: u32,
        reason: String,
    },
}

/// Result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Confirmed(ClaimReceipt),
    /// The vault or wallet refused; the same claim may be resubmitted
    Rejected(String),
    /// Stopped by the caller before confirmation
    Cancelled,
}

/// Local progress of one voucher pair through both vaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSession {
    claims: Option<ClaimSignatures>,
    phase: ClaimPhase,
    base_status: ChainClaimStatus,
    celo_status: ChainClaimStatus,
    receipts: Vec<ClaimReceipt>,
}

impl Default for ClaimSession {
    fn default() -> Self {
        Self {
            claims: None,
            phase: ClaimPhase::Idle,
            base_status: ChainClaimStatus::NotStarted,
            celo_status: ChainClaimStatus::NotStarted,
            receipts: Vec::new(),
        }
    }
}

impl ClaimSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flow for a freshly issued pair
    pub fn with_claims(claims: ClaimSignatures) -> Self {
        Self {
            claims: Some(claims),
            phase: ClaimPhase::AwaitingBase,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> ClaimPhase {
        self.phase
    }

    pub fn status(&self, chain: ChainId) -> ChainClaimStatus {
        match chain {
            ChainId::Base => self.base_status,
            ChainId::Celo => self.celo_status,
        }
    }

    pub fn claims(&self) -> Option<&ClaimSignatures> {
        self.claims.as_ref()
    }

    pub fn receipts(&self) -> &[ClaimReceipt] {
        &self.receipts
    }

    fn set_status(&mut self, chain: ChainId, status: ChainClaimStatus) {
        match chain {
            ChainId::Base => self.base_status = status,
            ChainId::Celo => self.celo_status = status,
        }
    }
}

/// Drives a [`ClaimSession`] through the vaults one chain at a time.
///
/// The phase only advances on a confirmed receipt for the pending chain.
/// Rejections and cancellations leave it where it was.
pub struct ClaimOrchestrator<G> {
    gateway: G,
    session: ClaimSession,
}

impl<G: VaultGateway> ClaimOrchestrator<G> {
    pub fn new(gateway: G) -> Self {
        Self::resume(gateway, ClaimSession::new())
    }

    /// Continue an interrupted flow
    pub fn resume(gateway: G, session: ClaimSession) -> Self {
        Self { gateway, session }
    }

    /// Accept a new voucher pair and restart at the first chain
    pub fn receive(&mut self, claims: ClaimSignatures) {
        self.session = ClaimSession::with_claims(claims);
    }

    pub fn session(&self) -> &ClaimSession {
        &self.session
    }

    pub fn phase(&self) -> ClaimPhase {
        self.session.phase
    }

    pub fn into_session(self) -> ClaimSession {
        self.session
    }

    /// Advance the pending chain by one attempt, unless `cancel` resolves
    /// first.
    ///
    /// A chain already marked `Submitted` is not sent again: its recorded
    /// transaction is followed instead, and only a definite revert or drop
    /// frees the voucher for resubmission.
    pub async fn submit_next<C>(&mut self, cancel: C) -> Result<StepOutcome, ClaimError>
    where
        C: Future<Output = ()>,
    {
        let phase = self.session.phase;
        let (Some(chain), Some(claims)) = (phase.pending_chain(), self.session.claims.as_ref())
        else {
            return Err(ClaimError::NothingPending(phase));
        };
        let claim = claims.get(chain).clone();
        tokio::pin!(cancel);

        let tx_hash = match self.session.status(chain) {
            ChainClaimStatus::Submitted(tx_hash) => {
                info!(%chain, tx = ?tx_hash, "Following earlier submission");
                tx_hash
            }
            _ => {
                // Not raced against cancel, so a broadcast is never left unrecorded
                info!(%chain, "Submitting claim");
                match self.gateway.send_claim(chain, &claim).await {
                    Ok(tx_hash) => {
                        self.session.set_status(chain, ChainClaimStatus::Submitted(tx_hash));
                        tx_hash
                    }
                    Err(e) => {
                        warn!(%chain, error = %e, "Claim not sent");
                        self.session.set_status(chain, ChainClaimStatus::NotStarted);
                        return Ok(StepOutcome::Rejected(e.to_string()));
                    }
                }
            }
        };

        tokio::select! {
            result = self.gateway.await_confirmation(chain, tx_hash) => match result {
                Ok(Confirmation::Confirmed(receipt))
                    if receipt.chain == chain && receipt.tx_hash == tx_hash =>
                {
                    info!(%chain, tx = ?tx_hash, "Claim confirmed");
                    self.session.set_status(chain, ChainClaimStatus::Confirmed);
                    self.session.receipts.push(receipt.clone());
                    self.session.phase = ClaimPhase::after(chain);
                    Ok(StepOutcome::Confirmed(receipt))
                }
                Ok(Confirmation::Confirmed(receipt)) => Ok(StepOutcome::Rejected(format!(
                    "receipt for {} {:?} does not match {} {:?}",
                    receipt.chain, receipt.tx_hash, chain, tx_hash
                ))),
                Ok(Confirmation::Failed(reason)) => {
                    warn!(%chain, tx = ?tx_hash, reason = %reason, "Claim failed on chain");
                    self.session.set_status(chain, ChainClaimStatus::NotStarted);
                    Ok(StepOutcome::Rejected(reason))
                }
                Err(e) => {
                    // The transaction may still land; keep following it
                    warn!(%chain, tx = ?tx_hash, error = %e, "Confirmation unknown");
                    Ok(StepOutcome::Rejected(e.to_string()))
                }
            },
            _ = &mut cancel => {
                info!(%chain, tx = ?tx_hash, "Claim cancelled, phase unchanged");
                Ok(StepOutcome::Cancelled)
            }
        }
    }

    /// Claim every remaining chain, retrying each up to `max_attempts` times.
    ///
    /// Returns the phase reached; `Complete` unless `cancel` fired.
    pub async fn run<C>(&mut self, max_attempts: u32, cancel: C) -> Result<ClaimPhase, ClaimError>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let max_attempts = max_attempts.max(1);
        let mut attempts = 0;

        while let Some(chain) = self.session.phase.pending_chain() {
            match self.submit_next(&mut cancel).await? {
                StepOutcome::Confirmed(_) => attempts = 0,
                StepOutcome::Cancelled => break,
                StepOutcome::Rejected(reason) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        return Err(ClaimError::Rejected {
                            chain,
                            attempts,
                            reason,
                        });
                    }
                }
            }
        }

        Ok(self.session.phase)
    }
}
