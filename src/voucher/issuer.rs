use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::crypto::{
    AuditEntry, AuditEventType, AuditLogger, AuditSeverity, CanonicalVoucherFields, NonceStore,
    VoucherNonce, VoucherSigner, recover_signer, reserve_fresh_nonce,
    security::MAX_NONCE_ATTEMPTS,
};
use crate::reputation::{MultiplierTier, ReputationManager, ResolvedReputation};
use crate::voucher::error::VoucherError;
use crate::voucher::rewards::RewardSchedule;
use crate::voucher::types::{ChainId, RewardQuantities, Voucher, VoucherPair};

/// A player's claim to have solved a puzzle
#[derive(Debug, Clone)]
pub struct WinClaim {
    pub level: u32,
    pub answer: String,
    pub expected_answer: String,
    pub fid: Option<u64>,
}

/// Answers compare case-insensitively.
pub fn answers_match(submitted: &str, expected: &str) -> bool {
    submitted.to_uppercase() == expected.to_uppercase()
}

/// Everything produced by one accepted win
#[derive(Debug, Clone)]
pub struct IssuedWin {
    /// Correlates this win's audit entries
    pub request_id: String,
    pub level: u32,
    pub reputation: ResolvedReputation,
    pub vouchers: VoucherPair,
}

impl IssuedWin {
    pub fn tier(&self) -> MultiplierTier {
        self.reputation.tier
    }
}

/// Signs reward vouchers for verified wins.
///
/// Holds the only reference to the signing key. A request either yields a
/// voucher for every chain or no voucher at all.
#[derive(Clone)]
pub struct VoucherIssuer {
    signer: VoucherSigner,
    schedule: RewardSchedule,
    nonces: Arc<dyn NonceStore>,
    reputation: ReputationManager,
    audit: AuditLogger,
}

impl VoucherIssuer {
    pub fn new(
        signer: VoucherSigner,
        schedule: RewardSchedule,
        nonces: Arc<dyn NonceStore>,
        reputation: ReputationManager,
    ) -> Self {
        Self {
            signer,
            schedule,
            nonces,
            reputation,
            audit: AuditLogger::new(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Address every voucher recovers to
    pub fn signer_address(&self) -> ethers::types::Address {
        self.signer.address()
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    pub fn nonce_store(&self) -> &Arc<dyn NonceStore> {
        &self.nonces
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Check the answer, resolve the multiplier, then sign one voucher per
    /// chain.
    pub async fn issue_for_win(&self, claim: &WinClaim) -> Result<IssuedWin, VoucherError> {
        let request_id = new_request_id();
        if let Err(e) = self.validate(claim) {
            self.audit
                .log_issuance_rejected(&e.to_string(), Some(&request_id))
                .await;
            return Err(e);
        }

        let reputation = self.reputation.resolve(claim.fid).await;
        let vouchers = self
            .sign_pair(&request_id, claim.fid, claim.level, reputation.tier)
            .await?;

        info!(
            request_id = %request_id,
            level = claim.level,
            fid = ?claim.fid,
            tier = reputation.tier.label(),
            "Issued voucher pair"
        );

        Ok(IssuedWin {
            request_id,
            level: claim.level,
            reputation,
            vouchers,
        })
    }

    fn validate(&self, claim: &WinClaim) -> Result<(), VoucherError> {
        if claim.answer.trim().is_empty() {
            return Err(VoucherError::MissingField("answer"));
        }
        if claim.expected_answer.trim().is_empty() {
            return Err(VoucherError::MissingField("puzzle"));
        }
        if self.schedule.for_level(claim.level).is_none() {
            return Err(VoucherError::UnknownLevel(claim.level));
        }
        if !answers_match(&claim.answer, &claim.expected_answer) {
            return Err(VoucherError::IncorrectAnswer);
        }
        Ok(())
    }

    /// Sign a voucher for every chain at an already-resolved tier.
    pub async fn issue_pair(
        &self,
        level: u32,
        tier: MultiplierTier,
    ) -> Result<VoucherPair, VoucherError> {
        self.sign_pair(&new_request_id(), None, level, tier).await
    }

    async fn sign_pair(
        &self,
        request_id: &str,
        fid: Option<u64>,
        level: u32,
        tier: MultiplierTier,
    ) -> Result<VoucherPair, VoucherError> {
        let rewards = self
            .schedule
            .for_level(level)
            .ok_or(VoucherError::UnknownLevel(level))?;
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();

        let quantities = |chain: ChainId| {
            rewards
                .chain(chain)
                .quantities(tier)
                .ok_or(VoucherError::RewardOverflow { level, chain })
        };
        let base_quantities = quantities(ChainId::Base)?;
        let celo_quantities = quantities(ChainId::Celo)?;

        let base = self
            .issue_voucher(request_id, ChainId::Base, base_quantities, timestamp)
            .await?;
        let celo = self
            .issue_voucher(request_id, ChainId::Celo, celo_quantities, timestamp)
            .await?;

        for voucher in [&base, &celo] {
            let mut entry = AuditEntry::new(
                AuditEventType::VoucherIssued {
                    chain: voucher.chain().to_string(),
                    nonce: voucher.nonce().to_hex(),
                    level,
                    multiplier_bps: tier.basis_points(),
                },
                AuditSeverity::Info,
            )
            .with_request_id(request_id.to_string())
            .with_metadata("tier", tier.label())
            .with_metadata("timestamp", &timestamp.to_string());
            if let Some(fid) = fid {
                entry = entry.with_metadata("fid", &fid.to_string());
            }
            self.audit.log(entry).await;
        }

        Ok(VoucherPair { base, celo })
    }

    async fn issue_voucher(
        &self,
        request_id: &str,
        chain: ChainId,
        quantities: RewardQuantities,
        timestamp: u64,
    ) -> Result<Voucher, VoucherError> {
        let mut drawn = Vec::new();
        let reserved = reserve_fresh_nonce(self.nonces.as_ref(), || {
            let nonce = VoucherNonce::generate();
            drawn.push(nonce);
            nonce
        });

        let Some(reserved) = reserved else {
            for nonce in &drawn {
                self.audit.log_nonce_collision(nonce, Some(request_id)).await;
            }
            return Err(VoucherError::NonceExhausted(MAX_NONCE_ATTEMPTS));
        };
        for nonce in &drawn[..reserved.collisions] {
            warn!(%chain, nonce = %nonce, "Nonce already consumed, redrawing");
            self.audit.log_nonce_collision(nonce, Some(request_id)).await;
        }

        let fields = CanonicalVoucherFields::new(
            quantities.primary_amount,
            quantities.secondary_amount,
            reserved.nonce,
            timestamp,
        );
        let digest = fields.digest();
        let signature = self.signer.sign_digest(digest)?;

        match recover_signer(digest, &signature) {
            Ok(address) if address == self.signer.address() => {}
            _ => return Err(VoucherError::SelfCheckFailed(chain)),
        }

        debug!(%chain, nonce = %reserved.nonce, "Signed voucher");
        Ok(Voucher::new(chain, &fields, signature))
    }
}

fn new_request_id() -> String {
    format!("win_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{InMemoryNonceStore, verify_voucher};
    use crate::reputation::NoReputation;
    use ethers::types::U256;
    use std::time::Duration;

    fn issuer() -> VoucherIssuer {
        VoucherIssuer::new(
            VoucherSigner::random(),
            RewardSchedule::default(),
            Arc::new(InMemoryNonceStore::new()),
            ReputationManager::new(Arc::new(NoReputation), Duration::from_secs(1)),
        )
    }

    fn claim(answer: &str) -> WinClaim {
        WinClaim {
            level: 1,
            answer: answer.to_string(),
            expected_answer: "CRYPTO".to_string(),
            fid: None,
        }
    }

    #[test]
    fn test_answers_match_ignores_case() {
        assert!(answers_match("crypto", "CRYPTO"));
        assert!(answers_match("Crypto", "crypto"));
        assert!(!answers_match("crypt0", "CRYPTO"));
    }

    #[tokio::test]
    async fn test_win_yields_recoverable_pair() {
        let issuer = issuer();
        let win = issuer.issue_for_win(&claim("crypto")).await.unwrap();

        for voucher in win.vouchers.iter() {
            let recovered = verify_voucher(voucher.payload(), voucher.signature()).unwrap();
            assert_eq!(recovered, issuer.signer_address());
        }
        assert_ne!(win.vouchers.base.nonce(), win.vouchers.celo.nonce());
        assert_eq!(win.vouchers.base.timestamp(), win.vouchers.celo.timestamp());
        assert_eq!(issuer.nonce_store().len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_answer_issues_nothing() {
        let issuer = issuer();
        let err = issuer.issue_for_win(&claim("bitcoin")).await.unwrap_err();

        assert!(matches!(err, VoucherError::IncorrectAnswer));
        assert!(issuer.nonce_store().is_empty());
        let recent = issuer.audit().get_recent(1).await;
        assert_eq!(recent.len(), 1);
        assert!(recent[0].request_id.is_some());
    }

    #[tokio::test]
    async fn test_issued_entries_share_request_id() {
        let issuer = issuer();
        let mut win_claim = claim("crypto");
        win_claim.fid = Some(3621);
        let win = issuer.issue_for_win(&win_claim).await.unwrap();

        let entries = issuer.audit().get_recent(10).await;
        let issued: Vec<_> = entries
            .iter()
            .filter(|e| matches!(e.event_type, AuditEventType::VoucherIssued { .. }))
            .collect();
        assert_eq!(issued.len(), 2);
        for entry in issued {
            assert_eq!(entry.request_id.as_deref(), Some(win.request_id.as_str()));
            assert_eq!(entry.metadata.get("fid").map(String::as_str), Some("3621"));
            assert_eq!(entry.metadata.get("tier").map(String::as_str), Some("standard"));
        }
    }

    #[tokio::test]
    async fn test_missing_fields_and_unknown_level() {
        let issuer = issuer();

        let err = issuer.issue_for_win(&claim("  ")).await.unwrap_err();
        assert!(matches!(err, VoucherError::MissingField("answer")));

        let mut unknown = claim("crypto");
        unknown.level = 7;
        let err = issuer.issue_for_win(&unknown).await.unwrap_err();
        assert!(matches!(err, VoucherError::UnknownLevel(7)));
    }

    #[tokio::test]
    async fn test_standard_tier_amounts() {
        let issuer = issuer();
        let win = issuer.issue_for_win(&claim("CRYPTO")).await.unwrap();

        assert_eq!(win.tier(), MultiplierTier::Standard);
        let base = win.vouchers.base.quantities();
        assert_eq!(base.primary_amount, U256::from(10u64) * U256::exp10(18));
        assert_eq!(base.secondary_amount, U256::exp10(17));
    }

    #[tokio::test]
    async fn test_payload_decodes_to_signed_fields() {
        let issuer = issuer();
        let pair = issuer.issue_pair(2, MultiplierTier::Top).await.unwrap();

        let fields = pair.celo.to_claim().fields().unwrap();
        assert_eq!(fields.nonce, *pair.celo.nonce());
        assert_eq!(fields.digest(), pair.celo.digest());
        assert_eq!(fields.primary_amount, U256::from(15u64) * U256::exp10(18));
    }

    #[tokio::test]
    async fn test_overflowing_reward_is_an_error() {
        use crate::voucher::rewards::{ChainRewards, LevelRewards};
        use std::collections::BTreeMap;

        let rewards = ChainRewards {
            primary_base: U256::MAX / 3,
            secondary: U256::one(),
        };
        let issuer = VoucherIssuer::new(
            VoucherSigner::random(),
            RewardSchedule::new(BTreeMap::from([(
                1,
                LevelRewards {
                    base: rewards,
                    celo: rewards,
                },
            )])),
            Arc::new(InMemoryNonceStore::new()),
            ReputationManager::new(Arc::new(NoReputation), Duration::from_secs(1)),
        );

        assert!(issuer.issue_pair(1, MultiplierTier::Standard).await.is_ok());
        let err = issuer
            .issue_pair(1, MultiplierTier::Elite)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VoucherError::RewardOverflow {
                level: 1,
                chain: ChainId::Base
            }
        ));
        // Nothing reserved for the failed pair
        assert_eq!(issuer.nonce_store().len(), 2);
    }
}
