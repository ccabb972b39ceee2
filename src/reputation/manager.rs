//! Reputation Resolver
//!
//! Wraps a reputation provider with a hard timeout and folds every failure
//! into "no score". A win must always be payable, so nothing in here returns
//! an error to the caller.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::crypto::AuditLogger;
use crate::reputation::{MultiplierTier, ReputationScore};

/// Source of builder scores.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Score for one player; `Ok(None)` when the provider has no record.
    async fn lookup_score(&self, fid: u64) -> Result<Option<ReputationScore>>;

    /// Scores for several players. Players without a record are omitted.
    async fn lookup_scores(&self, fids: &[u64]) -> Result<Vec<ReputationScore>>;
}

/// Provider used when reputation lookups are switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReputation;

#[async_trait]
impl ReputationProvider for NoReputation {
    async fn lookup_score(&self, _fid: u64) -> Result<Option<ReputationScore>> {
        Ok(None)
    }

    async fn lookup_scores(&self, _fids: &[u64]) -> Result<Vec<ReputationScore>> {
        Ok(Vec::new())
    }
}

/// Resolved reputation for one win
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReputation {
    pub score: Option<ReputationScore>,
    pub tier: MultiplierTier,
}

impl ResolvedReputation {
    pub fn absent() -> Self {
        Self {
            score: None,
            tier: MultiplierTier::Standard,
        }
    }
}

/// Timeout-bounded, failure-absorbing front for a [`ReputationProvider`]
#[derive(Clone)]
pub struct ReputationManager {
    provider: Arc<dyn ReputationProvider>,
    timeout: Duration,
    audit: AuditLogger,
}

impl ReputationManager {
    pub fn new(provider: Arc<dyn ReputationProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            audit: AuditLogger::new(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a player's tier. Timeouts and provider errors degrade to the
    /// standard tier.
    pub async fn resolve(&self, fid: Option<u64>) -> ResolvedReputation {
        let Some(fid) = fid else {
            return ResolvedReputation::absent();
        };

        match tokio::time::timeout(self.timeout, self.provider.lookup_score(fid)).await {
            Ok(Ok(Some(score))) => {
                let tier = score.tier();
                debug!(fid, score = score.score, tier = tier.label(), "Reputation resolved");
                ResolvedReputation {
                    score: Some(score),
                    tier,
                }
            }
            Ok(Ok(None)) => {
                debug!(fid, "No reputation record");
                ResolvedReputation::absent()
            }
            Ok(Err(e)) => {
                warn!(fid, error = %e, "Reputation lookup failed, using standard tier");
                self.audit
                    .log_reputation_degraded(&fid.to_string(), &e.to_string())
                    .await;
                ResolvedReputation::absent()
            }
            Err(_) => {
                warn!(fid, timeout_ms = self.timeout.as_millis() as u64, "Reputation lookup timed out");
                self.audit
                    .log_reputation_degraded(&fid.to_string(), "timeout")
                    .await;
                ResolvedReputation::absent()
            }
        }
    }

    /// Batch lookup for leaderboards; failures yield an empty list.
    pub async fn resolve_many(&self, fids: &[u64]) -> Vec<ReputationScore> {
        if fids.is_empty() {
            return Vec::new();
        }

        match tokio::time::timeout(self.timeout, self.provider.lookup_scores(fids)).await {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                warn!(count = fids.len(), error = %e, "Batch reputation lookup failed");
                Vec::new()
            }
            Err(_) => {
                warn!(count = fids.len(), "Batch reputation lookup timed out");
                Vec::new()
            }
        }
    }
}
