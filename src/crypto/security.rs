//! Replay Guard and Audit Log for Voucher Issuance
//!
//! Provides:
//! - Voucher nonces drawn from the OS CSPRNG
//! - A pluggable store of consumed nonces (in-memory by default)
//! - Audit logging for security-relevant issuer events
//!
//! The nonce store is a process-local, best-effort guard. Vault contracts keep
//! their own nonce ledger and remain the authority on whether a voucher was
//! already claimed.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use ethers::types::H256;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

// ============================================================================
// Constants
// ============================================================================

/// Attempts at drawing a non-colliding nonce before giving up
pub const MAX_NONCE_ATTEMPTS: usize = 8;

/// Default audit log capacity
const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

// ============================================================================
// Nonces
// ============================================================================

/// 32-byte voucher nonce, serialized as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoucherNonce(H256);

impl VoucherNonce {
    /// Draw a fresh nonce from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(H256(bytes))
    }

    /// Panics if `bytes` is not 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(H256::from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for VoucherNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoucherNonce({})", self.to_hex())
    }
}

impl fmt::Display for VoucherNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ============================================================================
// Nonce Store
// ============================================================================

/// Set of nonces this issuer has already put into a voucher.
///
/// `reserve` must be atomic: of two concurrent calls with the same nonce,
/// exactly one returns `true`.
pub trait NonceStore: Send + Sync {
    /// Record `nonce` as consumed. Returns `false` if it was already present.
    fn reserve(&self, nonce: VoucherNonce) -> bool;

    fn contains(&self, nonce: &VoucherNonce) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime nonce set. Cleared on restart.
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    consumed: DashSet<VoucherNonce>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn reserve(&self, nonce: VoucherNonce) -> bool {
        self.consumed.insert(nonce)
    }

    fn contains(&self, nonce: &VoucherNonce) -> bool {
        self.consumed.contains(nonce)
    }

    fn len(&self) -> usize {
        self.consumed.len()
    }
}

/// Outcome of drawing a nonce against a store.
#[derive(Debug, Clone, Copy)]
pub struct ReservedNonce {
    pub nonce: VoucherNonce,
    /// Draws rejected because the store already held them
    pub collisions: usize,
}

/// Draw nonces until one is not yet in `store`, reserving it atomically.
///
/// Returns `None` only if every attempt collided, which in practice means the
/// random source is broken.
pub fn reserve_fresh_nonce(
    store: &dyn NonceStore,
    mut draw: impl FnMut() -> VoucherNonce,
) -> Option<ReservedNonce> {
    for attempt in 0..MAX_NONCE_ATTEMPTS {
        let nonce = draw();
        if store.reserve(nonce) {
            return Some(ReservedNonce {
                nonce,
                collisions: attempt,
            });
        }
    }
    None
}

// ============================================================================
// Audit Logging
// ============================================================================

/// Types of auditable issuer events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEventType {
    VoucherIssued {
        chain: String,
        nonce: String,
        level: u32,
        multiplier_bps: u32,
    },
    NonceCollision {
        nonce: String,
    },
    IssuanceRejected {
        reason: String,
    },
    ReputationDegraded {
        player: String,
        reason: String,
    },
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub request_id: Option<String>,
    pub severity: AuditSeverity,
    pub metadata: HashMap<String, String>,
}

/// Severity levels for audit events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Critical = 4,
}

impl std::str::FromStr for AuditSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(AuditSeverity::Debug),
            "info" => Ok(AuditSeverity::Info),
            "warn" | "warning" => Ok(AuditSeverity::Warning),
            "error" => Ok(AuditSeverity::Error),
            "critical" => Ok(AuditSeverity::Critical),
            other => Err(format!("unknown audit severity: {}", other)),
        }
    }
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType, severity: AuditSeverity) -> Self {
        Self {
            id: format!("audit_{}", uuid::Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            event_type,
            request_id: None,
            severity,
            metadata: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    fn for_request(self, request_id: Option<&str>) -> Self {
        match request_id {
            Some(id) => self.with_request_id(id.to_string()),
            None => self,
        }
    }
}

/// Bounded in-memory audit trail, mirrored to `tracing`.
#[derive(Clone)]
pub struct AuditLogger {
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    max_entries: usize,
    min_severity: AuditSeverity,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: DEFAULT_AUDIT_CAPACITY,
            min_severity: AuditSeverity::Info,
        }
    }

    pub fn with_capacity(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Log an audit event
    pub async fn log(&self, entry: AuditEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        match entry.severity {
            AuditSeverity::Debug => tracing::debug!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Info => tracing::info!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Warning => tracing::warn!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Error => tracing::error!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Critical => tracing::error!("AUDIT CRITICAL: {:?}", entry.event_type),
        }

        let mut entries = self.entries.write().await;
        entries.push_back(entry);

        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub async fn log_nonce_collision(&self, nonce: &VoucherNonce, request_id: Option<&str>) {
        let entry = AuditEntry::new(
            AuditEventType::NonceCollision {
                nonce: nonce.to_hex(),
            },
            AuditSeverity::Critical,
        );
        self.log(entry.for_request(request_id)).await;
    }

    pub async fn log_issuance_rejected(&self, reason: &str, request_id: Option<&str>) {
        let entry = AuditEntry::new(
            AuditEventType::IssuanceRejected {
                reason: reason.to_string(),
            },
            AuditSeverity::Warning,
        );
        self.log(entry.for_request(request_id)).await;
    }

    pub async fn log_reputation_degraded(&self, player: &str, reason: &str) {
        self.log(AuditEntry::new(
            AuditEventType::ReputationDegraded {
                player: player.to_string(),
                reason: reason.to_string(),
            },
            AuditSeverity::Warning,
        ))
        .await;
    }

    /// Get recent entries, newest first
    pub async fn get_recent(&self, count: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(count).cloned().collect()
    }

    /// Get entries at or above a severity
    pub async fn get_by_severity(&self, min_severity: AuditSeverity) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.severity >= min_severity)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_nonces_differ() {
        let a = VoucherNonce::generate();
        let b = VoucherNonce::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), 32);
    }

    #[test]
    fn test_nonce_serializes_as_hex() {
        let nonce = VoucherNonce::from_slice(&[0x11; 32]);
        let json = serde_json::to_string(&nonce).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(32)));
        let back: VoucherNonce = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nonce);
    }

    #[test]
    fn test_store_reserve_is_once_only() {
        let store = InMemoryNonceStore::new();
        let nonce = VoucherNonce::generate();

        assert!(store.reserve(nonce));
        assert!(!store.reserve(nonce));
        assert!(store.contains(&nonce));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reserve_fresh_nonce_skips_collisions() {
        let store = InMemoryNonceStore::new();
        let taken = VoucherNonce::from_slice(&[1; 32]);
        let fresh = VoucherNonce::from_slice(&[2; 32]);
        store.reserve(taken);

        let mut draws = vec![fresh, taken, taken].into_iter().rev();
        let reserved = reserve_fresh_nonce(&store, || draws.next().unwrap()).unwrap();

        assert_eq!(reserved.nonce, fresh);
        assert_eq!(reserved.collisions, 2);
        assert!(store.contains(&fresh));
    }

    #[test]
    fn test_reserve_fresh_nonce_gives_up() {
        let store = InMemoryNonceStore::new();
        let taken = VoucherNonce::from_slice(&[7; 32]);
        store.reserve(taken);

        assert!(reserve_fresh_nonce(&store, || taken).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_logger_is_bounded() {
        let logger = AuditLogger::new().with_capacity(2);

        logger.log_issuance_rejected("one", None).await;
        logger.log_issuance_rejected("two", Some("win_1")).await;
        logger.log_nonce_collision(&VoucherNonce::generate(), None).await;

        let recent = logger.get_recent(10).await;
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            recent[0].event_type,
            AuditEventType::NonceCollision { .. }
        ));
        assert_eq!(logger.get_by_severity(AuditSeverity::Critical).await.len(), 1);
        assert_eq!(recent[1].request_id.as_deref(), Some("win_1"));
    }

    #[tokio::test]
    async fn test_min_severity_filters_entries() {
        let logger = AuditLogger::new().with_min_severity("warning".parse().unwrap());

        logger
            .log(AuditEntry::new(
                AuditEventType::IssuanceRejected {
                    reason: "noise".to_string(),
                },
                AuditSeverity::Info,
            ))
            .await;
        logger.log_issuance_rejected("kept", None).await;

        let recent = logger.get_recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].severity, AuditSeverity::Warning);
        assert!("loud".parse::<AuditSeverity>().is_err());
    }
}
