use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::api::http::HttpSecurityConfig;
use crate::api::middleware::SecurityMiddlewareConfig;
use crate::crypto::{AuditSeverity, VoucherSigner};
use crate::reputation::talent::TALENT_API_BASE;
use crate::voucher::{ChainId, ChainRewards, LevelRewards, RewardSchedule, parse_token_amount};

/// Configuration for the voucher oracle service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub signer: SignerConfig,
    pub rewards: RewardsConfig,
    pub reputation: ReputationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for outbound reputation calls
    pub require_https: bool,
    /// Require an API key on non-public routes
    pub enable_auth: bool,
    #[serde(skip_serializing, default)]
    pub api_keys: Vec<String>,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

/// Holds the issuer's secp256k1 key. Never serialized or printed.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(skip_serializing, default)]
    pub private_key: String,
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Whole-token decimal amounts for one chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainAmounts {
    /// Scaled by the reputation multiplier
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    pub levels: Vec<u32>,
    pub base: ChainAmounts,
    pub celo: ChainAmounts,
    /// Primary amount overrides keyed by level, then chain
    pub primary_overrides: BTreeMap<u32, BTreeMap<ChainId, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    pub enabled: bool,
    pub api_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Mask client IPs and secrets in logs
    pub sanitize_logs: bool,
    pub log_requests: bool,
    /// Audit entries below this severity are dropped
    pub audit_min_severity: AuditSeverity,
}

impl Default for VoucherConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
            security: SecurityConfig {
                require_https: true,
                enable_auth: false,
                api_keys: Vec::new(),
                max_request_size: 64 * 1024,
            },
            signer: SignerConfig::default(),
            rewards: RewardsConfig {
                levels: vec![1, 2],
                base: ChainAmounts {
                    primary: "10".to_string(),
                    secondary: "0.1".to_string(),
                },
                celo: ChainAmounts {
                    primary: "10".to_string(),
                    secondary: "0.05".to_string(),
                },
                primary_overrides: BTreeMap::new(),
            },
            reputation: ReputationConfig {
                enabled: true,
                api_url: TALENT_API_BASE.to_string(),
                api_key: String::new(),
                timeout_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: true,
                audit_min_severity: AuditSeverity::Info,
            },
        }
    }
}

fn parse_var<T>(source: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    source(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {} value", key))
        })
        .transpose()
}

impl VoucherConfig {
    /// Load configuration from `VOUCHER_*` environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; `from_env` passes the process
    /// environment.
    pub fn from_source(source: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        // Server
        if let Some(host) = source("VOUCHER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&source, "VOUCHER_PORT")? {
            config.server.port = port;
        }

        // Security
        if let Some(require_https) = parse_var(&source, "VOUCHER_REQUIRE_HTTPS")? {
            config.security.require_https = require_https;
        }
        if let Some(enable_auth) = parse_var(&source, "VOUCHER_ENABLE_AUTH")? {
            config.security.enable_auth = enable_auth;
        }
        if let Some(max) = parse_var(&source, "VOUCHER_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = max;
        }
        if let Some(key) = source("VOUCHER_API_KEY") {
            config.security.api_keys.push(key.trim().to_string());
        }
        if let Some(keys) = source("VOUCHER_API_KEYS") {
            config.security.api_keys.extend(
                keys.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty()),
            );
        }

        // Signer
        config.signer.private_key = source("VOUCHER_SIGNER_PRIVATE_KEY")
            .or_else(|| source("BACKEND_PRIVATE_KEY"))
            .unwrap_or_default();

        // Rewards
        if let Some(levels) = source("VOUCHER_LEVELS") {
            config.rewards.levels = levels
                .split(',')
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().parse::<u32>())
                .collect::<Result<_, _>>()
                .context("Invalid VOUCHER_LEVELS value")?;
        }
        for (chain, amounts) in [
            (ChainId::Base, &mut config.rewards.base),
            (ChainId::Celo, &mut config.rewards.celo),
        ] {
            let prefix = format!("VOUCHER_{}", chain.name().to_uppercase());
            if let Some(primary) = source(&format!("{}_PRIMARY_AMOUNT", prefix)) {
                amounts.primary = primary;
            }
            if let Some(secondary) = source(&format!("{}_SECONDARY_AMOUNT", prefix)) {
                amounts.secondary = secondary;
            }
        }
        for &level in &config.rewards.levels {
            for chain in ChainId::ALL {
                let key = format!(
                    "VOUCHER_LEVEL_{}_{}_PRIMARY",
                    level,
                    chain.name().to_uppercase()
                );
                if let Some(amount) = source(&key) {
                    config
                        .rewards
                        .primary_overrides
                        .entry(level)
                        .or_default()
                        .insert(chain, amount);
                }
            }
        }

        // Reputation
        if let Some(enabled) = parse_var(&source, "VOUCHER_REPUTATION_ENABLED")? {
            config.reputation.enabled = enabled;
        }
        if let Some(url) = source("VOUCHER_TALENT_API_URL") {
            config.reputation.api_url = url;
        }
        config.reputation.api_key = source("VOUCHER_TALENT_API_KEY")
            .or_else(|| source("TALENT_PROTOCOL_API_KEY"))
            .unwrap_or_default();
        if let Some(timeout) = parse_var(&source, "VOUCHER_REPUTATION_TIMEOUT_SECS")? {
            config.reputation.timeout_secs = timeout;
        }
        if config.reputation.enabled && config.reputation.api_key.is_empty() {
            warn!("No Talent Protocol API key configured, all players get standard rewards");
            config.reputation.enabled = false;
        }

        // Logging
        if let Some(level) = source("VOUCHER_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(sanitize) = parse_var(&source, "VOUCHER_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize;
        }
        if let Some(log_requests) = parse_var(&source, "VOUCHER_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }
        if let Some(raw) = source("VOUCHER_AUDIT_MIN_SEVERITY") {
            config.logging.audit_min_severity = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid VOUCHER_AUDIT_MIN_SEVERITY value: {}", e))?;
        }

        config.validate()?;

        info!(
            levels = ?config.rewards.levels,
            reputation = config.reputation.enabled,
            auth = config.security.enable_auth,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.enable_auth && self.security.api_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "Authentication is enabled but no API keys are configured"
            ));
        }
        if self.security.max_request_size == 0 {
            return Err(anyhow::anyhow!("Maximum request size must be non-zero"));
        }

        if self.signer.private_key.is_empty() {
            return Err(anyhow::anyhow!(
                "Signing key is required (VOUCHER_SIGNER_PRIVATE_KEY or BACKEND_PRIVATE_KEY)"
            ));
        }
        self.build_signer()?;

        if self.rewards.levels.is_empty() {
            return Err(anyhow::anyhow!("At least one level must be configured"));
        }
        self.reward_schedule()?;

        if self.reputation.enabled {
            let url = Url::parse(&self.reputation.api_url)
                .with_context(|| format!("Invalid Talent API URL: {}", self.reputation.api_url))?;
            if self.security.require_https && url.scheme() != "https" {
                return Err(anyhow::anyhow!(
                    "HTTPS is required but Talent API URL is not HTTPS: {}",
                    self.reputation.api_url
                ));
            }
            if self.reputation.timeout_secs == 0 {
                return Err(anyhow::anyhow!("Reputation timeout must be non-zero"));
            }
        }

        Ok(())
    }

    /// The issuing key. Fails if the key is not a valid secp256k1 secret.
    pub fn build_signer(&self) -> Result<VoucherSigner> {
        VoucherSigner::from_private_key(&self.signer.private_key).context("Invalid signing key")
    }

    /// Per-level reward constants in base units
    pub fn reward_schedule(&self) -> Result<RewardSchedule> {
        let chain_rewards = |chain: ChainId, amounts: &ChainAmounts, level: u32| -> Result<ChainRewards> {
            let primary = self
                .rewards
                .primary_overrides
                .get(&level)
                .and_then(|overrides| overrides.get(&chain))
                .unwrap_or(&amounts.primary);
            Ok(ChainRewards {
                primary_base: parse_token_amount(primary)
                    .with_context(|| format!("Invalid {} primary amount for level {}", chain, level))?,
                secondary: parse_token_amount(&amounts.secondary)
                    .with_context(|| format!("Invalid {} secondary amount", chain))?,
            })
        };

        let mut levels = BTreeMap::new();
        for &level in &self.rewards.levels {
            levels.insert(
                level,
                LevelRewards {
                    base: chain_rewards(ChainId::Base, &self.rewards.base, level)?,
                    celo: chain_rewards(ChainId::Celo, &self.rewards.celo, level)?,
                },
            );
        }
        let schedule = RewardSchedule::new(levels);
        schedule.check_scalable()?;
        Ok(schedule)
    }

    pub fn reputation_timeout(&self) -> Duration {
        Duration::from_secs(self.reputation.timeout_secs)
    }

    /// Outbound HTTP policy: only the Talent API host is reachable
    pub fn http_security(&self) -> HttpSecurityConfig {
        let allowed_domains = Url::parse(&self.reputation.api_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .into_iter()
            .collect();

        HttpSecurityConfig {
            require_https: self.security.require_https,
            timeout_secs: self.reputation.timeout_secs,
            allowed_domains,
            ..HttpSecurityConfig::default()
        }
    }

    pub fn middleware_config(&self) -> SecurityMiddlewareConfig {
        SecurityMiddlewareConfig {
            enable_auth: self.security.enable_auth,
            api_keys: self.security.api_keys.clone(),
            max_request_size: self.security.max_request_size,
            log_requests: self.logging.log_requests,
            sanitize_logs: self.logging.sanitize_logs,
            ..SecurityMiddlewareConfig::default()
        }
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = [
        "private", "auth", "key", "token", "password", "secret", "credential", "apikey",
    ];

    let data_lower = data.to_lowercase();
    if !sensitive_patterns.iter().any(|p| data_lower.contains(p)) {
        return data.to_string();
    }

    // Only the name and the length survive; no characters of the value
    match data.split_once('=') {
        Some((name, value)) => format!("{}=<redacted, {} chars>", name, value.chars().count()),
        None => "<redacted>".to_string(),
    }
}
