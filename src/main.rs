use anyhow::{Context, Result};
use axum::{Router, middleware, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use voucher_oracle::{
    AuditLogger, InMemoryNonceStore, NoReputation, ReputationManager, ReputationProvider,
    TalentReputationClient, VoucherConfig, VoucherIssuer,
    api::{
        GameApiState, PlayerStatsStore, SecureHttpClient, SecurityState, StatsApiState,
        TalentApiState, auth_middleware, body_size_middleware, create_game_router,
        create_stats_router, create_talent_router, logging_middleware,
        security_headers_middleware,
    },
    config::sanitize_for_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration is validated up front; a missing or bad signing key stops here
    let config = VoucherConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check VOUCHER_* environment variables.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting reward voucher oracle");
    info!(
        "Security settings: HTTPS required: {}, Auth enabled: {}",
        config.security.require_https, config.security.enable_auth
    );

    let audit = AuditLogger::new().with_min_severity(config.logging.audit_min_severity);
    let signer = config.build_signer()?;
    info!(signer = ?signer.address(), "Voucher signer loaded");

    let reputation =
        ReputationManager::new(build_reputation_provider(&config)?, config.reputation_timeout())
            .with_audit(audit.clone());

    let schedule = config.reward_schedule()?;
    info!(levels = ?schedule.levels().collect::<Vec<_>>(), "Reward schedule loaded");

    // Process-local replay guard; the vault contracts remain the authority
    let issuer = Arc::new(
        VoucherIssuer::new(
            signer,
            schedule,
            Arc::new(InMemoryNonceStore::new()),
            reputation.clone(),
        )
        .with_audit(audit),
    );

    let security_state = SecurityState::new(config.middleware_config());

    let app = Router::new()
        .nest("/game", create_game_router(GameApiState::new(issuer)))
        .nest("/talent", create_talent_router(TalentApiState::new(reputation)))
        .nest(
            "/stats",
            create_stats_router(StatsApiState::new(Arc::new(PlayerStatsStore::new()))),
        )
        .route("/health", get(|| async { "OK" }))
        // Layers added last wrap the ones before them
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state,
            logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Voucher oracle listening on {}", bind_addr);
    info!(
        "Request middleware: Auth={}, Max body={}KB",
        config.security.enable_auth,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging at the configured level
fn init_secure_logging(config: &VoucherConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Secure logging initialized with data sanitization enabled");
    }

    Ok(())
}

/// Talent Protocol when a key is configured, otherwise every player is standard
fn build_reputation_provider(config: &VoucherConfig) -> Result<Arc<dyn ReputationProvider>> {
    if !config.reputation.enabled {
        warn!("Reputation lookups disabled, all wins pay standard rewards");
        return Ok(Arc::new(NoReputation));
    }

    let http = SecureHttpClient::new(config.http_security())
        .context("Failed to create reputation HTTP client")?;

    if config.logging.sanitize_logs {
        info!(
            url = %config.reputation.api_url,
            key = %sanitize_for_logging(&format!("api_key={}", config.reputation.api_key)),
            "Talent Protocol reputation enabled"
        );
    } else {
        info!(url = %config.reputation.api_url, "Talent Protocol reputation enabled");
    }

    Ok(Arc::new(TalentReputationClient::new(
        http,
        config.reputation.api_url.clone(),
        config.reputation.api_key.clone(),
    )))
}
