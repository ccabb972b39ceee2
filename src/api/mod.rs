//! HTTP API for the voucher oracle
//!
//! Provides:
//! - Win submission and voucher issuance (`/game`)
//! - Builder score lookups (`/talent`)
//! - Per-player counters (`/stats`)
//! - Secure HTTP client for the reputation provider
//! - Request middleware (auth, body size, headers, logging)

pub mod error;
pub mod game;
pub mod http;
pub mod middleware;
pub mod stats;
pub mod talent;

pub use error::{ApiError, ApiJson, ApiQuery, ErrorBody};
pub use game::{GameApiState, create_router as create_game_router};
pub use http::{HttpSecurityConfig, SecureHttpClient};
pub use middleware::{
    SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
    logging_middleware, security_headers_middleware,
};
pub use stats::{PlayerStatsStore, StatsApiState, create_router as create_stats_router};
pub use talent::{TalentApiState, create_router as create_talent_router};
