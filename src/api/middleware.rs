//! Request middleware for the voucher API
//!
//! Provides:
//! - Optional API key authentication
//! - Request body size limits
//! - Security headers
//! - Request logging with client IP masking

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Middleware settings, derived from [`crate::config::SecurityConfig`]
#[derive(Debug, Clone)]
pub struct SecurityMiddlewareConfig {
    /// Require an API key outside `public_paths`
    pub enable_auth: bool,
    pub api_keys: Vec<String>,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    pub log_requests: bool,
    /// Mask client IPs in request logs
    pub sanitize_logs: bool,
    /// Path prefixes that never need a key
    pub public_paths: Vec<String>,
}

impl Default for SecurityMiddlewareConfig {
    fn default() -> Self {
        Self {
            enable_auth: false,
            api_keys: Vec::new(),
            max_request_size: 64 * 1024,
            log_requests: true,
            sanitize_logs: true,
            public_paths: vec!["/health".to_string()],
        }
    }
}

/// Shared state for the middleware stack
#[derive(Debug, Clone)]
pub struct SecurityState {
    pub config: SecurityMiddlewareConfig,
}

impl SecurityState {
    pub fn new(config: SecurityMiddlewareConfig) -> Self {
        Self { config }
    }
}

/// Client IP, preferring proxy headers over the socket address
fn get_client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string());
    if let Some(ip) = forwarded.filter(|ip| !ip.is_empty()) {
        return ip;
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Mask a value for logging, keeping four characters at each end.
pub fn sanitize_for_log(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn is_public_path(path: &str, public_paths: &[String]) -> bool {
    public_paths.iter().any(|p| path.starts_with(p))
}

/// API key authentication; a no-op unless `enable_auth` is set
pub async fn auth_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();

    if !state.config.enable_auth || is_public_path(path, &state.config.public_paths) {
        return Ok(next.run(request).await);
    }

    let api_key = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string());

    match api_key {
        Some(key) if state.config.api_keys.contains(&key) => {
            debug!(path, "API key accepted");
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!(path, "Invalid API key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!(path, "Missing API key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // Vouchers are single-use; never cache them
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.remove("Server");

    response
}

/// Logs method, path, status and latency for every request
pub async fn logging_middleware(
    State(state): State<SecurityState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = get_client_ip(&headers, Some(&addr));
    let log_ip = if state.config.sanitize_logs {
        sanitize_for_log(&client_ip)
    } else {
        client_ip
    };

    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        error!(%method, %path, status, duration_ms, client_ip = %log_ip, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, %path, status, duration_ms, client_ip = %log_ip, "Client error");
    } else {
        info!(%method, %path, status, duration_ms, client_ip = %log_ip, "Request completed");
    }

    response
}

/// Rejects bodies whose declared length exceeds `max_request_size`
pub async fn body_size_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let declared = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = declared {
        if length > state.config.max_request_size {
            warn!(
                length,
                max = state.config.max_request_size,
                "Request body too large"
            );
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("short"), "*****");
        assert_eq!(sanitize_for_log("abcdefghij"), "abcd...ghij");
        let result = sanitize_for_log("192.168.1.100");
        assert!(result.starts_with("192."));
        assert!(result.ends_with(".100"));
        // Multi-byte input must not split a character
        assert_eq!(sanitize_for_log("ééééééééé"), "éééé...éééé");
    }

    #[test]
    fn test_is_public_path() {
        let public = vec!["/health".to_string()];

        assert!(is_public_path("/health", &public));
        assert!(!is_public_path("/game/submit", &public));
        assert!(!is_public_path("/talent/score", &public));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let addr: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(get_client_ip(&headers, Some(&addr)), "10.0.0.1");

        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.9"));
        assert_eq!(get_client_ip(&headers, Some(&addr)), "172.16.0.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(get_client_ip(&headers, Some(&addr)), "203.0.113.7");
    }

    #[test]
    fn test_auth_off_by_default() {
        let config = SecurityMiddlewareConfig::default();
        assert!(!config.enable_auth);
        assert!(config.api_keys.is_empty());
    }
}
