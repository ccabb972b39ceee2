use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Security requirements for outbound HTTP calls
#[derive(Debug, Clone)]
pub struct HttpSecurityConfig {
    /// Require HTTPS for all external communications
    pub require_https: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Hosts that may be contacted (subdomains included)
    pub allowed_domains: Vec<String>,
}

impl Default for HttpSecurityConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            timeout_secs: 5,
            max_response_size: 1024 * 1024, // 1MB
            allowed_domains: vec!["api.talentprotocol.com".to_string()],
        }
    }
}

/// HTTP client restricted to an allow-list of hosts
#[derive(Clone)]
pub struct SecureHttpClient {
    client: Client,
    config: HttpSecurityConfig,
}

impl SecureHttpClient {
    /// Create a new secure HTTP client with validation
    pub fn new(config: HttpSecurityConfig) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("VoucherOracle/1.0");

        if config.require_https {
            client_builder = client_builder.https_only(true);
            info!("HTTPS enforcement enabled for outbound requests");
        } else {
            warn!("HTTPS enforcement disabled for outbound requests");
        }

        let client = client_builder
            .build()
            .context("Failed to create secure HTTP client")?;

        Ok(Self { client, config })
    }

    /// Validate URL for security requirements
    fn validate_url(&self, url: &str) -> Result<Url> {
        let parsed_url = Url::parse(url).context("Invalid URL format")?;

        if self.config.require_https && parsed_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but URL uses {}: {}",
                parsed_url.scheme(),
                url
            ));
        }

        let Some(host) = parsed_url.host_str() else {
            return Err(anyhow::anyhow!("URL must have a valid host: {}", url));
        };

        if !self
            .config
            .allowed_domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
        {
            return Err(anyhow::anyhow!(
                "Domain '{}' is not in the allowed list: {:?}",
                host,
                self.config.allowed_domains
            ));
        }

        Ok(parsed_url)
    }

    /// GET a JSON document with extra headers and a size cap
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let validated_url = self.validate_url(url)?;

        debug!("Fetching JSON from validated URL: {}", validated_url);

        let mut request = self
            .client
            .get(validated_url.as_str())
            .query(query)
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "HTTP request failed with status {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let content_length = response.content_length().unwrap_or(0);
        if content_length > self.config.max_response_size as u64 {
            return Err(anyhow::anyhow!(
                "Response too large: {} bytes (max: {})",
                content_length,
                self.config.max_response_size
            ));
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        if body.len() > self.config.max_response_size {
            return Err(anyhow::anyhow!(
                "Response body too large: {} bytes (max: {})",
                body.len(),
                self.config.max_response_size
            ));
        }

        serde_json::from_slice(&body).context("Malformed JSON response")
    }

    /// Get the security configuration
    pub fn config(&self) -> &HttpSecurityConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        let client = SecureHttpClient::new(HttpSecurityConfig::default()).unwrap();

        assert!(
            client
                .validate_url("https://api.talentprotocol.com/farcaster/scores")
                .is_ok()
        );

        // Plain HTTP when HTTPS required
        assert!(
            client
                .validate_url("http://api.talentprotocol.com/farcaster/scores")
                .is_err()
        );

        // Disallowed domain, including suffix tricks
        assert!(client.validate_url("https://evil.example.com/").is_err());
        assert!(
            client
                .validate_url("https://api.talentprotocol.com.evil.io/")
                .is_err()
        );
    }

    #[test]
    fn test_subdomains_allowed() {
        let client = SecureHttpClient::new(HttpSecurityConfig {
            allowed_domains: vec!["talentprotocol.com".to_string()],
            ..HttpSecurityConfig::default()
        })
        .unwrap();

        assert!(client.validate_url("https://api.talentprotocol.com/").is_ok());
        assert!(client.validate_url("https://talentprotocol.com/").is_ok());
    }
}
