//! Talent Protocol builder-score provider

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::api::http::SecureHttpClient;
use crate::reputation::{ReputationProvider, ReputationScore};

/// Default Talent Protocol API root
pub const TALENT_API_BASE: &str = "https://api.talentprotocol.com";

/// Reads builder scores from `GET {base}/farcaster/scores?fids=..`
#[derive(Clone)]
pub struct TalentReputationClient {
    http: SecureHttpClient,
    base_url: String,
    api_key: String,
}

impl TalentReputationClient {
    pub fn new(http: SecureHttpClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn scores_url(&self) -> String {
        format!("{}/farcaster/scores", self.base_url)
    }

    async fn fetch(&self, fids: &[u64]) -> Result<Vec<ReputationScore>> {
        let fid_list = fids
            .iter()
            .map(|fid| fid.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let scores: Vec<ReputationScore> = self
            .http
            .get_json(
                &self.scores_url(),
                &[("fids", fid_list)],
                &[("X-API-KEY", self.api_key.as_str())],
            )
            .await?;

        debug!(requested = fids.len(), returned = scores.len(), "Fetched Talent scores");
        Ok(scores)
    }
}

#[async_trait]
impl ReputationProvider for TalentReputationClient {
    async fn lookup_score(&self, fid: u64) -> Result<Option<ReputationScore>> {
        let scores = self.fetch(&[fid]).await?;
        Ok(scores.into_iter().find(|s| s.fid == fid))
    }

    async fn lookup_scores(&self, fids: &[u64]) -> Result<Vec<ReputationScore>> {
        self.fetch(fids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::http::HttpSecurityConfig;

    #[test]
    fn test_scores_url_trims_slash() {
        let http = SecureHttpClient::new(HttpSecurityConfig::default()).unwrap();
        let client = TalentReputationClient::new(http, "https://api.talentprotocol.com/", "key");
        assert_eq!(
            client.scores_url(),
            "https://api.talentprotocol.com/farcaster/scores"
        );
    }

    #[tokio::test]
    async fn test_disallowed_host_is_an_error() {
        let http = SecureHttpClient::new(HttpSecurityConfig::default()).unwrap();
        let client = TalentReputationClient::new(http, "https://scores.example.org", "key");
        assert!(client.lookup_score(1).await.is_err());
    }
}
