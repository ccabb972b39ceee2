//! Builder score endpoints
//!
//! Endpoints:
//!   GET  /score?fid=   -> Score and bonus tier for one player
//!   POST /leaderboard  -> Scores for many players, best first

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::reputation::{MultiplierTier, ReputationManager, ReputationScore};

#[derive(Clone)]
pub struct TalentApiState {
    pub reputation: ReputationManager,
}

impl TalentApiState {
    pub fn new(reputation: ReputationManager) -> Self {
        Self { reputation }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreQuery {
    pub fid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentScoreResponse {
    pub fid: u64,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub has_score: bool,
    pub bonus_multiplier: f64,
    pub bonus_description: String,
    pub wallet_addresses: Vec<String>,
    pub ens_names: Vec<String>,
}

impl TalentScoreResponse {
    fn new(fid: u64, score: Option<ReputationScore>) -> Self {
        let tier = MultiplierTier::from_score(score.as_ref().map(|s| s.score));
        let identity = score
            .as_ref()
            .and_then(|s| s.identity_graph.clone())
            .unwrap_or_default();

        Self {
            fid,
            score: score.as_ref().map(|s| s.score).unwrap_or(0),
            rank: score.as_ref().and_then(|s| s.rank),
            has_score: score.is_some(),
            bonus_multiplier: tier.factor(),
            bonus_description: tier.description().to_string(),
            wallet_addresses: identity.wallet_addresses,
            ens_names: identity.ens_names,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardRequest {
    pub fids: Option<Vec<u64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub fid: u64,
    pub score: u32,
    pub rank: Option<u32>,
    pub bonus_multiplier: f64,
    pub bonus_description: String,
}

impl From<&ReputationScore> for LeaderboardEntry {
    fn from(score: &ReputationScore) -> Self {
        let tier = score.tier();
        Self {
            fid: score.fid,
            score: score.score,
            rank: score.rank,
            bonus_multiplier: tier.factor(),
            bonus_description: tier.description().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub total: usize,
}

/// GET /talent/score?fid=
pub async fn get_score(
    State(state): State<TalentApiState>,
    ApiQuery(query): ApiQuery<ScoreQuery>,
) -> Result<Json<TalentScoreResponse>, ApiError> {
    let raw = query
        .fid
        .ok_or_else(|| ApiError::bad_request("Farcaster FID is required"))?;
    let fid = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ApiError::bad_request("Invalid FID format"))?;

    let resolved = state.reputation.resolve(Some(fid)).await;
    Ok(Json(TalentScoreResponse::new(fid, resolved.score)))
}

/// POST /talent/leaderboard
pub async fn get_leaderboard(
    State(state): State<TalentApiState>,
    ApiJson(request): ApiJson<LeaderboardRequest>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let fids = request
        .fids
        .ok_or_else(|| ApiError::bad_request("FIDs array is required"))?;

    let mut scores = state.reputation.resolve_many(&fids).await;
    scores.sort_by(|a, b| b.score.cmp(&a.score));

    let leaderboard: Vec<LeaderboardEntry> = scores.iter().map(LeaderboardEntry::from).collect();
    Ok(Json(LeaderboardResponse {
        total: leaderboard.len(),
        leaderboard,
    }))
}

pub fn create_router(state: TalentApiState) -> Router {
    Router::new()
        .route("/score", get(get_score))
        .route("/leaderboard", post(get_leaderboard))
        .with_state(state)
}
