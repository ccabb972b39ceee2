//! Per-player play counters
//!
//! Endpoints:
//!   GET  /stats?address= -> Counters for one address
//!   POST /stats          -> Record a play, win or claim

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::api::error::{ApiError, ApiJson, ApiQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsAction {
    Play,
    Win,
    Claim,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_wins: u64,
    pub total_plays: u64,
    pub rewards_claimed: u64,
    pub level1_plays: u64,
    pub level2_plays: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl PlayerStats {
    fn apply(&mut self, action: StatsAction, level: Option<u32>) {
        match action {
            StatsAction::Play => {
                self.total_plays += 1;
                match level {
                    Some(1) => self.level1_plays += 1,
                    Some(2) => self.level2_plays += 1,
                    _ => {}
                }
            }
            StatsAction::Win => self.total_wins += 1,
            StatsAction::Claim => self.rewards_claimed += 1,
        }
        self.last_activity = Some(Utc::now());
    }
}

/// Counters keyed by lower-cased wallet address. Lost on restart.
#[derive(Debug, Default)]
pub struct PlayerStatsStore {
    players: DashMap<String, PlayerStats>,
}

impl PlayerStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> PlayerStats {
        self.players
            .get(&address.to_lowercase())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn record(&self, address: &str, action: StatsAction, level: Option<u32>) -> PlayerStats {
        let mut entry = self.players.entry(address.to_lowercase()).or_default();
        entry.apply(action, level);
        entry.value().clone()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[derive(Clone)]
pub struct StatsApiState {
    pub store: Arc<PlayerStatsStore>,
}

impl StatsApiState {
    pub fn new(store: Arc<PlayerStatsStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordStatsRequest {
    pub address: Option<String>,
    pub action: StatsAction,
    pub level: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecordStatsResponse {
    pub success: bool,
    pub stats: PlayerStats,
}

fn required_address(address: Option<String>) -> Result<String, ApiError> {
    address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("Address required"))
}

/// GET /stats?address=
pub async fn get_stats(
    State(state): State<StatsApiState>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<PlayerStats>, ApiError> {
    let address = required_address(query.address)?;
    Ok(Json(state.store.get(&address)))
}

/// POST /stats
pub async fn record_stats(
    State(state): State<StatsApiState>,
    ApiJson(request): ApiJson<RecordStatsRequest>,
) -> Result<Json<RecordStatsResponse>, ApiError> {
    let address = required_address(request.address)?;
    let stats = state.store.record(&address, request.action, request.level);
    debug!(action = ?request.action, level = ?request.level, "Recorded player stats");

    Ok(Json(RecordStatsResponse {
        success: true,
        stats,
    }))
}

pub fn create_router(state: StatsApiState) -> Router {
    Router::new()
        .route("/", get(get_stats).post(record_stats))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_per_action() {
        let store = PlayerStatsStore::new();
        store.record("0xAbC", StatsAction::Play, Some(1));
        store.record("0xabc", StatsAction::Play, Some(2));
        store.record("0xabc", StatsAction::Play, None);
        store.record("0xABC", StatsAction::Win, Some(1));
        let stats = store.record("0xabc", StatsAction::Claim, None);

        assert_eq!(stats.total_plays, 3);
        assert_eq!(stats.level1_plays, 1);
        assert_eq!(stats.level2_plays, 1);
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.rewards_claimed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_address_has_zero_counters() {
        let store = PlayerStatsStore::new();
        let stats = store.get("0xdead");
        assert_eq!(stats, PlayerStats::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_action_parsing() {
        let request: RecordStatsRequest =
            serde_json::from_str(r#"{"address": "0x1", "action": "win"}"#).unwrap();
        assert_eq!(request.action, StatsAction::Win);
        assert!(serde_json::from_str::<RecordStatsRequest>(r#"{"action": "cheat"}"#).is_err());
    }
}
