//! Win submission endpoint
//!
//! Endpoints:
//!   POST /submit -> Check an answer and return a signed voucher per chain

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiJson};
use crate::reputation::MultiplierTier;
use crate::voucher::{
    ChainId, ClaimSignatures, IssuedWin, RewardBreakdown, VoucherError, VoucherIssuer, WinClaim,
};

#[derive(Clone)]
pub struct GameApiState {
    pub issuer: Arc<VoucherIssuer>,
}

impl GameApiState {
    pub fn new(issuer: Arc<VoucherIssuer>) -> Self {
        Self { issuer }
    }
}

/// Every field is optional on the wire so that missing ones produce a
/// specific 400 rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitWinRequest {
    pub level: Option<u32>,
    pub answer: Option<String>,
    /// The puzzle's expected answer
    pub puzzle: Option<String>,
    pub fid: Option<u64>,
}

impl SubmitWinRequest {
    pub fn into_claim(self) -> Result<WinClaim, VoucherError> {
        Ok(WinClaim {
            level: self.level.ok_or(VoucherError::MissingField("level"))?,
            answer: self.answer.ok_or(VoucherError::MissingField("answer"))?,
            expected_answer: self.puzzle.ok_or(VoucherError::MissingField("puzzle"))?,
            fid: self.fid,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWinResponse {
    pub success: bool,
    pub level: u32,
    pub bonus_multiplier: f64,
    pub multiplier_tier: MultiplierTier,
    pub bonus_description: String,
    pub talent_score: Option<u32>,
    pub rewards: RewardBreakdown,
    pub signature: ClaimSignatures,
}

impl From<&IssuedWin> for SubmitWinResponse {
    fn from(win: &IssuedWin) -> Self {
        let tier = win.tier();
        Self {
            success: true,
            level: win.level,
            bonus_multiplier: tier.factor(),
            multiplier_tier: tier,
            bonus_description: tier.description().to_string(),
            talent_score: win.reputation.score.as_ref().map(|s| s.score),
            rewards: RewardBreakdown::new(
                win.vouchers.get(ChainId::Base).quantities(),
                win.vouchers.get(ChainId::Celo).quantities(),
            ),
            signature: win.vouchers.to_claims(),
        }
    }
}

/// POST /game/submit
pub async fn submit_win(
    State(state): State<GameApiState>,
    ApiJson(request): ApiJson<SubmitWinRequest>,
) -> Result<Json<SubmitWinResponse>, ApiError> {
    let claim = request.into_claim()?;
    let win = state.issuer.issue_for_win(&claim).await?;
    Ok(Json(SubmitWinResponse::from(&win)))
}

pub fn create_router(state: GameApiState) -> Router {
    Router::new()
        .route("/submit", post(submit_win))
        .with_state(state)
}
