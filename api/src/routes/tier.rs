//! Tier Endpoints
//!
//! Profile lookup, the advisory "can I add a card?" check and unlock key
//! redemption. A rejected key is an expected outcome, answered with a
//! structured 400 body rather than an error.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    routes::auth::AuthUser,
    services::{CardAllowance, RedeemOutcome},
    types::UserProfile,
    AppState,
};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    #[serde(default)]
    pub key: Option<String>,
}

/// Redeem 응답 (성공/실패 공통)
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============ Handlers ============

/// GET /tier/profile
///
/// 프로필이 없으면 생성 후 반환
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.tiers.get_user_profile(&identity).await?;
    Ok(Json(profile))
}

/// GET /tier/can-add-card
pub async fn can_add_card(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<CardAllowance>, ApiError> {
    let allowance = state.tiers.can_add_card(&identity).await?;
    Ok(Json(allowance))
}

/// POST /tier/redeem-key
///
/// # Response
///
/// - 200 `{success: true, profile}`
/// - 400 `{success: false, error}` (없는/비활성/만료/소진 key, 다른 key 사용 이력)
/// - 400 key 누락
pub async fn redeem_key(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<RedeemRequest>,
) -> Result<Response, ApiError> {
    let key = req
        .key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Unlock key is required".to_string()))?;

    let response = match state.unlock_keys.redeem(&identity, key).await? {
        RedeemOutcome::Redeemed(profile) => (
            StatusCode::OK,
            Json(RedeemResponse {
                success: true,
                profile: Some(profile),
                error: None,
            }),
        ),
        RedeemOutcome::Rejected(reason) => (
            StatusCode::BAD_REQUEST,
            Json(RedeemResponse {
                success: false,
                profile: None,
                error: Some(reason.message().to_string()),
            }),
        ),
    };

    Ok(response.into_response())
}
