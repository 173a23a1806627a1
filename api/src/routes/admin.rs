//! Admin Endpoints
//!
//! Global config, whitelist, admin list and unlock key management. Every
//! handler takes an `AdminUser`, so non-admins get 403 before any work.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    routes::auth::AdminUser,
    services::{NewUnlockKey, WhitelistUpdate},
    types::{CardLimit, Email, SystemConfig, Tier, UnlockKey, UsageCap},
    AppState,
};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct DefaultLimitRequest {
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Unlock key 생성 요청
///
/// `cardLimit`, `maxUses` 생략 시 무제한 (-1)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub tier: String,
    #[serde(default)]
    pub card_limit: Option<i64>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateKeyRequest {
    fn into_new_key(self) -> Result<NewUnlockKey, ApiError> {
        Ok(NewUnlockKey {
            tier: self.tier.trim().to_lowercase().parse::<Tier>()?,
            card_limit: CardLimit::try_from(self.card_limit.unwrap_or(-1))?,
            max_uses: UsageCap::try_from(self.max_uses.unwrap_or(-1))?,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
}

// ============ Handlers ============

/// GET /admin/config
pub async fn get_config(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<SystemConfig>, ApiError> {
    Ok(Json(state.admin.current_config().await?))
}

/// PUT /admin/config/default-limit
///
/// 1 이상만 허용 (무제한은 기본값이 될 수 없음)
pub async fn set_default_limit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<DefaultLimitRequest>,
) -> Result<Json<SystemConfig>, ApiError> {
    let limit = CardLimit::finite(req.limit)?;
    tracing::info!(admin = %admin.user_id, limit = req.limit, "setting default card limit");
    Ok(Json(state.admin.set_default_card_limit(limit).await?))
}

/// POST /admin/whitelist
pub async fn add_whitelist(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<EmailRequest>,
) -> Result<Json<WhitelistUpdate>, ApiError> {
    let email = Email::parse(&req.email)?;
    Ok(Json(state.admin.add_to_whitelist(email).await?))
}

/// DELETE /admin/whitelist
pub async fn remove_whitelist(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<EmailRequest>,
) -> Result<Json<WhitelistUpdate>, ApiError> {
    let email = Email::parse(&req.email)?;
    Ok(Json(state.admin.remove_from_whitelist(email).await?))
}

/// POST /admin/admins
pub async fn add_admin(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<EmailRequest>,
) -> Result<Json<SystemConfig>, ApiError> {
    let email = Email::parse(&req.email)?;
    Ok(Json(state.admin.add_admin(email).await?))
}

/// DELETE /admin/admins
pub async fn remove_admin(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<EmailRequest>,
) -> Result<Json<SystemConfig>, ApiError> {
    let email = Email::parse(&req.email)?;
    Ok(Json(state.admin.remove_admin(email).await?))
}

/// GET /admin/unlock-keys
pub async fn list_unlock_keys(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<UnlockKey>>, ApiError> {
    Ok(Json(state.unlock_keys.list_keys().await?))
}

/// POST /admin/unlock-keys
pub async fn create_unlock_key(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<UnlockKey>, ApiError> {
    let request = req.into_new_key()?;
    Ok(Json(state.unlock_keys.create_key(request).await?))
}

/// DELETE /admin/unlock-keys/:key
pub async fn deactivate_unlock_key(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(key): Path<String>,
) -> Result<Json<DeactivateResponse>, ApiError> {
    if !state.unlock_keys.deactivate(&key).await? {
        return Err(ApiError::NotFound("Unlock key".to_string()));
    }
    Ok(Json(DeactivateResponse { success: true }))
}
