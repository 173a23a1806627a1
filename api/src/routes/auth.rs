//! Request Authentication
//!
//! Handlers never read an owner id from the request body. They take an
//! `AuthUser` (or `AdminUser`) argument, which resolves the bearer token into
//! an `Identity` before the handler runs.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{error::ApiError, types::Identity, AppState};

/// 인증된 사용자
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// 인증 + 관리자 권한 확인
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;

        let identity = state
            .verifier
            .verify(token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser(identity))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;

        if !state.admin.is_admin(identity.email.as_ref()).await? {
            tracing::warn!(user_id = %identity.user_id, "admin access denied");
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminUser(identity))
    }
}
