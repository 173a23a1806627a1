//! Identity Verification
//!
//! The auth gateway (Firebase / Apple / phone OTP, outside this service) issues
//! a short-lived bearer JWT once the user has signed in. This module only
//! checks that token and turns it into an `Identity`; raw provider credentials
//! never reach the API.
//!
//! # Token
//!
//! ```text
//! HS256 JWT signed with AUTH_TOKEN_SECRET
//! claims = {"sub": "<user id>", "email": "<email>|null", "exp": <unix seconds>}
//! ```

use anyhow::Result;
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{Email, Identity, UserId};

/// Bearer token → Identity
///
/// `Ok(None)`은 잘못된/만료된 token (401), `Err`는 검증기 자체 장애 (500)
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<Identity>>;
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// 만료 시각 (unix seconds)
    pub exp: i64,
}

/// 공유 secret(HS256)으로 서명된 JWT 검증기
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // 만료 시각은 그대로 적용 (기본 60초 여유 없음)
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Token 발급 (auth gateway 및 테스트용)
    pub fn issue(&self, claims: &TokenClaims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Option<Identity>> {
        let claims = match decode::<TokenClaims>(token.trim(), &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                return Ok(None);
            }
        };

        let Ok(user_id) = UserId::new(claims.sub) else {
            return Ok(None);
        };

        Ok(Some(Identity {
            user_id,
            email: claims.email.and_then(|email| Email::parse(&email).ok()),
        }))
    }
}
