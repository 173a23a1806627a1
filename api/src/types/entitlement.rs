//! Tier / unlock key / system config types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CardLimit, Email, Tier, UsageCap, UserId};

/// 사용자 프로필 (사용자당 1개, 최초 조회 시 생성)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: Option<Email>,
    pub tier: Tier,
    pub card_limit: CardLimit,
    /// 평생 단 하나의 key만 사용 가능
    pub unlock_key: Option<String>,
    pub whitelisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn has_unlimited_cards(&self) -> bool {
        self.tier == Tier::Unlimited || self.card_limit.is_unlimited()
    }
}

/// 프로모션 unlock key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockKey {
    pub key: String,
    pub tier: Tier,
    pub card_limit: CardLimit,
    pub max_uses: UsageCap,
    pub used_count: u32,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UnlockKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_exhausted(self.used_count)
    }
}

/// 전역 설정 (singleton)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub default_card_limit: CardLimit,
    pub email_whitelist: BTreeSet<Email>,
    pub admin_emails: BTreeSet<Email>,
    pub updated_at: DateTime<Utc>,
}

impl SystemConfig {
    pub fn is_whitelisted(&self, email: Option<&Email>) -> bool {
        email.is_some_and(|email| self.email_whitelist.contains(email))
    }
}
