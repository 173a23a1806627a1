//! Entitlement Resolver
//!
//! Answers "may this user add one more card?" and owns the profile lifecycle.
//!
//! # Effective Limit
//!
//! ```text
//! profile missing      → create: whitelisted ? unlimited/-1 : free/default limit
//! tier == unlimited    → allowed
//! card_limit == -1     → allowed
//! otherwise            → count(non-watchlist cards) < card_limit
//! ```
//!
//! The check is advisory. Nothing ties it to the insert that follows, so two
//! concurrent adds can both pass and overshoot the limit by one.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::db::SharedStore;
use crate::services::AdminService;
use crate::types::{CardLimit, Identity, Tier, UserProfile};

/// `GET /tier/can-add-card` 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAllowance {
    pub allowed: bool,
    pub limit: CardLimit,
    /// 한도에 포함되는 카드 수 (무제한이면 집계하지 않음 → 0)
    pub current: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct TierService {
    store: SharedStore,
    admin: Arc<AdminService>,
}

impl TierService {
    pub fn new(store: SharedStore, admin: Arc<AdminService>) -> Self {
        Self { store, admin }
    }

    /// 프로필 조회, 없으면 생성
    ///
    /// 기본 한도는 생성 시점의 값으로 고정됨
    pub async fn get_user_profile(&self, identity: &Identity) -> Result<UserProfile> {
        if let Some(profile) = self.store.find_profile(&identity.user_id).await? {
            return Ok(profile);
        }

        let config = self.admin.current_config().await?;
        let whitelisted = config.is_whitelisted(identity.email.as_ref());
        let (tier, card_limit) = if whitelisted {
            (Tier::Unlimited, CardLimit::Unlimited)
        } else {
            (Tier::Free, config.default_card_limit)
        };

        let now = Utc::now();
        let profile = UserProfile {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            tier,
            card_limit,
            unlock_key: None,
            whitelisted,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_profile_if_absent(&profile).await?;
        tracing::info!(
            user_id = %stored.user_id,
            tier = %stored.tier,
            card_limit = i64::from(stored.card_limit),
            "user profile created"
        );

        Ok(stored)
    }

    pub async fn can_add_card(&self, identity: &Identity) -> Result<CardAllowance> {
        let profile = self.get_user_profile(identity).await?;

        if profile.has_unlimited_cards() {
            return Ok(CardAllowance {
                allowed: true,
                limit: profile.card_limit,
                current: 0,
                message: None,
            });
        }

        let current = self.store.count_limited_cards(&identity.user_id).await?;
        let allowed = profile.card_limit.admits(current);

        let message = (!allowed).then(|| {
            format!(
                "You've reached your limit of {} cards. Redeem an unlock key or upgrade to add more.",
                i64::from(profile.card_limit)
            )
        });

        if !allowed {
            tracing::warn!(user_id = %identity.user_id, current, "card limit reached");
        }

        Ok(CardAllowance {
            allowed,
            limit: profile.card_limit,
            current,
            message,
        })
    }

    /// 저장 후 재확인: 한도를 넘은 카드 수 (동시 저장 경합으로만 발생)
    pub async fn limit_overshoot(&self, identity: &Identity) -> Result<Option<u64>> {
        let profile = self.get_user_profile(identity).await?;
        let CardLimit::Limited(max) = profile.card_limit else {
            return Ok(None);
        };

        let current = self.store.count_limited_cards(&identity.user_id).await?;
        Ok(current.checked_sub(u64::from(max)).filter(|over| *over > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CardStore;
    use crate::test_support::{identity, sample_card, TestApp};
    use crate::types::Email;

    #[tokio::test]
    async fn test_profile_created_lazily_as_free() {
        let app = TestApp::new();
        let user = identity("u1", "new@example.com");

        let profile = app.tiers.get_user_profile(&user).await.unwrap();

        assert_eq!(profile.tier, Tier::Free);
        assert_eq!(profile.card_limit, CardLimit::Limited(30));
        assert!(!profile.whitelisted);
        assert!(profile.unlock_key.is_none());
    }

    #[tokio::test]
    async fn test_whitelisted_email_gets_unlimited_case_insensitive() {
        let app = TestApp::new();
        app.admin
            .add_to_whitelist(Email::parse("friend@example.com").unwrap())
            .await
            .unwrap();

        let user = identity("u1", "Friend@Example.COM");
        let profile = app.tiers.get_user_profile(&user).await.unwrap();

        assert_eq!(profile.tier, Tier::Unlimited);
        assert_eq!(profile.card_limit, CardLimit::Unlimited);
        assert!(profile.whitelisted);
    }

    #[tokio::test]
    async fn test_existing_profile_is_returned_unchanged() {
        let app = TestApp::new();
        let user = identity("u1", "new@example.com");

        let first = app.tiers.get_user_profile(&user).await.unwrap();
        let second = app.tiers.get_user_profile(&user).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_watchlist_cards_do_not_count() {
        let app = TestApp::new();
        let user = identity("u1", "new@example.com");
        app.admin.set_default_card_limit(CardLimit::Limited(2)).await.unwrap();

        for id in ["a", "b"] {
            app.store.upsert_card(&sample_card(id, "u1")).await.unwrap();
        }
        let mut watched = sample_card("w", "u1");
        watched.watchlist = true;
        app.store.upsert_card(&watched).await.unwrap();

        let allowance = app.tiers.can_add_card(&user).await.unwrap();
        assert!(!allowance.allowed);
        assert_eq!(allowance.current, 2);
        assert_eq!(allowance.limit, CardLimit::Limited(2));
        assert!(allowance.message.unwrap().contains("limit of 2 cards"));
    }

    #[tokio::test]
    async fn test_limit_overshoot_after_concurrent_saves() {
        let app = TestApp::new();
        let user = identity("u1", "new@example.com");
        app.admin.set_default_card_limit(CardLimit::Limited(1)).await.unwrap();

        app.store.upsert_card(&sample_card("a", "u1")).await.unwrap();
        assert_eq!(app.tiers.limit_overshoot(&user).await.unwrap(), None);

        // 두 요청이 모두 한도 확인을 통과한 뒤 저장된 상태
        app.store.upsert_card(&sample_card("b", "u1")).await.unwrap();
        assert_eq!(app.tiers.limit_overshoot(&user).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_unlimited_profile_never_overshoots() {
        let app = TestApp::new();
        app.admin
            .add_to_whitelist(Email::parse("vip@example.com").unwrap())
            .await
            .unwrap();
        let user = identity("u1", "vip@example.com");

        for id in ["a", "b", "c"] {
            app.store.upsert_card(&sample_card(id, "u1")).await.unwrap();
        }
        assert_eq!(app.tiers.limit_overshoot(&user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_under_limit_is_allowed() {
        let app = TestApp::new();
        let user = identity("u1", "new@example.com");
        app.store.upsert_card(&sample_card("a", "u1")).await.unwrap();
        // 다른 사용자의 카드는 집계하지 않음
        app.store.upsert_card(&sample_card("b", "u2")).await.unwrap();

        let allowance = app.tiers.can_add_card(&user).await.unwrap();
        assert!(allowance.allowed);
        assert_eq!(allowance.current, 1);
        assert!(allowance.message.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let app = TestApp::new();
        app.store.set_offline(true);

        let result = app.tiers.can_add_card(&identity("u1", "new@example.com")).await;
        assert!(result.is_err());
    }
}
