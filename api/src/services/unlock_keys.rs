//! Unlock-Key Ledger
//!
//! Promotional keys that grant a tier / card limit. A profile redeems at most
//! one distinct key over its lifetime; redeeming the same key again is a no-op
//! that re-applies the grant without consuming another use.
//!
//! # Redeem Checks (in order)
//!
//! ```text
//! 1. key exists        → NotFound
//! 2. key active        → Inactive
//! 3. not expired       → Expired
//! 4. uses remaining    → Exhausted   (skipped when the profile already holds it)
//! 5. no other key used → DifferentKeyAlreadyUsed
//! ```
//!
//! The usage counter is bumped with a single UPDATE after the profile is
//! saved, so two users racing for the last slot can both get in.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db::SharedStore;
use crate::services::TierService;
use crate::types::{CardLimit, Identity, Tier, UnlockKey, UsageCap, UserProfile};

const KEY_PREFIX: &str = "PRISM";
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const KEY_GROUPS: usize = 3;
const KEY_GROUP_LEN: usize = 4;

/// 충돌 시 재생성 횟수 상한
const MAX_GENERATE_ATTEMPTS: usize = 5;

// ============ Outcomes ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemRejection {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
    DifferentKeyAlreadyUsed,
}

impl RedeemRejection {
    pub fn message(&self) -> &'static str {
        match self {
            RedeemRejection::NotFound => "Invalid unlock key",
            RedeemRejection::Inactive => "This unlock key has been deactivated",
            RedeemRejection::Expired => "This unlock key has expired",
            RedeemRejection::Exhausted => "This unlock key has reached its maximum uses",
            RedeemRejection::DifferentKeyAlreadyUsed => "You have already used a different unlock key",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    Redeemed(UserProfile),
    Rejected(RedeemRejection),
}

/// 관리자 key 생성 요청
#[derive(Debug, Clone)]
pub struct NewUnlockKey {
    pub tier: Tier,
    pub card_limit: CardLimit,
    pub max_uses: UsageCap,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `PRISM-XXXX-XXXX-XXXX` (base36 대문자)
pub fn generate_key_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::from(KEY_PREFIX);
    for _ in 0..KEY_GROUPS {
        code.push('-');
        for _ in 0..KEY_GROUP_LEN {
            let index = rng.gen_range(0..KEY_ALPHABET.len());
            code.push(char::from(KEY_ALPHABET[index]));
        }
    }
    code
}

/// 입력 key 정규화 (대소문자 무시)
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ============ Ledger ============

pub struct UnlockKeyLedger {
    store: SharedStore,
    tiers: Arc<TierService>,
}

impl UnlockKeyLedger {
    pub fn new(store: SharedStore, tiers: Arc<TierService>) -> Self {
        Self { store, tiers }
    }

    pub async fn redeem(&self, identity: &Identity, raw_key: &str) -> Result<RedeemOutcome> {
        let code = normalize_key(raw_key);

        let Some(key) = self.store.find_unlock_key(&code).await? else {
            return Ok(self.reject(identity, RedeemRejection::NotFound));
        };
        if !key.active {
            return Ok(self.reject(identity, RedeemRejection::Inactive));
        }
        if key.is_expired(Utc::now()) {
            return Ok(self.reject(identity, RedeemRejection::Expired));
        }

        let mut profile = self.tiers.get_user_profile(identity).await?;
        let already_holds = profile.unlock_key.as_deref() == Some(key.key.as_str());

        if !already_holds && key.is_exhausted() {
            return Ok(self.reject(identity, RedeemRejection::Exhausted));
        }
        if profile.unlock_key.is_some() && !already_holds {
            return Ok(self.reject(identity, RedeemRejection::DifferentKeyAlreadyUsed));
        }

        profile.tier = key.tier;
        profile.card_limit = key.card_limit;
        profile.unlock_key = Some(key.key.clone());
        profile.updated_at = Utc::now();
        self.store.save_profile(&profile).await?;

        if !already_holds {
            self.store.increment_key_usage(&key.key).await?;
        }

        tracing::info!(
            user_id = %identity.user_id,
            key = %key.key,
            tier = %key.tier,
            repeat = already_holds,
            "unlock key redeemed"
        );

        Ok(RedeemOutcome::Redeemed(profile))
    }

    fn reject(&self, identity: &Identity, reason: RedeemRejection) -> RedeemOutcome {
        tracing::warn!(user_id = %identity.user_id, ?reason, "unlock key rejected");
        RedeemOutcome::Rejected(reason)
    }

    pub async fn create_key(&self, request: NewUnlockKey) -> Result<UnlockKey> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let key = UnlockKey {
                key: generate_key_code(&mut rand::thread_rng()),
                tier: request.tier,
                card_limit: request.card_limit,
                max_uses: request.max_uses,
                used_count: 0,
                active: true,
                expires_at: request.expires_at,
                created_at: Utc::now(),
            };

            if self.store.insert_unlock_key(&key).await? {
                tracing::info!(key = %key.key, tier = %key.tier, "unlock key created");
                return Ok(key);
            }

            tracing::warn!(key = %key.key, "unlock key collision, regenerating");
        }

        bail!("could not generate a unique unlock key after {MAX_GENERATE_ATTEMPTS} attempts")
    }

    /// Soft delete. 이미 사용한 프로필의 등급은 유지됨
    ///
    /// 없는 key면 `false`
    pub async fn deactivate(&self, raw_key: &str) -> Result<bool> {
        let code = normalize_key(raw_key);
        let found = self.store.set_key_active(&code, false).await?;
        if found {
            tracing::info!(key = %code, "unlock key deactivated");
        }
        Ok(found)
    }

    pub async fn list_keys(&self) -> Result<Vec<UnlockKey>> {
        self.store.list_unlock_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CardStore, UnlockKeyStore};
    use crate::test_support::{identity, sample_card, TestApp};
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unlimited_key(max_uses: UsageCap) -> NewUnlockKey {
        NewUnlockKey {
            tier: Tier::Unlimited,
            card_limit: CardLimit::Unlimited,
            max_uses,
            expires_at: None,
        }
    }

    fn expect_rejection(outcome: RedeemOutcome) -> RedeemRejection {
        match outcome {
            RedeemOutcome::Rejected(reason) => reason,
            RedeemOutcome::Redeemed(profile) => panic!("unexpected redemption: {profile:?}"),
        }
    }

    #[test]
    fn test_key_code_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let code = generate_key_code(&mut rng);

        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0], "PRISM");
        for group in &groups[1..] {
            assert_eq!(group.len(), 4);
            assert!(group.bytes().all(|b| KEY_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_redeem_grants_tier_and_counts_once() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");
        let key = app.ledger.create_key(unlimited_key(UsageCap::Max(5))).await.unwrap();

        let outcome = app.ledger.redeem(&user, &key.key.to_lowercase()).await.unwrap();
        let RedeemOutcome::Redeemed(profile) = outcome else {
            panic!("expected redemption");
        };
        assert_eq!(profile.tier, Tier::Unlimited);
        assert_eq!(profile.unlock_key.as_deref(), Some(key.key.as_str()));

        // 같은 key 재사용은 카운트 증가 없이 성공
        let again = app.ledger.redeem(&user, &key.key).await.unwrap();
        assert!(matches!(again, RedeemOutcome::Redeemed(_)));

        let stored = app.store.find_unlock_key(&key.key).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn test_second_distinct_key_rejected() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");
        let first = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();
        let second = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();

        app.ledger.redeem(&user, &first.key).await.unwrap();
        let outcome = app.ledger.redeem(&user, &second.key).await.unwrap();

        let rejection = expect_rejection(outcome);
        assert_eq!(rejection, RedeemRejection::DifferentKeyAlreadyUsed);
        assert!(rejection.message().contains("already used a different unlock key"));
        let stored = app.store.find_unlock_key(&second.key).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 0);
    }

    #[tokio::test]
    async fn test_rejections_in_order() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");

        let outcome = app.ledger.redeem(&user, "PRISM-NOPE-NOPE-NOPE").await.unwrap();
        assert_eq!(expect_rejection(outcome), RedeemRejection::NotFound);

        let inactive = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();
        assert!(app.ledger.deactivate(&inactive.key).await.unwrap());
        let outcome = app.ledger.redeem(&user, &inactive.key).await.unwrap();
        assert_eq!(expect_rejection(outcome), RedeemRejection::Inactive);

        let mut expired = unlimited_key(UsageCap::Unlimited);
        expired.expires_at = Some(Utc::now() - Duration::days(1));
        let expired = app.ledger.create_key(expired).await.unwrap();
        let outcome = app.ledger.redeem(&user, &expired.key).await.unwrap();
        assert_eq!(expect_rejection(outcome), RedeemRejection::Expired);

        let single = app.ledger.create_key(unlimited_key(UsageCap::Max(1))).await.unwrap();
        app.ledger.redeem(&identity("u2", "u2@example.com"), &single.key).await.unwrap();
        let outcome = app.ledger.redeem(&user, &single.key).await.unwrap();
        assert_eq!(expect_rejection(outcome), RedeemRejection::Exhausted);
    }

    #[tokio::test]
    async fn test_holder_can_reredeem_exhausted_key() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");
        let key = app.ledger.create_key(unlimited_key(UsageCap::Max(1))).await.unwrap();

        app.ledger.redeem(&user, &key.key).await.unwrap();
        let again = app.ledger.redeem(&user, &key.key).await.unwrap();

        assert!(matches!(again, RedeemOutcome::Redeemed(_)));
    }

    #[tokio::test]
    async fn test_deactivate_keeps_existing_grant() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");
        let key = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();
        app.ledger.redeem(&user, &key.key).await.unwrap();

        app.ledger.deactivate(&key.key).await.unwrap();

        let profile = app.tiers.get_user_profile(&user).await.unwrap();
        assert_eq!(profile.tier, Tier::Unlimited);
        assert!(!app.ledger.deactivate("PRISM-0000-0000-0000").await.unwrap());
    }

    #[tokio::test]
    async fn test_limit_reached_then_unlocked() {
        let app = TestApp::new();
        let user = identity("u1", "u1@example.com");
        for n in 0..30 {
            app.store.upsert_card(&sample_card(&format!("c{n}"), "u1")).await.unwrap();
        }

        let denied = app.tiers.can_add_card(&user).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.limit, CardLimit::Limited(30));
        assert_eq!(denied.current, 30);

        let key = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();
        app.ledger.redeem(&user, &key.key).await.unwrap();

        let allowed = app.tiers.can_add_card(&user).await.unwrap();
        assert!(allowed.allowed);
        assert_eq!(allowed.limit, CardLimit::Unlimited);
        assert_eq!(allowed.current, 0);
        assert_eq!(
            serde_json::to_value(&allowed).unwrap(),
            serde_json::json!({ "allowed": true, "limit": -1, "current": 0 })
        );
    }

    #[tokio::test]
    async fn test_list_keys_newest_first() {
        let app = TestApp::new();
        let older = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = app.ledger.create_key(unlimited_key(UsageCap::Unlimited)).await.unwrap();

        let keys = app.ledger.list_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key, newer.key);
        assert_eq!(keys[1].key, older.key);
    }
}
