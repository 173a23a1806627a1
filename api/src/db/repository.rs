//! Repository Pattern Implementation
//!
//! Services never talk to `sqlx` directly. They hold an `Arc<dyn Store>` and go
//! through the traits below, which `Database` implements for PostgreSQL and
//! `mock::MockStore` implements in memory for tests.
//!
//! Every card query is scoped by `(id, user_id)`; there is no method that
//! reads or writes a card by id alone.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Card, Email, SystemConfig, UnlockKey, UserId, UserProfile};

/// Card Repository 저장소
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_cards(&self, user_id: &UserId) -> Result<Vec<Card>>;
    async fn find_card(&self, id: &str, user_id: &UserId) -> Result<Option<Card>>;
    /// `(id, user_id)` 기준 upsert
    async fn upsert_card(&self, card: &Card) -> Result<()>;
    /// 삭제되었으면 `true`. 없는 카드는 `false` (에러 아님)
    async fn delete_card(&self, id: &str, user_id: &UserId) -> Result<bool>;
    /// 한도에 포함되는 (watchlist가 아닌) 카드 수
    async fn count_limited_cards(&self, user_id: &UserId) -> Result<u64>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>>;
    /// 이미 있으면 삽입하지 않고 저장된 프로필을 반환
    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<UserProfile>;
    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;
    async fn find_profiles_by_email(&self, email: &Email) -> Result<Vec<UserProfile>>;
}

#[async_trait]
pub trait UnlockKeyStore: Send + Sync {
    async fn find_unlock_key(&self, key: &str) -> Result<Option<UnlockKey>>;
    /// key 충돌 시 `false`
    async fn insert_unlock_key(&self, key: &UnlockKey) -> Result<bool>;
    /// `used_count += 1` (단일 UPDATE)
    async fn increment_key_usage(&self, key: &str) -> Result<()>;
    async fn set_key_active(&self, key: &str, active: bool) -> Result<bool>;
    async fn list_unlock_keys(&self) -> Result<Vec<UnlockKey>>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 저장된 설정이 없으면 `None`
    async fn load_config(&self) -> Result<Option<SystemConfig>>;
    async fn save_config(&self, config: &SystemConfig) -> Result<()>;
}

/// 모든 저장소 trait을 묶은 store handle
#[async_trait]
pub trait Store: CardStore + ProfileStore + UnlockKeyStore + ConfigStore {
    async fn health_check(&self) -> Result<()>;
}

pub type SharedStore = Arc<dyn Store>;
