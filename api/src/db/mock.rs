//! In-memory `Store` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::repository::{CardStore, ConfigStore, ProfileStore, Store, UnlockKeyStore};
use crate::types::{Card, Email, SystemConfig, UnlockKey, UserId, UserProfile};

#[derive(Default)]
pub struct MockStore {
    /// key: (user_id, card_id)
    cards: RwLock<HashMap<(UserId, String), Card>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    unlock_keys: RwLock<HashMap<String, UnlockKey>>,
    config: RwLock<Option<SystemConfig>>,
    /// true면 모든 호출이 실패 (인프라 장애 흉내)
    offline: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("store unreachable");
        }
        Ok(())
    }

    pub fn card_count(&self) -> usize {
        self.cards.read().unwrap().len()
    }
}

#[async_trait]
impl CardStore for MockStore {
    async fn find_cards(&self, user_id: &UserId) -> Result<Vec<Card>> {
        self.ensure_online()?;
        let cards = self.cards.read().unwrap();
        let mut owned: Vec<Card> = cards
            .iter()
            .filter(|((owner, _), _)| owner == user_id)
            .map(|(_, card)| card.clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_card(&self, id: &str, user_id: &UserId) -> Result<Option<Card>> {
        self.ensure_online()?;
        let cards = self.cards.read().unwrap();
        Ok(cards.get(&(user_id.clone(), id.to_string())).cloned())
    }

    async fn upsert_card(&self, card: &Card) -> Result<()> {
        self.ensure_online()?;
        let mut cards = self.cards.write().unwrap();
        cards.insert((card.user_id.clone(), card.id.clone()), card.clone());
        Ok(())
    }

    async fn delete_card(&self, id: &str, user_id: &UserId) -> Result<bool> {
        self.ensure_online()?;
        let mut cards = self.cards.write().unwrap();
        Ok(cards.remove(&(user_id.clone(), id.to_string())).is_some())
    }

    async fn count_limited_cards(&self, user_id: &UserId) -> Result<u64> {
        self.ensure_online()?;
        let cards = self.cards.read().unwrap();
        let count = cards
            .values()
            .filter(|card| &card.user_id == user_id && card.counts_toward_limit())
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl ProfileStore for MockStore {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        self.ensure_online()?;
        Ok(self.profiles.read().unwrap().get(user_id).cloned())
    }

    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<UserProfile> {
        self.ensure_online()?;
        let mut profiles = self.profiles.write().unwrap();
        Ok(profiles
            .entry(profile.user_id.clone())
            .or_insert_with(|| profile.clone())
            .clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.ensure_online()?;
        let mut profiles = self.profiles.write().unwrap();
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn find_profiles_by_email(&self, email: &Email) -> Result<Vec<UserProfile>> {
        self.ensure_online()?;
        let profiles = self.profiles.read().unwrap();
        Ok(profiles
            .values()
            .filter(|profile| profile.email.as_ref() == Some(email))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnlockKeyStore for MockStore {
    async fn find_unlock_key(&self, key: &str) -> Result<Option<UnlockKey>> {
        self.ensure_online()?;
        Ok(self.unlock_keys.read().unwrap().get(key).cloned())
    }

    async fn insert_unlock_key(&self, key: &UnlockKey) -> Result<bool> {
        self.ensure_online()?;
        let mut keys = self.unlock_keys.write().unwrap();
        if keys.contains_key(&key.key) {
            return Ok(false);
        }
        keys.insert(key.key.clone(), key.clone());
        Ok(true)
    }

    async fn increment_key_usage(&self, key: &str) -> Result<()> {
        self.ensure_online()?;
        if let Some(stored) = self.unlock_keys.write().unwrap().get_mut(key) {
            stored.used_count += 1;
        }
        Ok(())
    }

    async fn set_key_active(&self, key: &str, active: bool) -> Result<bool> {
        self.ensure_online()?;
        match self.unlock_keys.write().unwrap().get_mut(key) {
            Some(stored) => {
                stored.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_unlock_keys(&self) -> Result<Vec<UnlockKey>> {
        self.ensure_online()?;
        let mut keys: Vec<UnlockKey> = self.unlock_keys.read().unwrap().values().cloned().collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }
}

#[async_trait]
impl ConfigStore for MockStore {
    async fn load_config(&self) -> Result<Option<SystemConfig>> {
        self.ensure_online()?;
        Ok(self.config.read().unwrap().clone())
    }

    async fn save_config(&self, config: &SystemConfig) -> Result<()> {
        self.ensure_online()?;
        *self.config.write().unwrap() = Some(config.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MockStore {
    async fn health_check(&self) -> Result<()> {
        self.ensure_online()
    }
}
