//! Admin Config Store
//!
//! Global defaults consulted by the entitlement resolver: the default card
//! limit for new free profiles, the email whitelist, and the admin list.
//! Stored as a single row, read-modified-written without version checks.
//!
//! Whitelist edits cascade to existing profiles:
//!
//! ```text
//! add    → profile with that email becomes unlimited / -1 immediately
//! remove → profile falls back to free / default limit,
//!          unless it ever redeemed an unlock key
//! ```

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::db::SharedStore;
use crate::types::{CardLimit, Email, SystemConfig, Tier};

/// 저장된 설정이 없을 때 쓰는 초기값 (환경변수)
#[derive(Debug, Clone)]
pub struct ConfigDefaults {
    pub default_card_limit: CardLimit,
    /// `ADMIN_EMAILS` - 저장된 admin 목록과 무관하게 항상 관리자
    pub admin_emails: Vec<Email>,
}

/// Whitelist 변경 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistUpdate {
    pub config: SystemConfig,
    /// 승격/강등 처리된 프로필 수
    pub affected_profiles: usize,
}

pub struct AdminService {
    store: SharedStore,
    defaults: ConfigDefaults,
}

impl AdminService {
    pub fn new(store: SharedStore, defaults: ConfigDefaults) -> Self {
        Self { store, defaults }
    }

    /// 현재 설정 (없으면 초기값)
    pub async fn current_config(&self) -> Result<SystemConfig> {
        Ok(self
            .store
            .load_config()
            .await?
            .unwrap_or_else(|| self.seed_config()))
    }

    fn seed_config(&self) -> SystemConfig {
        SystemConfig {
            default_card_limit: self.defaults.default_card_limit,
            email_whitelist: BTreeSet::new(),
            admin_emails: self.defaults.admin_emails.iter().cloned().collect(),
            updated_at: Utc::now(),
        }
    }

    async fn save(&self, mut config: SystemConfig) -> Result<SystemConfig> {
        config.updated_at = Utc::now();
        self.store.save_config(&config).await?;
        Ok(config)
    }

    pub async fn is_admin(&self, email: Option<&Email>) -> Result<bool> {
        let Some(email) = email else {
            return Ok(false);
        };
        if self.defaults.admin_emails.contains(email) {
            return Ok(true);
        }
        Ok(self.current_config().await?.admin_emails.contains(email))
    }

    /// 이후 생성되는 free 프로필에만 적용 (기존 프로필은 생성 시점 값 유지)
    pub async fn set_default_card_limit(&self, limit: CardLimit) -> Result<SystemConfig> {
        let mut config = self.current_config().await?;
        config.default_card_limit = limit;
        let config = self.save(config).await?;

        tracing::info!(default_card_limit = i64::from(limit), "default card limit updated");
        Ok(config)
    }

    pub async fn add_to_whitelist(&self, email: Email) -> Result<WhitelistUpdate> {
        let mut config = self.current_config().await?;
        config.email_whitelist.insert(email.clone());
        let config = self.save(config).await?;

        let mut affected_profiles = 0;
        for mut profile in self.store.find_profiles_by_email(&email).await? {
            profile.tier = Tier::Unlimited;
            profile.card_limit = CardLimit::Unlimited;
            profile.whitelisted = true;
            profile.updated_at = Utc::now();
            self.store.save_profile(&profile).await?;
            affected_profiles += 1;
        }

        tracing::info!(%email, affected_profiles, "email added to whitelist");
        Ok(WhitelistUpdate { config, affected_profiles })
    }

    pub async fn remove_from_whitelist(&self, email: Email) -> Result<WhitelistUpdate> {
        let mut config = self.current_config().await?;
        config.email_whitelist.remove(&email);
        let config = self.save(config).await?;

        let mut affected_profiles = 0;
        for mut profile in self.store.find_profiles_by_email(&email).await? {
            profile.whitelisted = false;
            // unlock key로 받은 등급은 whitelist 제거보다 우선
            if profile.unlock_key.is_none() {
                profile.tier = Tier::Free;
                profile.card_limit = config.default_card_limit;
                affected_profiles += 1;
            }
            profile.updated_at = Utc::now();
            self.store.save_profile(&profile).await?;
        }

        tracing::info!(%email, affected_profiles, "email removed from whitelist");
        Ok(WhitelistUpdate { config, affected_profiles })
    }

    pub async fn add_admin(&self, email: Email) -> Result<SystemConfig> {
        let mut config = self.current_config().await?;
        config.admin_emails.insert(email.clone());
        let config = self.save(config).await?;

        tracing::info!(%email, "admin added");
        Ok(config)
    }

    /// `ADMIN_EMAILS`에 있는 관리자는 제거해도 권한 유지
    pub async fn remove_admin(&self, email: Email) -> Result<SystemConfig> {
        let mut config = self.current_config().await?;
        config.admin_emails.remove(&email);
        let config = self.save(config).await?;

        tracing::info!(%email, "admin removed");
        Ok(config)
    }
}
