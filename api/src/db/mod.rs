//! Database Module
//!
//! PostgreSQL persistence via SQLx.
//!
//! # Tables
//!
//! ```text
//! cards          (user_id, id) PK, price_history JSONB
//! user_profiles  user_id PK
//! unlock_keys    key PK
//! system_config  singleton row (id = 1)
//! ```
//!
//! `Database` is the only store handle in the process. It is built once at
//! startup and shared through `Arc<dyn Store>`; the pool reconnects on its own
//! between calls, so nothing here retries.

mod models;
mod repository;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::MockStore;

pub use models::*;
pub use repository::{CardStore, ConfigStore, ProfileStore, SharedStore, Store, UnlockKeyStore};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::types::{Card, Email, SystemConfig, UnlockKey, UserId, UserProfile};

const CARD_COLUMNS: &str = r#"
    user_id, id, sport, player, year, brand, series, insert_name, parallel, serial_number,
    purchase_price, currency, current_value, price_history, acquisition_source,
    graded, grade_company, grade_value, auto_grade, cert_number,
    sold, sold_price, sold_date, sold_via, watchlist, never_trade,
    notes, image_url, created_at, updated_at
"#;

const PROFILE_COLUMNS: &str =
    "user_id, email, tier, card_limit, unlock_key, whitelisted, created_at, updated_at";

const UNLOCK_KEY_COLUMNS: &str =
    "key, tier, card_limit, max_uses, used_count, active, expires_at, created_at";

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 설정값 (기본 10)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = Self::pool_options(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 첫 쿼리 시점에 연결하는 pool (이후 커넥션 재사용)
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = Self::pool_options(max_connections).connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    fn pool_options(max_connections: u32) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CardStore for Database {
    async fn find_cards(&self, user_id: &UserId) -> Result<Vec<Card>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Card::try_from).collect()
    }

    async fn find_card(&self, id: &str, user_id: &UserId) -> Result<Option<Card>> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Card::try_from).transpose()
    }

    async fn upsert_card(&self, card: &Card) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO cards ({CARD_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                    $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)
            ON CONFLICT (user_id, id)
            DO UPDATE SET
                sport = EXCLUDED.sport,
                player = EXCLUDED.player,
                year = EXCLUDED.year,
                brand = EXCLUDED.brand,
                series = EXCLUDED.series,
                insert_name = EXCLUDED.insert_name,
                parallel = EXCLUDED.parallel,
                serial_number = EXCLUDED.serial_number,
                purchase_price = EXCLUDED.purchase_price,
                currency = EXCLUDED.currency,
                current_value = EXCLUDED.current_value,
                price_history = EXCLUDED.price_history,
                acquisition_source = EXCLUDED.acquisition_source,
                graded = EXCLUDED.graded,
                grade_company = EXCLUDED.grade_company,
                grade_value = EXCLUDED.grade_value,
                auto_grade = EXCLUDED.auto_grade,
                cert_number = EXCLUDED.cert_number,
                sold = EXCLUDED.sold,
                sold_price = EXCLUDED.sold_price,
                sold_date = EXCLUDED.sold_date,
                sold_via = EXCLUDED.sold_via,
                watchlist = EXCLUDED.watchlist,
                never_trade = EXCLUDED.never_trade,
                notes = EXCLUDED.notes,
                image_url = EXCLUDED.image_url,
                updated_at = EXCLUDED.updated_at
            "#
        ))
        .bind(card.user_id.as_str())
        .bind(&card.id)
        .bind(&card.sport)
        .bind(&card.player)
        .bind(&card.year)
        .bind(&card.brand)
        .bind(&card.series)
        .bind(&card.insert)
        .bind(&card.parallel)
        .bind(&card.serial_number)
        .bind(card.purchase_price)
        .bind(&card.currency)
        .bind(card.current_value)
        .bind(Json(&card.price_history))
        .bind(card.acquisition_source.as_str())
        .bind(card.graded)
        .bind(&card.grade_company)
        .bind(&card.grade_value)
        .bind(&card.auto_grade)
        .bind(&card.cert_number)
        .bind(card.sold)
        .bind(card.sold_price)
        .bind(card.sold_date)
        .bind(card.sold_via.map(|via| via.as_str()))
        .bind(card.watchlist)
        .bind(card.never_trade)
        .bind(&card.notes)
        .bind(&card.image_url)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_card(&self, id: &str, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_limited_cards(&self, user_id: &UserId) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM cards WHERE user_id = $1 AND NOT watchlist")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(u64::try_from(count.0)?)
    }
}

#[async_trait]
impl ProfileStore for Database {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<UserProfile> {
        sqlx::query(&format!(
            r#"
            INSERT INTO user_profiles ({PROFILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO NOTHING
            "#
        ))
        .bind(profile.user_id.as_str())
        .bind(profile.email.as_ref().map(Email::as_str))
        .bind(profile.tier.as_str())
        .bind(limit_column(profile.card_limit)?)
        .bind(&profile.unlock_key)
        .bind(profile.whitelisted)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        // 동시 생성 시 먼저 들어간 행이 기준
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(profile.user_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        UserProfile::try_from(row)
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO user_profiles ({PROFILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id)
            DO UPDATE SET
                email = EXCLUDED.email,
                tier = EXCLUDED.tier,
                card_limit = EXCLUDED.card_limit,
                unlock_key = EXCLUDED.unlock_key,
                whitelisted = EXCLUDED.whitelisted,
                updated_at = EXCLUDED.updated_at
            "#
        ))
        .bind(profile.user_id.as_str())
        .bind(profile.email.as_ref().map(Email::as_str))
        .bind(profile.tier.as_str())
        .bind(limit_column(profile.card_limit)?)
        .bind(&profile.unlock_key)
        .bind(profile.whitelisted)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_profiles_by_email(&self, email: &Email) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE LOWER(email) = $1"
        ))
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }
}

#[async_trait]
impl UnlockKeyStore for Database {
    async fn find_unlock_key(&self, key: &str) -> Result<Option<UnlockKey>> {
        let row = sqlx::query_as::<_, UnlockKeyRow>(&format!(
            "SELECT {UNLOCK_KEY_COLUMNS} FROM unlock_keys WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UnlockKey::try_from).transpose()
    }

    async fn insert_unlock_key(&self, key: &UnlockKey) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO unlock_keys ({UNLOCK_KEY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO NOTHING
            "#
        ))
        .bind(&key.key)
        .bind(key.tier.as_str())
        .bind(limit_column(key.card_limit)?)
        .bind(limit_column(key.max_uses)?)
        .bind(i32::try_from(key.used_count)?)
        .bind(key.active)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_key_usage(&self, key: &str) -> Result<()> {
        sqlx::query("UPDATE unlock_keys SET used_count = used_count + 1 WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_key_active(&self, key: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE unlock_keys SET active = $2 WHERE key = $1")
            .bind(key)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_unlock_keys(&self) -> Result<Vec<UnlockKey>> {
        let rows = sqlx::query_as::<_, UnlockKeyRow>(&format!(
            "SELECT {UNLOCK_KEY_COLUMNS} FROM unlock_keys ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UnlockKey::try_from).collect()
    }
}

#[async_trait]
impl ConfigStore for Database {
    async fn load_config(&self) -> Result<Option<SystemConfig>> {
        let row = sqlx::query_as::<_, SystemConfigRow>(
            r#"
            SELECT default_card_limit, email_whitelist, admin_emails, updated_at
            FROM system_config
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SystemConfig::try_from).transpose()
    }

    async fn save_config(&self, config: &SystemConfig) -> Result<()> {
        let whitelist: Vec<String> = config.email_whitelist.iter().map(|e| e.to_string()).collect();
        let admins: Vec<String> = config.admin_emails.iter().map(|e| e.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO system_config (id, default_card_limit, email_whitelist, admin_emails, updated_at)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id)
            DO UPDATE SET
                default_card_limit = EXCLUDED.default_card_limit,
                email_whitelist = EXCLUDED.email_whitelist,
                admin_emails = EXCLUDED.admin_emails,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(limit_column(config.default_card_limit)?)
        .bind(whitelist)
        .bind(admins)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for Database {
    /// Health check
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
