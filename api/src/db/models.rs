//! Database Models
//!
//! Row types as stored in PostgreSQL, and their conversion into the domain
//! types in `crate::types`. Enum-like columns are plain TEXT/INTEGER; a row with
//! an unknown value fails conversion instead of being silently coerced.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;

use crate::types::{
    AcquisitionSource, Card, CardLimit, Email, PriceObservation, SoldVia, SystemConfig, UnlockKey,
    UsageCap, UserId, UserProfile,
};

/// cards 테이블 한 행
#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    pub user_id: String,
    pub id: String,
    pub sport: String,
    pub player: String,
    pub year: String,
    pub brand: String,
    pub series: String,
    /// `insert`는 SQL 예약어라 컬럼명 변경
    pub insert_name: String,
    pub parallel: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_price: Decimal,
    pub currency: String,
    pub current_value: Decimal,
    /// JSONB, date 오름차순 배열
    pub price_history: Json<Vec<PriceObservation>>,
    pub acquisition_source: String,
    pub graded: bool,
    pub grade_company: Option<String>,
    pub grade_value: Option<String>,
    pub auto_grade: Option<String>,
    pub cert_number: Option<String>,
    pub sold: bool,
    pub sold_price: Option<Decimal>,
    pub sold_date: Option<DateTime<Utc>>,
    pub sold_via: Option<String>,
    pub watchlist: bool,
    pub never_trade: bool,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CardRow> for Card {
    type Error = anyhow::Error;

    fn try_from(row: CardRow) -> Result<Self> {
        let acquisition_source = AcquisitionSource::parse(&row.acquisition_source)
            .ok_or_else(|| anyhow!("unknown acquisition source '{}'", row.acquisition_source))?;
        let sold_via = row
            .sold_via
            .as_deref()
            .map(|via| SoldVia::parse(via).ok_or_else(|| anyhow!("unknown sold_via '{via}'")))
            .transpose()?;

        Ok(Card {
            id: row.id,
            user_id: UserId::new(row.user_id).context("card row without owner")?,
            sport: row.sport,
            player: row.player,
            year: row.year,
            brand: row.brand,
            series: row.series,
            insert: row.insert_name,
            parallel: row.parallel,
            serial_number: row.serial_number,
            purchase_price: row.purchase_price,
            currency: row.currency,
            current_value: row.current_value,
            price_history: row.price_history.0,
            acquisition_source,
            graded: row.graded,
            grade_company: row.grade_company,
            grade_value: row.grade_value,
            auto_grade: row.auto_grade,
            cert_number: row.cert_number,
            sold: row.sold,
            sold_price: row.sold_price,
            sold_date: row.sold_date,
            sold_via,
            watchlist: row.watchlist,
            never_trade: row.never_trade,
            notes: row.notes,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// user_profiles 테이블 한 행
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub user_id: String,
    pub email: Option<String>,
    pub tier: String,
    /// -1 = 무제한
    pub card_limit: i32,
    pub unlock_key: Option<String>,
    pub whitelisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = anyhow::Error;

    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(UserProfile {
            user_id: UserId::new(row.user_id)?,
            // 형식이 깨진 과거 이메일은 없는 것으로 취급
            email: row.email.and_then(|email| Email::parse(&email).ok()),
            tier: row.tier.parse()?,
            card_limit: CardLimit::try_from(i64::from(row.card_limit))?,
            unlock_key: row.unlock_key,
            whitelisted: row.whitelisted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// unlock_keys 테이블 한 행
#[derive(Debug, Clone, FromRow)]
pub struct UnlockKeyRow {
    pub key: String,
    pub tier: String,
    pub card_limit: i32,
    pub max_uses: i32,
    pub used_count: i32,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UnlockKeyRow> for UnlockKey {
    type Error = anyhow::Error;

    fn try_from(row: UnlockKeyRow) -> Result<Self> {
        Ok(UnlockKey {
            key: row.key,
            tier: row.tier.parse()?,
            card_limit: CardLimit::try_from(i64::from(row.card_limit))?,
            max_uses: UsageCap::try_from(i64::from(row.max_uses))?,
            used_count: u32::try_from(row.used_count).context("negative used_count")?,
            active: row.active,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// system_config 싱글톤 행
#[derive(Debug, Clone, FromRow)]
pub struct SystemConfigRow {
    pub default_card_limit: i32,
    pub email_whitelist: Vec<String>,
    pub admin_emails: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SystemConfigRow> for SystemConfig {
    type Error = anyhow::Error;

    fn try_from(row: SystemConfigRow) -> Result<Self> {
        Ok(SystemConfig {
            default_card_limit: CardLimit::try_from(i64::from(row.default_card_limit))?,
            email_whitelist: row
                .email_whitelist
                .iter()
                .filter_map(|email| Email::parse(email).ok())
                .collect(),
            admin_emails: row
                .admin_emails
                .iter()
                .filter_map(|email| Email::parse(email).ok())
                .collect(),
            updated_at: row.updated_at,
        })
    }
}

/// CardLimit / UsageCap → INTEGER 컬럼
pub(crate) fn limit_column(value: impl Into<i64>) -> Result<i32> {
    i32::try_from(value.into()).context("limit does not fit INTEGER column")
}
