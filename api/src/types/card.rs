//! Card and price-history types shared by the service, db and route layers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_money, UserId, ValidationError};

/// 판매 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoldVia {
    Sale,
    Trade,
}

impl SoldVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoldVia::Sale => "sale",
            SoldVia::Trade => "trade",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(SoldVia::Sale),
            "trade" => Some(SoldVia::Trade),
            _ => None,
        }
    }
}

/// 카드 획득 경로
///
/// Break / SelfRip 카드는 구매가 대신 첫 가격 기록이 cost basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionSource {
    #[default]
    Purchase,
    Break,
    SelfRip,
    Trade,
}

impl AcquisitionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionSource::Purchase => "purchase",
            AcquisitionSource::Break => "break",
            AcquisitionSource::SelfRip => "self_rip",
            AcquisitionSource::Trade => "trade",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(AcquisitionSource::Purchase),
            "break" => Some(AcquisitionSource::Break),
            "self_rip" => Some(AcquisitionSource::SelfRip),
            "trade" => Some(AcquisitionSource::Trade),
            _ => None,
        }
    }

    fn values_from_first_observation(&self) -> bool {
        match self {
            AcquisitionSource::Break | AcquisitionSource::SelfRip => true,
            AcquisitionSource::Purchase | AcquisitionSource::Trade => false,
        }
    }
}

/// 가격 기록 한 건
///
/// `id`가 식별자, `date`는 정렬용 속성일 뿐
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredObservation")]
pub struct PriceObservation {
    /// id 없이 저장된 이전 기록은 내용에서 파생된 v5 id를 받음 (읽을 때마다 동일)
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// 저장/요청 형태: 이전 기록에는 `id`가 없을 수 있음
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredObservation {
    #[serde(default)]
    id: Option<Uuid>,
    date: DateTime<Utc>,
    value: Decimal,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    parallel: Option<String>,
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    serial_number: Option<String>,
}

impl From<StoredObservation> for PriceObservation {
    fn from(stored: StoredObservation) -> Self {
        let id = stored.id.unwrap_or_else(|| legacy_observation_id(&stored));
        Self {
            id,
            date: stored.date,
            value: stored.value,
            platform: stored.platform,
            parallel: stored.parallel,
            grade: stored.grade,
            serial_number: stored.serial_number,
        }
    }
}

fn legacy_observation_id(stored: &StoredObservation) -> Uuid {
    let name = format!(
        "{}|{}|{}|{}",
        stored.date.to_rfc3339(),
        stored.value.normalize(),
        stored.parallel.as_deref().unwrap_or_default(),
        stored.platform.as_deref().unwrap_or_default(),
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// 보유 카드 한 장
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub user_id: UserId,

    pub sport: String,
    pub player: String,
    pub year: String,
    pub brand: String,
    pub series: String,
    pub insert: String,
    pub parallel: Option<String>,
    pub serial_number: Option<String>,

    pub purchase_price: Decimal,
    pub currency: String,
    pub current_value: Decimal,
    /// 항상 date 오름차순
    pub price_history: Vec<PriceObservation>,
    pub acquisition_source: AcquisitionSource,

    pub graded: bool,
    pub grade_company: Option<String>,
    pub grade_value: Option<String>,
    pub auto_grade: Option<String>,
    pub cert_number: Option<String>,

    pub sold: bool,
    pub sold_price: Option<Decimal>,
    pub sold_date: Option<DateTime<Utc>>,
    pub sold_via: Option<SoldVia>,

    pub watchlist: bool,
    pub never_trade: bool,

    pub notes: Option<String>,
    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Watchlist 카드는 등급 한도에 포함되지 않음
    pub fn counts_toward_limit(&self) -> bool {
        !self.watchlist
    }

    pub fn is_holding(&self) -> bool {
        !self.sold && !self.watchlist
    }

    pub fn is_sold(&self) -> bool {
        self.sold && !self.watchlist
    }

    pub fn cost_basis(&self) -> Decimal {
        if self.acquisition_source.values_from_first_observation() {
            if let Some(first) = self.price_history.first() {
                return first.value;
            }
        }
        self.purchase_price
    }
}

/// POST /cards 요청 본문
///
/// Owner 필드가 없음: owner는 인증된 identity로만 결정됨
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInput {
    pub id: String,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub player: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub insert: String,
    #[serde(default)]
    pub parallel: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,

    #[serde(default)]
    pub purchase_price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
    #[serde(default)]
    pub price_history: Vec<PriceObservation>,
    #[serde(default)]
    pub acquisition_source: AcquisitionSource,

    #[serde(default)]
    pub graded: bool,
    #[serde(default)]
    pub grade_company: Option<String>,
    #[serde(default)]
    pub grade_value: Option<String>,
    #[serde(default)]
    pub auto_grade: Option<String>,
    #[serde(default)]
    pub cert_number: Option<String>,

    #[serde(default)]
    pub sold: bool,
    #[serde(default)]
    pub sold_price: Option<Decimal>,
    #[serde(default)]
    pub sold_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sold_via: Option<SoldVia>,

    #[serde(default)]
    pub watchlist: bool,
    #[serde(default)]
    pub never_trade: bool,

    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CardInput {
    pub const DEFAULT_CURRENCY: &'static str = "USD";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        check_money(self.purchase_price, "purchasePrice")?;
        if let Some(value) = self.current_value {
            check_money(value, "currentValue")?;
        }
        if let Some(price) = self.sold_price {
            check_money(price, "soldPrice")?;
        }
        for observation in &self.price_history {
            check_money(observation.value, "priceHistory.value")?;
        }
        Ok(())
    }
}

/// POST /cards/:id/price
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub value: Decimal,
    /// 없으면 현재 시각
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub parallel: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// 기존 기록 수정. `None` 필드는 기존 값 유지
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEdit {
    pub value: Decimal,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub parallel: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// 수정/삭제 대상 기록 지정
///
/// `Date`는 date 문자열로 기록을 식별하던 클라이언트용
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySelector {
    Id(Uuid),
    Date(DateTime<Utc>),
}

impl EntrySelector {
    pub fn matches(&self, observation: &PriceObservation) -> bool {
        match self {
            EntrySelector::Id(id) => observation.id == *id,
            EntrySelector::Date(date) => observation.date == *date,
        }
    }
}

/// 판매/트레이드 처리 요청
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disposition {
    pub via: SoldVia,
    pub price: Decimal,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}
