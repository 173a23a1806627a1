//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//!
//! Closed enums replace the string-typed fields the clients send
//! (`"free" | "unlimited"`, `"sale" | "trade"`, the `-1` limit sentinel), so
//! every consumer matches them exhaustively.

mod card;
mod entitlement;

pub use card::{
    AcquisitionSource, Card, CardInput, Disposition, EntrySelector, PriceEdit, PriceObservation,
    PriceUpdate, SoldVia,
};
pub use entitlement::{SystemConfig, UnlockKey, UserProfile};

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 금액 컬럼은 NUMERIC(12,2)
pub const MONEY_SCALE: u32 = 2;

/// 입력 검증 실패
///
/// 어떤 변경(mutation)보다 먼저 발생해야 함
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("card limit must be -1 (unlimited) or at least 1, got {0}")]
    InvalidCardLimit(i64),

    #[error("max uses must be -1 (unlimited) or at least 1, got {0}")]
    InvalidUsageCap(i64),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("{field} must have at most 2 decimal places")]
    TooPrecise { field: &'static str },
}

/// 금액 검증: 음수 금지, 소수점 이하 최대 2자리
///
/// `19.990`처럼 뒤쪽 0만 붙은 값은 허용
pub fn check_money(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::NegativeAmount { field });
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ValidationError::TooPrecise { field });
    }
    Ok(())
}

/// 인증된 사용자 ID
///
/// Identity provider가 발급한 opaque 문자열. 클라이언트 payload에서 절대 읽지 않음.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 정규화된 이메일 (trim + lowercase)
///
/// Whitelist / admin 비교는 항상 이 타입으로 수행 → 대소문자 무시 비교
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !normalized.contains(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(Self(normalized))
        } else {
            Err(ValidationError::InvalidEmail(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 인증 계층이 넘겨주는 (userId, email) 쌍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    /// Phone OTP 로그인 등은 이메일이 없을 수 있음
    pub email: Option<Email>,
}

/// 사용자 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Unlimited,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Unlimited => "unlimited",
        }
    }
}

impl FromStr for Tier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "unlimited" => Ok(Tier::Unlimited),
            other => Err(ValidationError::UnknownTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 카드 보유 한도
///
/// Wire/DB 표현은 정수: `-1` = 무제한, `n >= 1` = 최대 n장
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CardLimit {
    Unlimited,
    Limited(u32),
}

impl CardLimit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, CardLimit::Unlimited)
    }

    /// `current`장을 이미 보유했을 때 한 장 더 추가 가능한지
    pub fn admits(&self, current: u64) -> bool {
        match self {
            CardLimit::Unlimited => true,
            CardLimit::Limited(max) => current < u64::from(*max),
        }
    }
}

impl CardLimit {
    /// 유한한 한도만 허용 (기본 한도 설정용)
    pub fn finite(value: i64) -> Result<Self, ValidationError> {
        match CardLimit::try_from(value)? {
            CardLimit::Unlimited => Err(ValidationError::InvalidCardLimit(value)),
            limit => Ok(limit),
        }
    }
}

impl TryFrom<i64> for CardLimit {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(CardLimit::Unlimited),
            n if n >= 1 => u32::try_from(n)
                .map(CardLimit::Limited)
                .map_err(|_| ValidationError::InvalidCardLimit(n)),
            n => Err(ValidationError::InvalidCardLimit(n)),
        }
    }
}

impl From<CardLimit> for i64 {
    fn from(limit: CardLimit) -> Self {
        match limit {
            CardLimit::Unlimited => -1,
            CardLimit::Limited(n) => i64::from(n),
        }
    }
}

/// Unlock key 사용 횟수 상한 (`-1` = 무제한)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum UsageCap {
    Unlimited,
    Max(u32),
}

impl UsageCap {
    pub fn is_exhausted(&self, used: u32) -> bool {
        match self {
            UsageCap::Unlimited => false,
            UsageCap::Max(max) => used >= *max,
        }
    }
}

impl TryFrom<i64> for UsageCap {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(UsageCap::Unlimited),
            n if n >= 1 => u32::try_from(n)
                .map(UsageCap::Max)
                .map_err(|_| ValidationError::InvalidUsageCap(n)),
            n => Err(ValidationError::InvalidUsageCap(n)),
        }
    }
}

impl From<UsageCap> for i64 {
    fn from(cap: UsageCap) -> Self {
        match cap {
            UsageCap::Unlimited => -1,
            UsageCap::Max(n) => i64::from(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized() {
        let email = Email::parse("  Collector@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "collector@example.com");
    }

    #[test]
    fn test_email_invalid() {
        assert!(Email::parse("not-an-email").is_err());
        assert!(Email::parse("a@b").is_err());
        assert!(Email::parse("@example.com").is_err());
        assert!(Email::parse("a b@example.com").is_err());
    }

    #[test]
    fn test_money_precision() {
        use std::str::FromStr;

        let money = |raw: &str| Decimal::from_str(raw).unwrap();
        assert!(check_money(money("19.99"), "value").is_ok());
        assert!(check_money(money("19.990"), "value").is_ok());
        assert!(check_money(money("20"), "value").is_ok());
        assert_eq!(
            check_money(money("19.999"), "value"),
            Err(ValidationError::TooPrecise { field: "value" })
        );
        assert_eq!(
            check_money(money("-1.00"), "value"),
            Err(ValidationError::NegativeAmount { field: "value" })
        );
    }

    #[test]
    fn test_card_limit_sentinel() {
        assert_eq!(CardLimit::try_from(-1).unwrap(), CardLimit::Unlimited);
        assert_eq!(CardLimit::try_from(30).unwrap(), CardLimit::Limited(30));
        assert!(CardLimit::try_from(0).is_err());
        assert!(CardLimit::try_from(-5).is_err());
        assert_eq!(i64::from(CardLimit::Unlimited), -1);
        assert!(CardLimit::finite(-1).is_err());
        assert_eq!(CardLimit::finite(50).unwrap(), CardLimit::Limited(50));
    }

    #[test]
    fn test_card_limit_admits() {
        let limit = CardLimit::Limited(30);
        assert!(limit.admits(29));
        assert!(!limit.admits(30));
        assert!(CardLimit::Unlimited.admits(10_000));
    }

    #[test]
    fn test_card_limit_json() {
        let json = serde_json::to_string(&CardLimit::Unlimited).unwrap();
        assert_eq!(json, "-1");
        let parsed: CardLimit = serde_json::from_str("25").unwrap();
        assert_eq!(parsed, CardLimit::Limited(25));
        assert!(serde_json::from_str::<CardLimit>("0").is_err());
    }

    #[test]
    fn test_usage_cap() {
        assert!(UsageCap::Max(3).is_exhausted(3));
        assert!(!UsageCap::Max(3).is_exhausted(2));
        assert!(!UsageCap::Unlimited.is_exhausted(u32::MAX));
    }

    #[test]
    fn test_tier_roundtrip_str() {
        assert_eq!("unlimited".parse::<Tier>().unwrap(), Tier::Unlimited);
        assert!("gold".parse::<Tier>().is_err());
        assert_eq!(serde_json::to_string(&Tier::Free).unwrap(), "\"free\"");
    }
}
