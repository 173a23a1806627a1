//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `CardService`: 카드 CRUD, 가격 기록, 판매 처리
//! - `valuation`: 가격 이력 / current value 규칙 (순수 함수)
//! - `TierService`: 프로필 생성 및 카드 한도 판정
//! - `UnlockKeyLedger`: unlock key 사용 / 생성 / 비활성화
//! - `AdminService`: 전역 설정, whitelist, 관리자 목록
//! - `IdentityVerifier`: bearer token 검증

mod admin;
mod cards;
mod identity;
mod tier;
mod unlock_keys;
pub mod valuation;

pub use admin::{AdminService, ConfigDefaults, WhitelistUpdate};
pub use cards::{parse_entry_selector, CardService, CurrencyTotals, PortfolioSummary};
pub use identity::{IdentityVerifier, JwtVerifier, TokenClaims};
pub use tier::{CardAllowance, TierService};
pub use unlock_keys::{
    generate_key_code, normalize_key, NewUnlockKey, RedeemOutcome, RedeemRejection,
    UnlockKeyLedger,
};
