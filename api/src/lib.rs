//! Prism Portfolio API Library
//!
//! # Overview
//!
//! 카드 컬렉션 포트폴리오 백엔드: 구매 기록, 시세 추적, 판매/트레이드 기록,
//! 등급별 카드 한도 관리.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │   PostgreSQL   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (카드, 등급, unlock key, 관리자 설정)
//! - `db`: 데이터베이스 연동
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prism_api::{config::Config, db::Database, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url, config.database_max_connections).await?;
//!     let state = AppState::build(Arc::new(db), config);
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::Database;

use db::SharedStore;
use services::{
    AdminService, CardService, ConfigDefaults, IdentityVerifier, JwtVerifier,
    TierService, UnlockKeyLedger,
};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub cards: Arc<CardService>,
    pub tiers: Arc<TierService>,
    pub unlock_keys: Arc<UnlockKeyLedger>,
    pub admin: Arc<AdminService>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 하나의 store handle 위에 모든 서비스를 조립
    pub fn build(store: SharedStore, config: Config) -> Self {
        let admin = Arc::new(AdminService::new(
            store.clone(),
            ConfigDefaults {
                default_card_limit: config.default_card_limit,
                admin_emails: config.admin_emails.clone(),
            },
        ));
        let tiers = Arc::new(TierService::new(store.clone(), admin.clone()));
        let unlock_keys = Arc::new(UnlockKeyLedger::new(store.clone(), tiers.clone()));
        let cards = Arc::new(CardService::new(store.clone()));
        let verifier: Arc<dyn IdentityVerifier> =
            Arc::new(JwtVerifier::new(&config.auth_token_secret));

        Self {
            store,
            cards,
            tiers,
            unlock_keys,
            admin,
            verifier,
            config: Arc::new(config),
        }
    }
}
