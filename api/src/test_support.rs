//! Shared fixtures for the in-source test modules.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::{Config, Environment};
use crate::db::{MockStore, SharedStore};
use crate::services::{
    AdminService, CardService, ConfigDefaults, JwtVerifier, TierService, TokenClaims,
    UnlockKeyLedger,
};
use crate::types::{AcquisitionSource, Card, CardInput, CardLimit, Email, Identity, UserId};
use crate::AppState;

pub const TEST_SECRET: &str = "test-secret";
pub const ROOT_ADMIN: &str = "root@prism.test";

/// 서비스 전체를 MockStore 위에 조립
pub struct TestApp {
    pub store: Arc<MockStore>,
    pub admin: Arc<AdminService>,
    pub tiers: Arc<TierService>,
    pub ledger: Arc<UnlockKeyLedger>,
    pub cards: Arc<CardService>,
    pub verifier: Arc<JwtVerifier>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MockStore::new());
        let shared: SharedStore = store.clone();

        let config = test_config();
        let admin = Arc::new(AdminService::new(
            shared.clone(),
            ConfigDefaults {
                default_card_limit: config.default_card_limit,
                admin_emails: config.admin_emails.clone(),
            },
        ));
        let tiers = Arc::new(TierService::new(shared.clone(), admin.clone()));
        let ledger = Arc::new(UnlockKeyLedger::new(shared.clone(), tiers.clone()));
        let cards = Arc::new(CardService::new(shared.clone()));
        let verifier = Arc::new(JwtVerifier::new(TEST_SECRET));

        let state = AppState {
            store: shared,
            cards: cards.clone(),
            tiers: tiers.clone(),
            unlock_keys: ledger.clone(),
            admin: admin.clone(),
            verifier: verifier.clone(),
            config: Arc::new(config),
        };

        Self { store, admin, tiers, ledger, cards, verifier, state }
    }

    /// 1시간 유효한 bearer token
    pub fn token(&self, user_id: &str, email: Option<&str>) -> String {
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            exp: Utc::now().timestamp() + 3600,
        };
        self.verifier.issue(&claims).unwrap()
    }
}

fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        default_card_limit: CardLimit::Limited(30),
        admin_emails: vec![Email::parse(ROOT_ADMIN).unwrap()],
        auth_token_secret: TEST_SECRET.to_string(),
        allowed_origins: Vec::new(),
        environment: Environment::Development,
    }
}

pub fn identity(user_id: &str, email: &str) -> Identity {
    Identity {
        user_id: UserId::new(user_id).unwrap(),
        email: Some(Email::parse(email).unwrap()),
    }
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

pub fn usd(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

pub fn sample_card(id: &str, user_id: &str) -> Card {
    let now = Utc::now();
    Card {
        id: id.to_string(),
        user_id: UserId::new(user_id).unwrap(),
        sport: "Basketball".to_string(),
        player: "Victor Wembanyama".to_string(),
        year: "2023".to_string(),
        brand: "Panini".to_string(),
        series: "Prizm".to_string(),
        insert: "Base".to_string(),
        parallel: None,
        serial_number: None,
        purchase_price: usd("10.00"),
        currency: "USD".to_string(),
        current_value: usd("10.00"),
        price_history: Vec::new(),
        acquisition_source: AcquisitionSource::Purchase,
        graded: false,
        grade_company: None,
        grade_value: None,
        auto_grade: None,
        cert_number: None,
        sold: false,
        sold_price: None,
        sold_date: None,
        sold_via: None,
        watchlist: false,
        never_trade: false,
        notes: None,
        image_url: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn card_input(id: &str) -> CardInput {
    CardInput {
        id: id.to_string(),
        sport: "Basketball".to_string(),
        player: "Victor Wembanyama".to_string(),
        year: "2023".to_string(),
        brand: "Panini".to_string(),
        series: "Prizm".to_string(),
        insert: "Base".to_string(),
        purchase_price: usd("10.00"),
        ..Default::default()
    }
}
