//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/cards/*` - 카드 CRUD, 가격 기록, 판매 처리
//! - `/tier/*` - 프로필, 카드 한도, unlock key 사용
//! - `/admin/*` - 전역 설정, whitelist, unlock key 관리

pub mod admin;
pub mod auth;
pub mod cards;
pub mod health;
pub mod tier;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET    /health                     - 서버 상태 확인
///
/// GET    /cards                      - 내 카드 목록
/// POST   /cards                      - 카드 저장 (upsert, 한도 확인)
/// GET    /cards/summary              - 포트폴리오 합계
/// DELETE /cards/:id                  - 카드 삭제
/// POST   /cards/:id/price            - 가격 기록 추가
/// PUT    /cards/:id/price?entry=     - 가격 기록 수정
/// DELETE /cards/:id/price?entry=     - 가격 기록 삭제
/// POST   /cards/:id/sell             - 판매/트레이드 처리
/// POST   /cards/:id/unsell           - 판매 취소
///
/// GET    /tier/profile               - 프로필 조회 (없으면 생성)
/// GET    /tier/can-add-card          - 카드 추가 가능 여부
/// POST   /tier/redeem-key            - unlock key 사용
///
/// GET    /admin/config               - 전역 설정
/// PUT    /admin/config/default-limit - 기본 카드 한도
/// POST   /admin/whitelist            - whitelist 추가
/// DELETE /admin/whitelist            - whitelist 제거
/// POST   /admin/admins               - 관리자 추가
/// DELETE /admin/admins               - 관리자 제거
/// GET    /admin/unlock-keys          - unlock key 목록
/// POST   /admin/unlock-keys          - unlock key 생성
/// DELETE /admin/unlock-keys/:key     - unlock key 비활성화
/// ```
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Cards
        .route("/cards", get(cards::list_cards).post(cards::save_card))
        .route("/cards/summary", get(cards::summary))
        .route("/cards/:id", delete(cards::delete_card))
        .route(
            "/cards/:id/price",
            post(cards::add_price).put(cards::edit_price).delete(cards::delete_price),
        )
        .route("/cards/:id/sell", post(cards::sell_card))
        .route("/cards/:id/unsell", post(cards::unsell_card))

        // Tier
        .route("/tier/profile", get(tier::get_profile))
        .route("/tier/can-add-card", get(tier::can_add_card))
        .route("/tier/redeem-key", post(tier::redeem_key))

        // Admin
        .route("/admin/config", get(admin::get_config))
        .route("/admin/config/default-limit", put(admin::set_default_limit))
        .route(
            "/admin/whitelist",
            post(admin::add_whitelist).delete(admin::remove_whitelist),
        )
        .route("/admin/admins", post(admin::add_admin).delete(admin::remove_admin))
        .route(
            "/admin/unlock-keys",
            get(admin::list_unlock_keys).post(admin::create_unlock_key),
        )
        .route("/admin/unlock-keys/:key", delete(admin::deactivate_unlock_key))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}

/// CORS 설정
///
/// 프로덕션에서는 `ALLOWED_ORIGINS`만 허용, 개발 환경에서는 localhost 허용
fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:5173"), // Vite dev server
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
