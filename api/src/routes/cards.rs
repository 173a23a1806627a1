//! Card Endpoints
//!
//! Owner-scoped card CRUD, price history edits and sale marking. The owner is
//! always the authenticated user; card ids in the path are only meaningful
//! together with that owner.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    routes::auth::AuthUser,
    services::{parse_entry_selector, PortfolioSummary},
    types::{check_money, Card, CardInput, Disposition, EntrySelector, PriceEdit, PriceUpdate},
    AppState,
};

// ============ Request/Response Types ============

/// 가격 기록 지정 (`?entry=<uuid>` 또는 `?entry=<RFC 3339 date>`)
#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub entry: String,
}

impl EntryQuery {
    fn selector(&self) -> Result<EntrySelector, ApiError> {
        parse_entry_selector(self.entry.trim()).ok_or_else(|| {
            ApiError::BadRequest("entry must be a price entry id or an RFC 3339 date".to_string())
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

fn check_amount(value: rust_decimal::Decimal, field: &'static str) -> Result<(), ApiError> {
    Ok(check_money(value, field)?)
}

// ============ Handlers ============

/// GET /cards
pub async fn list_cards(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Card>>, ApiError> {
    let cards = state.cards.get_cards(&identity.user_id).await?;
    Ok(Json(cards))
}

/// POST /cards
///
/// 새 카드(또는 watchlist에서 보유로 바뀌는 카드)만 한도 확인.
/// 한도 초과면 403 + 안내 메시지.
pub async fn save_card(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(input): Json<CardInput>,
) -> Result<Json<Card>, ApiError> {
    input.validate()?;

    let adds_to_limit = if input.watchlist {
        false
    } else {
        let existing = state.cards.get_card(&input.id, &identity.user_id).await?;
        existing.map_or(true, |card| card.watchlist)
    };

    if adds_to_limit {
        let allowance = state.tiers.can_add_card(&identity).await?;
        if !allowance.allowed {
            return Err(ApiError::Forbidden(
                allowance
                    .message
                    .unwrap_or_else(|| "Card limit reached".to_string()),
            ));
        }
    }

    let card = state.cards.save_card(input, &identity.user_id).await?;

    // 확인과 저장 사이에 다른 요청이 끼어든 경우 기록만 남김
    if adds_to_limit {
        if let Some(over) = state.tiers.limit_overshoot(&identity).await? {
            tracing::warn!(
                user_id = %identity.user_id,
                card_id = %card.id,
                over,
                "card limit exceeded by concurrent saves"
            );
        }
    }

    Ok(Json(card))
}

/// DELETE /cards/:id
///
/// 없는 카드도 `{success: true}`
pub async fn delete_card(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.cards.delete_card(&id, &identity.user_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// POST /cards/:id/price
pub async fn add_price(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Json(update): Json<PriceUpdate>,
) -> Result<Json<Card>, ApiError> {
    check_amount(update.value, "value")?;

    state
        .cards
        .update_price(&id, &identity.user_id, update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Card".to_string()))
}

/// PUT /cards/:id/price?entry=...
pub async fn edit_price(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<EntryQuery>,
    Json(edit): Json<PriceEdit>,
) -> Result<Json<Card>, ApiError> {
    let selector = query.selector()?;
    check_amount(edit.value, "value")?;

    state
        .cards
        .edit_price_entry(&id, &identity.user_id, selector, edit)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Price entry".to_string()))
}

/// DELETE /cards/:id/price?entry=...
pub async fn delete_price(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Card>, ApiError> {
    let selector = query.selector()?;

    state
        .cards
        .delete_price_entry(&id, &identity.user_id, selector)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Price entry".to_string()))
}

/// POST /cards/:id/sell
pub async fn sell_card(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Json(disposition): Json<Disposition>,
) -> Result<Json<Card>, ApiError> {
    check_amount(disposition.price, "price")?;

    state
        .cards
        .mark_sold(&id, &identity.user_id, disposition)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Card".to_string()))
}

/// POST /cards/:id/unsell
pub async fn unsell_card(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Card>, ApiError> {
    state
        .cards
        .mark_unsold(&id, &identity.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Card".to_string()))
}

/// GET /cards/summary
pub async fn summary(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PortfolioSummary>, ApiError> {
    let summary = state.cards.portfolio_summary(&identity.user_id).await?;
    Ok(Json(summary))
}
