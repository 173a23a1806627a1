//! Card Repository
//!
//! Owner-scoped card CRUD plus the price / sale mutations. Every call takes
//! the authenticated `UserId` separately from the payload and every lookup is
//! by `(id, user_id)`, so a caller can never read or touch another user's
//! card, even with a guessed id.
//!
//! Mutations load the whole card, change it in memory, and write the whole
//! record back (last writer wins).

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::SharedStore;
use crate::services::valuation;
use crate::types::{
    Card, CardInput, Disposition, EntrySelector, PriceEdit, PriceUpdate, UserId,
};

// ============ Summary Types ============

/// 통화별 합계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTotals {
    /// 보유 카드 현재가 합계
    pub current_value: Decimal,
    /// 보유 카드 cost basis 합계
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
    /// 판매/트레이드 카드의 (판매가 - cost basis) 합계
    pub realized_gain: Decimal,
}

/// `GET /cards/summary` 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub holdings: usize,
    pub sold: usize,
    pub watchlist: usize,
    /// 통화 코드 → 합계 (통화가 다른 금액은 합산하지 않음)
    pub totals: BTreeMap<String, CurrencyTotals>,
}

// ============ Service ============

pub struct CardService {
    store: SharedStore,
}

impl CardService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get_cards(&self, user_id: &UserId) -> Result<Vec<Card>> {
        self.store.find_cards(user_id).await
    }

    pub async fn get_card(&self, id: &str, user_id: &UserId) -> Result<Option<Card>> {
        self.store.find_card(id, user_id).await
    }

    /// `(id, user_id)` 기준 upsert
    ///
    /// 입력은 `CardInput::validate()`를 통과한 상태여야 함.
    /// 덮어쓸 때 `created_at`은 유지됨.
    pub async fn save_card(&self, input: CardInput, user_id: &UserId) -> Result<Card> {
        let now = Utc::now();
        let existing = self.store.find_card(&input.id, user_id).await?;
        let created_at = existing.map(|card| card.created_at).unwrap_or(now);

        let currency = input
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| CardInput::DEFAULT_CURRENCY.to_string());

        let mut card = Card {
            id: input.id,
            user_id: user_id.clone(),
            sport: input.sport,
            player: input.player,
            year: input.year,
            brand: input.brand,
            series: input.series,
            insert: input.insert,
            parallel: input.parallel,
            serial_number: input.serial_number,
            purchase_price: input.purchase_price,
            currency,
            current_value: input.purchase_price,
            price_history: input.price_history,
            acquisition_source: input.acquisition_source,
            graded: input.graded,
            grade_company: input.grade_company,
            grade_value: input.grade_value,
            auto_grade: input.auto_grade,
            cert_number: input.cert_number,
            sold: input.sold,
            sold_price: input.sold_price,
            sold_date: input.sold_date,
            sold_via: input.sold_via,
            watchlist: input.watchlist,
            never_trade: input.never_trade,
            notes: input.notes,
            image_url: input.image_url,
            created_at,
            updated_at: now,
        };

        valuation::sort_history(&mut card.price_history);
        card.current_value = input
            .current_value
            .or_else(|| valuation::latest_matching_value(&card))
            .unwrap_or(card.purchase_price);

        self.store.upsert_card(&card).await?;
        tracing::info!(card_id = %card.id, user_id = %user_id, "card saved");

        Ok(card)
    }

    /// 없는 카드 삭제도 성공으로 취급
    pub async fn delete_card(&self, id: &str, user_id: &UserId) -> Result<()> {
        let deleted = self.store.delete_card(id, user_id).await?;
        tracing::info!(card_id = %id, user_id = %user_id, deleted, "card delete");
        Ok(())
    }

    /// 가격 기록 추가. 카드가 없으면 `None`
    pub async fn update_price(
        &self,
        id: &str,
        user_id: &UserId,
        update: PriceUpdate,
    ) -> Result<Option<Card>> {
        self.mutate(id, user_id, |card| {
            let entry = valuation::append_observation(card, update, Utc::now());
            tracing::debug!(card_id = %card.id, %entry, "price observation added");
            true
        })
        .await
    }

    /// 카드나 기록이 없으면 `None`
    pub async fn delete_price_entry(
        &self,
        id: &str,
        user_id: &UserId,
        selector: EntrySelector,
    ) -> Result<Option<Card>> {
        self.mutate(id, user_id, |card| valuation::remove_observation(card, selector))
            .await
    }

    /// 카드나 기록이 없으면 `None`
    pub async fn edit_price_entry(
        &self,
        id: &str,
        user_id: &UserId,
        selector: EntrySelector,
        edit: PriceEdit,
    ) -> Result<Option<Card>> {
        self.mutate(id, user_id, |card| valuation::edit_observation(card, selector, edit))
            .await
    }

    pub async fn mark_sold(
        &self,
        id: &str,
        user_id: &UserId,
        disposition: Disposition,
    ) -> Result<Option<Card>> {
        self.mutate(id, user_id, |card| {
            card.sold = true;
            card.sold_price = Some(disposition.price);
            card.sold_date = Some(disposition.date.unwrap_or_else(Utc::now));
            card.sold_via = Some(disposition.via);
            true
        })
        .await
    }

    /// 판매 취소. current value는 이력에서 다시 계산
    pub async fn mark_unsold(&self, id: &str, user_id: &UserId) -> Result<Option<Card>> {
        self.mutate(id, user_id, |card| {
            card.sold = false;
            card.sold_price = None;
            card.sold_date = None;
            card.sold_via = None;
            if let Some(value) = valuation::latest_matching_value(card) {
                card.current_value = value;
            }
            true
        })
        .await
    }

    pub async fn portfolio_summary(&self, user_id: &UserId) -> Result<PortfolioSummary> {
        let cards = self.store.find_cards(user_id).await?;
        Ok(summarize(&cards))
    }

    /// load → 변경 → 전체 저장
    ///
    /// `apply`가 `false`를 반환하면 저장하지 않고 `None`
    async fn mutate<F>(&self, id: &str, user_id: &UserId, apply: F) -> Result<Option<Card>>
    where
        F: FnOnce(&mut Card) -> bool,
    {
        let Some(mut card) = self.store.find_card(id, user_id).await? else {
            return Ok(None);
        };

        if !apply(&mut card) {
            return Ok(None);
        }

        card.updated_at = Utc::now();
        self.store.upsert_card(&card).await?;
        Ok(Some(card))
    }
}

fn summarize(cards: &[Card]) -> PortfolioSummary {
    let mut summary = PortfolioSummary::default();

    for card in cards {
        if card.watchlist {
            summary.watchlist += 1;
            continue;
        }

        let totals = summary.totals.entry(card.currency.clone()).or_default();
        let basis = card.cost_basis();

        if card.is_sold() {
            summary.sold += 1;
            totals.realized_gain += card.sold_price.unwrap_or_default() - basis;
        } else {
            summary.holdings += 1;
            totals.current_value += card.current_value;
            totals.cost_basis += basis;
            totals.unrealized_gain += card.current_value - basis;
        }
    }

    summary
}

/// 경로의 entry 지정자 해석: UUID면 id, 아니면 RFC 3339 date
pub fn parse_entry_selector(raw: &str) -> Option<EntrySelector> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Some(EntrySelector::Id(id));
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| EntrySelector::Date(date.with_timezone(&Utc)))
}
