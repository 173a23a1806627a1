//! Valuation Store
//!
//! Price-history state machine for a single card. Every function here works on
//! an already-loaded `Card` in memory; persisting the result is the caller's job
//! (`CardService` writes the whole record back).
//!
//! Rules for `current_value`:
//!
//! ```text
//! append : overwrite iff new.date >= newest.date  AND parallel matches
//! edit   : overwrite iff edited.date == newest.date AND parallel matches
//! delete : latest remaining matching entry, unchanged if none
//! sold   : never re-derived
//! ```
//!
//! A parallel matches when the card has none, the observation has none, or
//! both are equal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{Card, EntrySelector, PriceEdit, PriceObservation, PriceUpdate};

/// 빈 문자열도 "parallel 없음"으로 취급
fn present(parallel: Option<&str>) -> Option<&str> {
    parallel.map(str::trim).filter(|p| !p.is_empty())
}

pub fn parallel_matches(card_parallel: Option<&str>, observation_parallel: Option<&str>) -> bool {
    match (present(card_parallel), present(observation_parallel)) {
        (Some(card), Some(observation)) => card == observation,
        _ => true,
    }
}

/// date 오름차순 안정 정렬 (같은 시각이면 삽입 순서 유지)
pub fn sort_history(history: &mut [PriceObservation]) {
    history.sort_by_key(|observation| observation.date);
}

/// 카드 parallel과 일치하는 가장 최근 기록의 값
pub fn latest_matching_value(card: &Card) -> Option<Decimal> {
    card.price_history
        .iter()
        .rev()
        .find(|observation| {
            parallel_matches(card.parallel.as_deref(), observation.parallel.as_deref())
        })
        .map(|observation| observation.value)
}

/// 새 가격 기록 추가 후 정렬, 조건부로 current value 갱신
///
/// 추가된 기록의 id 반환
pub fn append_observation(card: &mut Card, update: PriceUpdate, now: DateTime<Utc>) -> Uuid {
    let observation = PriceObservation {
        id: Uuid::new_v4(),
        date: update.date.unwrap_or(now),
        value: update.value,
        platform: update.platform,
        parallel: update.parallel,
        grade: update.grade,
        serial_number: update.serial_number,
    };

    let id = observation.id;
    let date = observation.date;
    let value = observation.value;
    let matches = parallel_matches(card.parallel.as_deref(), observation.parallel.as_deref());

    card.price_history.push(observation);
    sort_history(&mut card.price_history);

    let is_newest = card
        .price_history
        .last()
        .is_some_and(|newest| date >= newest.date);

    if is_newest && matches && !card.sold {
        card.current_value = value;
    }

    id
}

/// 기록 삭제 후 남은 기록으로 current value 재계산
///
/// 일치하는 기록이 없으면 `false`. 남은 기록이 없으면 current value는 그대로.
pub fn remove_observation(card: &mut Card, selector: EntrySelector) -> bool {
    let Some(position) = card.price_history.iter().position(|o| selector.matches(o)) else {
        return false;
    };

    card.price_history.remove(position);

    if !card.sold {
        if let Some(value) = latest_matching_value(card) {
            card.current_value = value;
        }
    }

    true
}

/// 기록 제자리 수정 (id 유지)
///
/// 수정된 기록이 가장 최근이고 parallel이 일치할 때만 current value 갱신.
/// 그 외에는 이력과 어긋나더라도 current value를 건드리지 않음.
pub fn edit_observation(card: &mut Card, selector: EntrySelector, edit: PriceEdit) -> bool {
    let Some(entry) = card.price_history.iter_mut().find(|o| selector.matches(o)) else {
        return false;
    };

    let date_changed = edit.date.is_some_and(|date| date != entry.date);

    entry.value = edit.value;
    if let Some(date) = edit.date {
        entry.date = date;
    }
    if edit.platform.is_some() {
        entry.platform = edit.platform;
    }
    if edit.parallel.is_some() {
        entry.parallel = edit.parallel;
    }
    if edit.grade.is_some() {
        entry.grade = edit.grade;
    }
    if edit.serial_number.is_some() {
        entry.serial_number = edit.serial_number;
    }

    let date = entry.date;
    let value = entry.value;
    let matches = parallel_matches(card.parallel.as_deref(), entry.parallel.as_deref());

    if date_changed {
        sort_history(&mut card.price_history);
    }

    let is_newest = card
        .price_history
        .last()
        .is_some_and(|newest| newest.date == date);

    if is_newest && matches && !card.sold {
        card.current_value = value;
    }

    true
}
