//! Draft validation and total verification
//!
//! Totals are computed with `Decimal` and converted back to `f64` for storage.

use rust_decimal::prelude::*;
use shared::order::OrderDraft;

/// 2 decimal places, half away from zero
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
const MAX_QUANTITY: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DraftError(pub String);

#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Σ(price × quantity)
pub fn items_total(draft: &OrderDraft) -> Decimal {
    draft
        .items
        .iter()
        .map(|item| to_decimal(item.price) * Decimal::from(item.quantity))
        .sum()
}

/// Validate the draft and return the verified total
pub fn verify_draft(draft: &OrderDraft) -> Result<f64, DraftError> {
    if draft.table.trim().is_empty() {
        return Err(DraftError("table is required".to_string()));
    }
    if draft.waiter_id.trim().is_empty() {
        return Err(DraftError("waiterId is required".to_string()));
    }
    if draft.items.is_empty() {
        return Err(DraftError("order has no items".to_string()));
    }

    for item in &draft.items {
        if item.quantity < 1 || item.quantity > MAX_QUANTITY {
            return Err(DraftError(format!(
                "item {} has invalid quantity {}",
                item.menu_id, item.quantity
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 || item.price > MAX_PRICE {
            return Err(DraftError(format!(
                "item {} has invalid price {}",
                item.menu_id, item.price
            )));
        }
    }

    if !draft.total_amount.is_finite() {
        return Err(DraftError("totalAmount must be a finite number".to_string()));
    }

    let computed = items_total(draft);
    let declared = to_decimal(draft.total_amount);
    if (computed - declared).abs() > MONEY_TOLERANCE {
        return Err(DraftError(format!(
            "totalAmount {} does not match items total {}",
            draft.total_amount,
            to_f64(computed)
        )));
    }

    Ok(to_f64(computed))
}
