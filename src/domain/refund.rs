//! Matching of requested refund lines against an order's items.

use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::OrderItem;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefundLine {
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundableItem {
    pub item_id: Uuid,
    pub sku: String,
    pub quantity: i32,
    pub price: BigDecimal,
    pub amount: BigDecimal,
    pub refund_initiated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundCalculation {
    pub refundable_amount: BigDecimal,
    pub items: Vec<RefundableItem>,
    pub total_refundable_quantity: i64,
    pub total_order_quantity: i64,
    /// Every unit of the order is being refunded in this one request.
    pub should_refund_whole_order: bool,
    /// After this refund every unit of every item has been refunded.
    pub completes_order: bool,
}

/// Match `lines` against `order_items` and validate the resulting amount.
///
/// Each line takes the first not-yet-refunded item with the same SKU and at
/// least the requested quantity; an item is matched at most once. Lines with
/// no match are ignored. `refundable_balance` is what is left of the order
/// total after earlier refunds.
pub fn calculate_refund(
    order_items: &[OrderItem],
    lines: &[RefundLine],
    refundable_balance: &BigDecimal,
) -> Result<RefundCalculation, DomainError> {
    if let Some(line) = lines.iter().find(|l| l.quantity <= 0) {
        return Err(DomainError::Refunding(format!(
            "invalid quantity {} for sku {}",
            line.quantity, line.sku
        )));
    }

    let total_order_quantity: i64 = order_items.iter().map(|i| i64::from(i.quantity)).sum();
    let mut matched = vec![false; order_items.len()];
    // Matched for every unit it holds.
    let mut covered = vec![false; order_items.len()];
    let mut items = Vec::new();
    let mut refundable_amount = BigDecimal::zero();
    let mut total_refundable_quantity = 0i64;

    for line in lines {
        let found = order_items.iter().enumerate().position(|(idx, item)| {
            !matched[idx]
                && item.status.is_refundable()
                && item.sku == line.sku
                && item.quantity >= line.quantity
        });
        let Some(idx) = found else {
            continue;
        };
        matched[idx] = true;

        let item = &order_items[idx];
        covered[idx] = line.quantity == item.quantity;
        let amount = &item.price * BigDecimal::from(line.quantity);
        refundable_amount += &amount;
        total_refundable_quantity += i64::from(line.quantity);
        items.push(RefundableItem {
            item_id: item.id,
            sku: item.sku.clone(),
            quantity: line.quantity,
            price: item.price.clone(),
            amount,
            refund_initiated: true,
        });
    }

    if refundable_amount.is_zero() {
        return Err(DomainError::Refunding(
            "no refundable items match the request".to_string(),
        ));
    }
    if &refundable_amount > refundable_balance {
        return Err(DomainError::Refunding(format!(
            "refund amount {} exceeds refundable order total {}",
            refundable_amount, refundable_balance
        )));
    }

    let completes_order = order_items
        .iter()
        .zip(&covered)
        .all(|(item, full)| *full || item.is_fully_refunded());

    Ok(RefundCalculation {
        refundable_amount,
        items,
        total_refundable_quantity,
        should_refund_whole_order: total_refundable_quantity == total_order_quantity,
        total_order_quantity,
        completes_order,
    })
}
