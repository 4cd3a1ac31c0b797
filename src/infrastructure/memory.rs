//! Mutex-guarded implementation of [`OrderRepository`] for tests and local runs.
//!
//! Mirrors the diesel repository's transactional behaviour: every write
//! validates first and mutates last, so a failed call leaves no trace.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use super::outbox::OutboxMessage;
use crate::domain::errors::{DomainError, ServiceError};
use crate::domain::order::{
    Order, OrderItem, OrderItemStatus, OrderPatch, OrderStatus, RefundRecord, RefundSettlement,
};
use crate::domain::payment::ProviderKind;
use crate::domain::ports::OrderRepository;

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    /// Items per order, in insertion order.
    items: HashMap<Uuid, Vec<OrderItem>>,
    /// Carts this repository has seen consumed. Unknown carts count as active.
    purchased_carts: HashMap<Uuid, chrono::DateTime<Utc>>,
    outbox: Vec<OutboxMessage>,
    write_attempts: usize,
    fail_next_write: bool,
}

impl State {
    fn begin_write(&mut self) -> Result<(), DomainError> {
        self.write_attempts += 1;
        if std::mem::take(&mut self.fail_next_write) {
            return Err(DomainError::Internal("injected write failure".to_string()));
        }
        Ok(())
    }

    fn order_mut(&mut self, id: Uuid) -> Result<&mut Order, DomainError> {
        self.orders.get_mut(&id).ok_or(DomainError::NotFound)
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    state: Mutex<State>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of mutating calls made, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.state().write_attempts
    }

    /// Make the next mutating call fail as a storage error would.
    pub fn fail_next_write(&self) {
        self.state().fail_next_write = true;
    }

    pub fn is_cart_purchased(&self, cart_id: Uuid) -> bool {
        self.state().purchased_carts.contains_key(&cart_id)
    }

    pub fn outbox(&self) -> Vec<OutboxMessage> {
        self.state().outbox.clone()
    }

    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn create_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError> {
        let mut state = self.state();
        state.begin_write()?;

        if state.purchased_carts.contains_key(&order.cart_id) {
            return Err(DomainError::Cart(ServiceError::rejected(
                "CART_NOT_ACTIVE",
                format!("cart {} is not active", order.cart_id),
            )));
        }
        if state.orders.contains_key(&order.id)
            || state
                .orders
                .values()
                .any(|o| o.order_reference == order.order_reference)
        {
            return Err(DomainError::Internal(format!(
                "duplicate order {} / {}",
                order.id, order.order_reference
            )));
        }

        state.purchased_carts.insert(order.cart_id, Utc::now());
        state.orders.insert(order.id, order.clone());
        state.items.insert(order.id, items.to_vec());
        state.outbox.push(OutboxMessage::order_created(order, items));
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.state().orders.get(&id).cloned())
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .state()
            .orders
            .values()
            .find(|o| o.order_reference == reference)
            .cloned())
    }

    fn find_by_payment_id(
        &self,
        provider: ProviderKind,
        payment_id: &str,
    ) -> Result<Option<Order>, DomainError> {
        Ok(self
            .state()
            .orders
            .values()
            .find(|o| o.payment_id(provider) == Some(payment_id))
            .cloned())
    }

    fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        Ok(self
            .state()
            .items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    fn find_items_by_refund_id(&self, refund_id: &str) -> Result<Vec<OrderItem>, DomainError> {
        Ok(self
            .state()
            .items
            .values()
            .flatten()
            .filter(|i| i.refund_id.as_deref() == Some(refund_id))
            .cloned()
            .collect())
    }

    fn reference_exists(&self, reference: &str) -> Result<bool, DomainError> {
        Ok(self
            .state()
            .orders
            .values()
            .any(|o| o.order_reference == reference))
    }

    fn list_for_customer(
        &self,
        customer_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Order>, DomainError> {
        let state = self.state();
        let mut orders: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let start = match cursor {
            Some(cursor) => {
                orders
                    .iter()
                    .position(|o| o.id == cursor)
                    .ok_or_else(|| DomainError::InvalidInput(format!("unknown cursor {}", cursor)))?
                    + 1
            }
            None => 0,
        };
        Ok(orders
            .into_iter()
            .skip(start)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn transition_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state();
        state.begin_write()?;

        let order = state.order_mut(order_id)?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        order.updated_at = Utc::now();
        let message = OutboxMessage::status_changed(
            order.id,
            order.customer_id,
            &order.order_reference,
            next,
        );
        state.outbox.push(message);
        Ok(true)
    }

    fn apply_patch(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, DomainError> {
        let mut state = self.state();
        state.begin_write()?;

        let current = state.orders.get(&order_id).ok_or(DomainError::NotFound)?;
        if current.status != expected {
            return Ok(None);
        }
        let items = state.items.get(&order_id).cloned().unwrap_or_default();
        if let Some(missing) = patch
            .items
            .iter()
            .find(|p| !items.iter().any(|i| i.id == p.item_id))
        {
            return Err(DomainError::Updating(format!(
                "item {} does not belong to order {}",
                missing.item_id, order_id
            )));
        }

        if let Some(stored) = state.items.get_mut(&order_id) {
            for item_patch in &patch.items {
                if let Some(item) = stored.iter_mut().find(|i| i.id == item_patch.item_id) {
                    if let Some(status) = item_patch.status {
                        item.status = status;
                    }
                    if let Some(sku) = &item_patch.sku {
                        item.sku = sku.clone();
                    }
                }
            }
        }

        let order = state.order_mut(order_id)?;
        if let Some(status) = patch.status {
            order.status = status;
        }
        patch.apply_to(&mut order.fulfillment);
        order.updated_at = Utc::now();
        let updated = order.clone();

        if let Some(status) = patch.status.filter(|s| *s != expected) {
            state.outbox.push(OutboxMessage::status_changed(
                updated.id,
                updated.customer_id,
                &updated.order_reference,
                status,
            ));
        }
        Ok(Some(updated))
    }

    fn record_refund(&self, order_id: Uuid, record: &RefundRecord) -> Result<bool, DomainError> {
        let mut state = self.state();
        state.begin_write()?;

        let order = state.orders.get(&order_id).ok_or(DomainError::NotFound)?;
        if order.status != record.expected_status {
            return Ok(false);
        }
        let refund_total = &order.refund_total + &record.amount;
        if refund_total > order.total {
            return Err(DomainError::Internal(format!(
                "refund total {} would exceed order total {}",
                refund_total, order.total
            )));
        }

        if let Some(items) = state.items.get_mut(&order_id) {
            for refund in &record.items {
                if let Some(item) = items.iter_mut().find(|i| i.id == refund.item_id) {
                    item.status = OrderItemStatus::InitiatedRefund;
                    item.refund_id = Some(record.refund_id.clone());
                    item.refunded_amount = Some(refund.amount.clone());
                }
            }
        }

        let order = state.order_mut(order_id)?;
        order.refund_total = refund_total;
        if let Some(next) = record.next_status {
            order.status = next;
        }
        order.updated_at = Utc::now();
        let (customer_id, reference) = (order.customer_id, order.order_reference.clone());

        state.outbox.push(OutboxMessage::refund_initiated(
            order_id,
            &record.refund_id,
            &record.amount,
        ));
        if let Some(next) = record.next_status {
            state.outbox.push(OutboxMessage::status_changed(
                order_id,
                customer_id,
                &reference,
                next,
            ));
        }
        Ok(true)
    }

    fn settle_refund(&self, settlement: &RefundSettlement) -> Result<(), DomainError> {
        let mut state = self.state();
        state.begin_write()?;

        if let Some(items) = state.items.get_mut(&settlement.order_id) {
            for item in items.iter_mut().filter(|i| {
                settlement.item_ids.contains(&i.id)
                    && i.status == OrderItemStatus::InitiatedRefund
                    && i.refund_id.as_deref() == Some(settlement.refund_id.as_str())
            }) {
                item.status = OrderItemStatus::Refunded;
                item.refunded_at = Some(settlement.refunded_at);
            }
        }
        state.outbox.push(OutboxMessage::refund_settled(
            settlement.order_id,
            &settlement.refund_id,
            &settlement.item_ids,
        ));

        if settlement.mark_order_refunded {
            let order = state.order_mut(settlement.order_id)?;
            if order.status.accepts_refund() {
                order.status = OrderStatus::Refunded;
                order.updated_at = Utc::now();
                let message = OutboxMessage::status_changed(
                    order.id,
                    order.customer_id,
                    &order.order_reference,
                    OrderStatus::Refunded,
                );
                state.outbox.push(message);
            }
        }
        Ok(())
    }
}
