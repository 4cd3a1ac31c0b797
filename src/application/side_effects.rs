//! Best-effort notifications fired after an order write has committed.
//!
//! Effects go through an in-process queue drained by a background worker.
//! Each effect runs as its own task under a deadline; failures are logged and
//! never reach the caller. Nothing here retries: the durable, replayable copy
//! of every status change is the `order_outbox` row written with it.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::Collaborators;
use crate::domain::errors::ServiceError;
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::ports::OrderStatusNotification;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub enum SideEffect {
    OrderStatusChanged(OrderStatusNotification),
    InventoryCreateOrder { order: Order, items: Vec<OrderItem> },
    InventoryUpdateStatus { order: Order, status: OrderStatus },
    WishlistPrune { order_id: Uuid, customer_id: Uuid, items: Vec<OrderItem> },
}

impl SideEffect {
    pub fn status_changed(order: &Order) -> Self {
        SideEffect::OrderStatusChanged(OrderStatusNotification {
            customer_id: order.customer_id,
            order_id: order.id,
            order_reference: order.order_reference.clone(),
            status: order.status,
        })
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            SideEffect::OrderStatusChanged(n) => n.order_id,
            SideEffect::InventoryCreateOrder { order, .. }
            | SideEffect::InventoryUpdateStatus { order, .. } => order.id,
            SideEffect::WishlistPrune { order_id, .. } => *order_id,
        }
    }

    pub fn event_type(&self) -> String {
        match self {
            SideEffect::OrderStatusChanged(n) => format!("order_status_changed.{}", n.status),
            SideEffect::InventoryCreateOrder { .. } => "inventory_create_order".to_string(),
            SideEffect::InventoryUpdateStatus { status, .. } => {
                format!("inventory_update_status.{}", status)
            }
            SideEffect::WishlistPrune { .. } => "wishlist_prune".to_string(),
        }
    }

    /// Stable per order and event, for consumers that deduplicate.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.order_id(), self.event_type())
    }
}

#[derive(Clone)]
pub struct SideEffectDispatcher {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl SideEffectDispatcher {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(collaborators: Collaborators, deadline: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SideEffect>();
        tokio::spawn(async move {
            while let Some(effect) = rx.recv().await {
                tokio::spawn(run(collaborators.clone(), effect, deadline));
            }
            log::debug!("side effect queue closed");
        });
        Self { tx }
    }

    pub fn dispatch(&self, effect: SideEffect) {
        if let Err(err) = self.tx.send(effect) {
            log::error!(
                "side effect worker is gone, dropping {}",
                err.0.idempotency_key()
            );
        }
    }
}

async fn run(collaborators: Collaborators, effect: SideEffect, deadline: Duration) {
    let key = effect.idempotency_key();
    match tokio::time::timeout(deadline, deliver(&collaborators, effect)).await {
        Ok(Ok(())) => log::debug!("side effect {} delivered", key),
        Ok(Err(e)) => log::warn!("side effect {} failed: {}", key, e),
        Err(_) => log::warn!("side effect {} timed out after {:?}", key, deadline),
    }
}

async fn deliver(c: &Collaborators, effect: SideEffect) -> Result<(), ServiceError> {
    match effect {
        SideEffect::OrderStatusChanged(notification) => {
            c.webhooks.notify_order_status_change(&notification).await
        }
        SideEffect::InventoryCreateOrder { order, items } => {
            let customer = c.customers.get_customer(order.customer_id).await?;
            c.inventory.create_order(&order, &items, &customer).await
        }
        SideEffect::InventoryUpdateStatus { order, status } => {
            let customer = c.customers.get_customer(order.customer_id).await?;
            c.inventory.update_order_status(&order, &customer, status).await
        }
        SideEffect::WishlistPrune {
            customer_id, items, ..
        } => {
            let mut product_ids = BTreeSet::new();
            for item in &items {
                let product_id = match item.variant_id {
                    Some(variant_id) => c.products.get_variant(variant_id).await?.product_id,
                    None => item.product_id,
                };
                product_ids.insert(product_id);
            }
            let product_ids: Vec<Uuid> = product_ids.into_iter().collect();
            c.wishlists.bulk_remove(customer_id, &product_ids).await
        }
    }
}
