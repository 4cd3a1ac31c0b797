use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::order::{Order, OrderItem, OrderStatus};

pub const AGGREGATE_TYPE: &str = "Order";

/// An event written to `order_outbox` in the same transaction as the change
/// it describes. A CDC relay publishes these to the topic named after
/// `aggregate_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: Value,
}

impl OutboxMessage {
    fn new(aggregate_id: Uuid, event_type: &str, discriminator: &str, payload: Value) -> Self {
        Self {
            aggregate_id,
            event_type: event_type.to_string(),
            idempotency_key: format!("{}:{}:{}", aggregate_id, event_type, discriminator),
            payload,
        }
    }

    pub fn order_created(order: &Order, items: &[OrderItem]) -> Self {
        let lines: Vec<Value> = items
            .iter()
            .map(|i| {
                json!({
                    "item_id": i.id,
                    "product_id": i.product_id,
                    "sku": i.sku,
                    "quantity": i.quantity,
                    "price": i.price.to_string()
                })
            })
            .collect();
        Self::new(
            order.id,
            "OrderCreated",
            order.status.as_str(),
            json!({
                "order_id": order.id,
                "order_reference": order.order_reference,
                "customer_id": order.customer_id,
                "status": order.status,
                "total": order.total.to_string(),
                "currency": order.currency,
                "lines": lines
            }),
        )
    }

    pub fn status_changed(
        order_id: Uuid,
        customer_id: Uuid,
        order_reference: &str,
        status: OrderStatus,
    ) -> Self {
        Self::new(
            order_id,
            "OrderStatusChanged",
            status.as_str(),
            json!({
                "order_id": order_id,
                "order_reference": order_reference,
                "customer_id": customer_id,
                "status": status
            }),
        )
    }

    pub fn refund_initiated(order_id: Uuid, refund_id: &str, amount: &BigDecimal) -> Self {
        Self::new(
            order_id,
            "OrderRefundInitiated",
            refund_id,
            json!({
                "order_id": order_id,
                "refund_id": refund_id,
                "amount": amount.to_string()
            }),
        )
    }

    pub fn refund_settled(order_id: Uuid, refund_id: &str, item_ids: &[Uuid]) -> Self {
        Self::new(
            order_id,
            "OrderRefundSettled",
            refund_id,
            json!({
                "order_id": order_id,
                "refund_id": refund_id,
                "item_ids": item_ids
            }),
        )
    }
}
