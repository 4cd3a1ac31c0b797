use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::outbox::{OutboxMessage, AGGREGATE_TYPE};
use crate::domain::errors::DomainError;
use crate::domain::order::{
    DeliveryAddress, Fulfillment, ItemDimensions, Order, OrderItem, OrderPatch,
};
use crate::schema::{order_items, order_outbox, orders};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub cart_id: Uuid,
    pub order_reference: String,
    pub tax_amount: BigDecimal,
    pub subtotal: BigDecimal,
    pub shipping_rate: BigDecimal,
    pub total: BigDecimal,
    pub refund_total: BigDecimal,
    pub currency: String,
    pub delivery_full_name: String,
    pub delivery_address: String,
    pub delivery_city: Option<String>,
    pub delivery_state: String,
    pub delivery_country: String,
    pub delivery_postal: String,
    pub delivery_phone: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub authorize_net_payment_id: Option<String>,
    pub status: String,
    pub fulfillment_message: Option<String>,
    pub shipment_date: Option<DateTime<Utc>>,
    pub freight_charge: Option<BigDecimal>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderRow {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id,
            customer_id: o.customer_id,
            cart_id: o.cart_id,
            order_reference: o.order_reference.clone(),
            tax_amount: o.tax_amount.clone(),
            subtotal: o.subtotal.clone(),
            shipping_rate: o.shipping_rate.clone(),
            total: o.total.clone(),
            refund_total: o.refund_total.clone(),
            currency: o.currency.clone(),
            delivery_full_name: o.delivery.full_name.clone(),
            delivery_address: o.delivery.address.clone(),
            delivery_city: o.delivery.city.clone(),
            delivery_state: o.delivery.state.clone(),
            delivery_country: o.delivery.country.clone(),
            delivery_postal: o.delivery.postal.clone(),
            delivery_phone: o.delivery.phone.clone(),
            stripe_payment_intent_id: o.stripe_payment_intent_id.clone(),
            authorize_net_payment_id: o.authorize_net_payment_id.clone(),
            status: o.status.as_str().to_string(),
            fulfillment_message: o.fulfillment.message.clone(),
            shipment_date: o.fulfillment.shipment_date,
            freight_charge: o.fulfillment.freight_charge.clone(),
            tracking_number: o.fulfillment.tracking_number.clone(),
            tracking_url: o.fulfillment.tracking_url.clone(),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: r.id,
            customer_id: r.customer_id,
            cart_id: r.cart_id,
            order_reference: r.order_reference,
            tax_amount: r.tax_amount,
            subtotal: r.subtotal,
            shipping_rate: r.shipping_rate,
            total: r.total,
            refund_total: r.refund_total,
            currency: r.currency,
            delivery: DeliveryAddress {
                full_name: r.delivery_full_name,
                address: r.delivery_address,
                city: r.delivery_city,
                state: r.delivery_state,
                country: r.delivery_country,
                postal: r.delivery_postal,
                phone: r.delivery_phone,
            },
            stripe_payment_intent_id: r.stripe_payment_intent_id,
            authorize_net_payment_id: r.authorize_net_payment_id,
            status: r.status.parse()?,
            fulfillment: Fulfillment {
                message: r.fulfillment_message,
                shipment_date: r.shipment_date,
                freight_charge: r.freight_charge,
                tracking_number: r.tracking_number,
                tracking_url: r.tracking_url,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Partial update of an order row; `None` fields are left out of the SET.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderChangeset {
    pub status: Option<String>,
    pub fulfillment_message: Option<Option<String>>,
    pub shipment_date: Option<Option<DateTime<Utc>>>,
    pub freight_charge: Option<Option<BigDecimal>>,
    pub tracking_number: Option<Option<String>>,
    pub tracking_url: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderChangeset {
    pub fn from_patch(patch: &OrderPatch, now: DateTime<Utc>) -> Self {
        Self {
            status: patch.status.map(|s| s.as_str().to_string()),
            fulfillment_message: patch.fulfillment_message.clone(),
            shipment_date: patch.shipment_date,
            freight_charge: patch.freight_charge.clone(),
            tracking_number: patch.tracking_number.clone(),
            tracking_url: patch.tracking_url.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub weight: Option<BigDecimal>,
    pub length: Option<BigDecimal>,
    pub width: Option<BigDecimal>,
    pub height: Option<BigDecimal>,
    pub price: BigDecimal,
    pub quantity: i32,
    pub status: String,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<BigDecimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = DomainError;

    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            variant_id: r.variant_id,
            sku: r.sku,
            name: r.name,
            image: r.image,
            dimensions: ItemDimensions {
                weight: r.weight,
                length: r.length,
                width: r.width,
                height: r.height,
            },
            price: r.price,
            quantity: r.quantity,
            status: r.status.parse()?,
            refund_id: r.refund_id,
            refunded_amount: r.refunded_amount,
            refunded_at: r.refunded_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub weight: Option<BigDecimal>,
    pub length: Option<BigDecimal>,
    pub width: Option<BigDecimal>,
    pub height: Option<BigDecimal>,
    pub price: BigDecimal,
    pub quantity: i32,
    pub status: String,
    /// Index of the item in the cart snapshot; fixes refund matching order.
    pub position: i32,
}

impl NewOrderItemRow {
    pub fn new(i: &OrderItem, position: i32) -> Self {
        Self {
            id: i.id,
            order_id: i.order_id,
            product_id: i.product_id,
            variant_id: i.variant_id,
            sku: i.sku.clone(),
            name: i.name.clone(),
            image: i.image.clone(),
            weight: i.dimensions.weight.clone(),
            length: i.dimensions.length.clone(),
            width: i.dimensions.width.clone(),
            height: i.dimensions.height.clone(),
            price: i.price.clone(),
            quantity: i.quantity,
            status: i.status.as_str().to_string(),
            position,
        }
    }
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = order_items)]
pub struct OrderItemChangeset {
    pub status: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = order_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: Value,
}

impl From<OutboxMessage> for NewOutboxEventRow {
    fn from(m: OutboxMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_type: AGGREGATE_TYPE.to_string(),
            aggregate_id: m.aggregate_id.to_string(),
            event_type: m.event_type,
            idempotency_key: m.idempotency_key,
            payload: m.payload,
        }
    }
}
