use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{DomainError, ServiceError};
use super::order::{
    DeliveryAddress, ItemDimensions, Order, OrderItem, OrderPatch, OrderStatus, RefundRecord,
    RefundSettlement,
};
use super::payment::ProviderKind;

/// Durable storage for orders and their items.
///
/// Every method that changes an order's status also records an outbox event
/// in the same transaction.
pub trait OrderRepository: Send + Sync + 'static {
    /// Insert the order and its items and flip the cart to "purchased", all
    /// in one transaction. Fails without writing anything if the cart is not
    /// active.
    fn create_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;

    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, DomainError>;

    fn find_by_payment_id(
        &self,
        provider: ProviderKind,
        payment_id: &str,
    ) -> Result<Option<Order>, DomainError>;

    fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError>;

    fn find_items_by_refund_id(&self, refund_id: &str) -> Result<Vec<OrderItem>, DomainError>;

    fn reference_exists(&self, reference: &str) -> Result<bool, DomainError>;

    /// Newest first; `cursor` is the id of the last order of the previous page.
    fn list_for_customer(
        &self,
        customer_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Order>, DomainError>;

    /// Compare-and-swap on the status column. Returns `false` when the stored
    /// status was no longer `expected`.
    fn transition_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, DomainError>;

    /// Merge `patch` into the order and its items. Returns `None` when the
    /// stored status was no longer `expected`.
    fn apply_patch(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, DomainError>;

    /// Persist an initiated refund. Returns `false` when the stored status was
    /// no longer `record.expected_status`.
    fn record_refund(&self, order_id: Uuid, record: &RefundRecord) -> Result<bool, DomainError>;

    /// Mark items refunded once the gateway confirms the refund.
    fn settle_refund(&self, settlement: &RefundSettlement) -> Result<(), DomainError>;
}

impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    fn create_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError> {
        (**self).create_order(order, items)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        (**self).find_by_id(id)
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, DomainError> {
        (**self).find_by_reference(reference)
    }

    fn find_by_payment_id(
        &self,
        provider: ProviderKind,
        payment_id: &str,
    ) -> Result<Option<Order>, DomainError> {
        (**self).find_by_payment_id(provider, payment_id)
    }

    fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        (**self).find_items(order_id)
    }

    fn find_items_by_refund_id(&self, refund_id: &str) -> Result<Vec<OrderItem>, DomainError> {
        (**self).find_items_by_refund_id(refund_id)
    }

    fn reference_exists(&self, reference: &str) -> Result<bool, DomainError> {
        (**self).reference_exists(reference)
    }

    fn list_for_customer(
        &self,
        customer_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Order>, DomainError> {
        (**self).list_for_customer(customer_id, cursor, limit)
    }

    fn transition_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, DomainError> {
        (**self).transition_status(order_id, expected, next)
    }

    fn apply_patch(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, DomainError> {
        (**self).apply_patch(order_id, expected, patch)
    }

    fn record_refund(&self, order_id: Uuid, record: &RefundRecord) -> Result<bool, DomainError> {
        (**self).record_refund(order_id, record)
    }

    fn settle_refund(&self, settlement: &RefundSettlement) -> Result<(), DomainError> {
        (**self).settle_refund(settlement)
    }
}

// ── Collaborator contracts ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub tax_amount: BigDecimal,
    pub tax_currency: String,
    pub shipping_rate_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub price: BigDecimal,
    pub quantity: i32,
    #[serde(default)]
    pub dimensions: ItemDimensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartShippingRate {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub amount: BigDecimal,
    pub carrier: String,
    pub service_type: String,
    pub eta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub stripe_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
}

/// Body of the order-status-changed webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStatusNotification {
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub order_reference: String,
    pub status: OrderStatus,
}

#[async_trait]
pub trait CartService: Send + Sync {
    /// The customer's active cart.
    async fn get_cart(&self, customer_id: Uuid) -> Result<Cart, ServiceError>;

    async fn get_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, ServiceError>;

    async fn get_shipping_rate(&self, rate_id: Uuid) -> Result<CartShippingRate, ServiceError>;
}

#[async_trait]
pub trait AddressService: Send + Sync {
    async fn get_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<DeliveryAddress, ServiceError>;
}

#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn get_customer(&self, customer_id: Uuid) -> Result<Customer, ServiceError>;
}

#[async_trait]
pub trait InventoryService: Send + Sync {
    /// `items` are the order's frozen copy of the cart items; the delivery
    /// address travels in `order.delivery`.
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        customer: &Customer,
    ) -> Result<(), ServiceError>;

    async fn update_order_status(
        &self,
        order: &Order,
        customer: &Customer,
        status: OrderStatus,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait WebhookService: Send + Sync {
    async fn notify_order_status_change(
        &self,
        notification: &OrderStatusNotification,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait WishlistService: Send + Sync {
    async fn bulk_remove(&self, customer_id: Uuid, product_ids: &[Uuid]) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ProductService: Send + Sync {
    async fn get_variant(&self, variant_id: Uuid) -> Result<ProductVariant, ServiceError>;
}
