use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::payment::ProviderKind;

/// Aggregate status of an order.
///
/// ```text
/// Pending ──► PaymentSuccess ──► Processing ──► Packed ──► Shipped ──► Delivered
///    │              │                 │                       │
///    │              ├──► Cancelled    └──► FulfillmentFailed   └──► ReturnRequested ──► Returned ──► Refunded
///    │              └──► Refunded
///    ├──► PaymentFailed
///    └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PaymentSuccess,
    PaymentFailed,
    Processing,
    Packed,
    Shipped,
    Delivered,
    FulfillmentFailed,
    ReturnRequested,
    Returned,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentSuccess => "PAYMENT_SUCCESS",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Packed => "PACKED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::FulfillmentFailed => "FULFILLMENT_FAILED",
            OrderStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Transitions allowed through the guarded status writes.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, PaymentSuccess | PaymentFailed | Cancelled)
                | (PaymentSuccess, Processing | Cancelled | Refunded)
                | (Processing, Packed | FulfillmentFailed)
                | (Packed, Shipped)
                | (Shipped, Delivered | ReturnRequested)
                | (ReturnRequested, Returned)
                | (Returned, Refunded)
        )
    }

    /// Only pending and paid-but-unfulfilled orders may be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PaymentSuccess)
    }

    /// A captured payment exists and has not been fully given back.
    pub fn accepts_refund(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::PaymentFailed
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Refunded | OrderStatus::PaymentFailed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => OrderStatus::Pending,
            "PAYMENT_SUCCESS" => OrderStatus::PaymentSuccess,
            "PAYMENT_FAILED" => OrderStatus::PaymentFailed,
            "PROCESSING" => OrderStatus::Processing,
            "PACKED" => OrderStatus::Packed,
            "SHIPPED" => OrderStatus::Shipped,
            "DELIVERED" => OrderStatus::Delivered,
            "FULFILLMENT_FAILED" => OrderStatus::FulfillmentFailed,
            "RETURN_REQUESTED" => OrderStatus::ReturnRequested,
            "RETURNED" => OrderStatus::Returned,
            "CANCELLED" => OrderStatus::Cancelled,
            "REFUNDED" => OrderStatus::Refunded,
            other => {
                return Err(DomainError::InvalidInput(format!(
                    "unknown order status '{}'",
                    other
                )))
            }
        })
    }
}

/// Per-item status, tracked independently of the order's aggregate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    ReturnRequested,
    Returned,
    InitiatedRefund,
    Refunded,
}

impl OrderItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Pending => "PENDING",
            OrderItemStatus::Processing => "PROCESSING",
            OrderItemStatus::Shipped => "SHIPPED",
            OrderItemStatus::Delivered => "DELIVERED",
            OrderItemStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderItemStatus::Returned => "RETURNED",
            OrderItemStatus::InitiatedRefund => "INITIATED_REFUND",
            OrderItemStatus::Refunded => "REFUNDED",
        }
    }

    pub fn can_transition_to(&self, next: OrderItemStatus) -> bool {
        use OrderItemStatus::*;
        match next {
            InitiatedRefund => self.is_refundable(),
            Refunded => *self == InitiatedRefund,
            ReturnRequested => matches!(self, Pending | Processing | Shipped | Delivered),
            Returned => *self == ReturnRequested,
            Processing => *self == Pending,
            Shipped => *self == Processing,
            Delivered => *self == Shipped,
            Pending => false,
        }
    }

    /// Not yet part of any refund.
    pub fn is_refundable(&self) -> bool {
        !matches!(
            self,
            OrderItemStatus::InitiatedRefund | OrderItemStatus::Refunded
        )
    }
}

impl fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => OrderItemStatus::Pending,
            "PROCESSING" => OrderItemStatus::Processing,
            "SHIPPED" => OrderItemStatus::Shipped,
            "DELIVERED" => OrderItemStatus::Delivered,
            "RETURN_REQUESTED" => OrderItemStatus::ReturnRequested,
            "RETURNED" => OrderItemStatus::Returned,
            "INITIATED_REFUND" => OrderItemStatus::InitiatedRefund,
            "REFUNDED" => OrderItemStatus::Refunded,
            other => {
                return Err(DomainError::InvalidInput(format!(
                    "unknown order item status '{}'",
                    other
                )))
            }
        })
    }
}

/// Delivery address frozen into the order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub full_name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: String,
    pub country: String,
    pub postal: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDimensions {
    pub weight: Option<BigDecimal>,
    pub length: Option<BigDecimal>,
    pub width: Option<BigDecimal>,
    pub height: Option<BigDecimal>,
}

/// Fulfillment fields owned by the fulfillment system and passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub message: Option<String>,
    pub shipment_date: Option<DateTime<Utc>>,
    pub freight_charge: Option<BigDecimal>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
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
    pub delivery: DeliveryAddress,
    pub stripe_payment_intent_id: Option<String>,
    pub authorize_net_payment_id: Option<String>,
    pub status: OrderStatus,
    pub fulfillment: Fulfillment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The gateway payment id for whichever provider charged this order.
    pub fn payment_id(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Stripe => self.stripe_payment_intent_id.as_deref(),
            ProviderKind::AuthorizeNet => self.authorize_net_payment_id.as_deref(),
        }
    }

    /// Amount still available for refunds.
    pub fn refundable_balance(&self) -> BigDecimal {
        &self.total - &self.refund_total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub dimensions: ItemDimensions,
    pub price: BigDecimal,
    pub quantity: i32,
    pub status: OrderItemStatus,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<BigDecimal>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.quantity)
    }

    /// Part of a refund that covered all of its units.
    pub fn is_fully_refunded(&self) -> bool {
        !self.status.is_refundable()
            && self
                .refunded_amount
                .as_ref()
                .is_some_and(|amount| *amount >= self.line_total())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<Order>,
    /// Pass back as `cursor` to fetch the next (older) page.
    pub next_cursor: Option<Uuid>,
}

/// Partial update applied by the fulfillment system.
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub fulfillment_message: Option<Option<String>>,
    pub shipment_date: Option<Option<DateTime<Utc>>>,
    pub freight_charge: Option<Option<BigDecimal>>,
    pub tracking_number: Option<Option<String>>,
    pub tracking_url: Option<Option<String>>,
    pub items: Vec<OrderItemPatch>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.fulfillment_message.is_none()
            && self.shipment_date.is_none()
            && self.freight_charge.is_none()
            && self.tracking_number.is_none()
            && self.tracking_url.is_none()
            && self.items.is_empty()
    }

    pub(crate) fn apply_to(&self, fulfillment: &mut Fulfillment) {
        if let Some(v) = &self.fulfillment_message {
            fulfillment.message = v.clone();
        }
        if let Some(v) = &self.shipment_date {
            fulfillment.shipment_date = *v;
        }
        if let Some(v) = &self.freight_charge {
            fulfillment.freight_charge = v.clone();
        }
        if let Some(v) = &self.tracking_number {
            fulfillment.tracking_number = v.clone();
        }
        if let Some(v) = &self.tracking_url {
            fulfillment.tracking_url = v.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemPatch {
    pub item_id: Uuid,
    pub status: Option<OrderItemStatus>,
    pub sku: Option<String>,
}

/// Refund bookkeeping for one item, written when a refund is initiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRefund {
    pub item_id: Uuid,
    pub amount: BigDecimal,
}

/// Everything a successful `RefundOrder` persists, applied atomically.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    /// Gateway refund id, later matched by the refund-succeeded callback.
    pub refund_id: String,
    pub items: Vec<ItemRefund>,
    pub amount: BigDecimal,
    /// The order status the refund was computed against.
    pub expected_status: OrderStatus,
    pub next_status: Option<OrderStatus>,
}

/// Items confirmed refunded by the gateway, applied atomically.
#[derive(Debug, Clone)]
pub struct RefundSettlement {
    pub order_id: Uuid,
    pub refund_id: String,
    pub item_ids: Vec<Uuid>,
    pub refunded_at: DateTime<Utc>,
    pub mark_order_refunded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 12] = [
        OrderStatus::Pending,
        OrderStatus::PaymentSuccess,
        OrderStatus::PaymentFailed,
        OrderStatus::Processing,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::FulfillmentFailed,
        OrderStatus::ReturnRequested,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    #[test]
    fn pending_resolves_to_payment_outcome() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentSuccess));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn fulfillment_path_is_linear() {
        assert!(OrderStatus::PaymentSuccess.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Packed));
        assert!(OrderStatus::Packed.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Packed.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn returns_end_in_refund() {
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::ReturnRequested));
        assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Returned.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn only_pending_and_paid_orders_cancel() {
        let cancellable: Vec<_> = ALL.iter().filter(|s| s.can_cancel()).collect();
        assert_eq!(
            cancellable,
            vec![&OrderStatus::Pending, &OrderStatus::PaymentSuccess]
        );
    }

    #[test]
    fn status_string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPING".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_like_storage_form() {
        let json = serde_json::to_string(&OrderStatus::PaymentSuccess).unwrap();
        assert_eq!(json, "\"PAYMENT_SUCCESS\"");
    }

    #[test]
    fn item_refund_path() {
        assert!(OrderItemStatus::Pending.can_transition_to(OrderItemStatus::InitiatedRefund));
        assert!(OrderItemStatus::Returned.can_transition_to(OrderItemStatus::InitiatedRefund));
        assert!(OrderItemStatus::InitiatedRefund.can_transition_to(OrderItemStatus::Refunded));
        assert!(!OrderItemStatus::Pending.can_transition_to(OrderItemStatus::Refunded));
        assert!(!OrderItemStatus::Refunded.can_transition_to(OrderItemStatus::InitiatedRefund));
    }

    #[test]
    fn item_return_path() {
        assert!(OrderItemStatus::Delivered.can_transition_to(OrderItemStatus::ReturnRequested));
        assert!(OrderItemStatus::ReturnRequested.can_transition_to(OrderItemStatus::Returned));
        assert!(!OrderItemStatus::Returned.can_transition_to(OrderItemStatus::Shipped));
    }

    #[test]
    fn patch_clears_and_sets_fulfillment_fields() {
        let mut fulfillment = Fulfillment {
            message: Some("awaiting pickup".to_string()),
            tracking_number: Some("1Z999".to_string()),
            ..Fulfillment::default()
        };
        let patch = OrderPatch {
            fulfillment_message: Some(None),
            tracking_url: Some(Some("https://track.example/1Z999".to_string())),
            ..OrderPatch::default()
        };

        patch.apply_to(&mut fulfillment);

        assert_eq!(fulfillment.message, None);
        assert_eq!(fulfillment.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(
            fulfillment.tracking_url.as_deref(),
            Some("https://track.example/1Z999")
        );
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(OrderPatch::default().is_empty());
        assert!(!OrderPatch {
            status: Some(OrderStatus::Processing),
            ..OrderPatch::default()
        }
        .is_empty());
    }
}
