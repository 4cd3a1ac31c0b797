use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{customer_id, SharedOrderService};
use crate::application::order_service::{CreateOrderInput, CreatedOrder, RefundOrderResponse};
use crate::domain::order::{
    Order, OrderItem, OrderItemPatch, OrderItemStatus, OrderPatch, OrderStatus,
};
use crate::domain::refund::RefundLine;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub address_id: Uuid,
    /// Falls back to the shipping rate selected on the cart.
    pub shipping_rate_id: Option<Uuid>,
    /// Saved payment method at the configured provider.
    pub payment_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub quantity: i32,
    pub status: String,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<String>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(i: OrderItem) -> Self {
        Self {
            id: i.id,
            product_id: i.product_id,
            variant_id: i.variant_id,
            sku: i.sku,
            name: i.name,
            image: i.image,
            price: i.price.to_string(),
            quantity: i.quantity,
            status: i.status.to_string(),
            refund_id: i.refund_id,
            refunded_amount: i.refunded_amount.map(|a| a.to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub order_reference: String,
    pub status: String,
    pub total: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<CreatedOrder> for CreateOrderResponse {
    fn from(c: CreatedOrder) -> Self {
        Self {
            order_id: c.order_id,
            order_reference: c.order_reference,
            status: c.status.to_string(),
            total: c.total.to_string(),
            items: c.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_reference: String,
    pub customer_id: Uuid,
    pub status: String,
    pub currency: String,
    pub subtotal: String,
    pub tax_amount: String,
    pub shipping_rate: String,
    pub total: String,
    pub refund_total: String,
    pub delivery_full_name: String,
    pub delivery_address: String,
    pub delivery_city: Option<String>,
    pub delivery_state: String,
    pub delivery_country: String,
    pub delivery_postal: String,
    pub fulfillment_message: Option<String>,
    pub shipment_date: Option<String>,
    pub freight_charge: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Empty in list responses.
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn new(o: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: o.id,
            order_reference: o.order_reference,
            customer_id: o.customer_id,
            status: o.status.to_string(),
            currency: o.currency,
            subtotal: o.subtotal.to_string(),
            tax_amount: o.tax_amount.to_string(),
            shipping_rate: o.shipping_rate.to_string(),
            total: o.total.to_string(),
            refund_total: o.refund_total.to_string(),
            delivery_full_name: o.delivery.full_name,
            delivery_address: o.delivery.address,
            delivery_city: o.delivery.city,
            delivery_state: o.delivery.state,
            delivery_country: o.delivery.country,
            delivery_postal: o.delivery.postal,
            fulfillment_message: o.fulfillment.message,
            shipment_date: o.fulfillment.shipment_date.map(|d| d.to_rfc3339()),
            freight_charge: o.fulfillment.freight_charge.map(|f| f.to_string()),
            tracking_number: o.fulfillment.tracking_number,
            tracking_url: o.fulfillment.tracking_url,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Id of the last order of the previous page.
    pub cursor: Option<Uuid>,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub next_cursor: Option<Uuid>,
}

// ── Fulfillment patch ────────────────────────────────────────────────────────

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemPatchRequest {
    pub id: Uuid,
    #[schema(value_type = Option<String>, example = "SHIPPED")]
    pub status: Option<OrderItemStatus>,
    pub sku: Option<String>,
}

/// Fields omitted are left untouched; `null` clears a field.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    #[schema(value_type = Option<String>, example = "PROCESSING")]
    pub status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub fulfillment_message: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, example = "2024-06-01T12:00:00Z")]
    pub shipment_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, example = "12.50")]
    pub freight_charge: Option<Option<BigDecimal>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub tracking_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub tracking_url: Option<Option<String>>,
    #[serde(default)]
    pub items: Vec<OrderItemPatchRequest>,
}

impl From<UpdateOrderRequest> for OrderPatch {
    fn from(r: UpdateOrderRequest) -> Self {
        OrderPatch {
            status: r.status,
            fulfillment_message: r.fulfillment_message,
            shipment_date: r.shipment_date,
            freight_charge: r.freight_charge,
            tracking_number: r.tracking_number,
            tracking_url: r.tracking_url,
            items: r
                .items
                .into_iter()
                .map(|i| OrderItemPatch {
                    item_id: i.id,
                    status: i.status,
                    sku: i.sku,
                })
                .collect(),
        }
    }
}

// ── Refunds ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundLineRequest {
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundOrderRequest {
    pub items: Vec<RefundLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundableItemResponse {
    pub item_id: Uuid,
    pub sku: String,
    pub quantity: i32,
    pub price: String,
    pub amount: String,
    pub refund_initiated: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundOrderResponseBody {
    pub refund_id: String,
    pub total_refundable_amount: String,
    pub refundable_items: Vec<RefundableItemResponse>,
    pub order_status: String,
}

impl From<RefundOrderResponse> for RefundOrderResponseBody {
    fn from(r: RefundOrderResponse) -> Self {
        Self {
            refund_id: r.refund_id,
            total_refundable_amount: r.total_refundable_amount.to_string(),
            refundable_items: r
                .refundable_items
                .into_iter()
                .map(|i| RefundableItemResponse {
                    item_id: i.item_id,
                    sku: i.sku,
                    quantity: i.quantity,
                    price: i.price.to_string(),
                    amount: i.amount.to_string(),
                    refund_initiated: i.refund_initiated,
                })
                .collect(),
            order_status: r.order_status.to_string(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Turns the customer's active cart into an order and charges it. The order,
/// its items and the cart status flip are committed in one transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    params(("X-Customer-Id" = Uuid, Header, description = "Authenticated customer")),
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Missing customer, empty cart or bad shipping rate"),
        (status = 404, description = "Address not found"),
        (status = 502, description = "Payment provider error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<SharedOrderService>,
    req: HttpRequest,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let created = service
        .create_order(
            customer_id(&req)?,
            CreateOrderInput {
                address_id: body.address_id,
                shipping_rate_id: body.shipping_rate_id,
                payment_token: body.payment_token,
            },
        )
        .await?;

    Ok(HttpResponse::Created().json(CreateOrderResponse::from(created)))
}

/// GET /orders
///
/// The customer's orders, newest first, without their items.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("X-Customer-Id" = Uuid, Header, description = "Authenticated customer"),
        ("cursor" = Option<Uuid>, Query, description = "next_cursor of the previous page"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "A page of orders", body = ListOrdersResponse),
        (status = 400, description = "Missing customer or unknown cursor"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<SharedOrderService>,
    req: HttpRequest,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = service
        .list_orders(customer_id(&req)?, params.cursor, params.limit)
        .await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: page
            .items
            .into_iter()
            .map(|o| OrderResponse::new(o, vec![]))
            .collect(),
        next_cursor: page.next_cursor,
    }))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Customer-Id" = Uuid, Header, description = "Authenticated customer"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<SharedOrderService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let found = service
        .get_order(customer_id(&req)?, Some(path.into_inner()))
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse::new(found.order, found.items)))
}

/// POST /orders/{id}/cancel
///
/// Pending and paid orders only; no refund is issued.
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-Customer-Id" = Uuid, Header, description = "Authenticated customer"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already cancelled or past cancellation"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    service: web::Data<SharedOrderService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order = service
        .cancel_order(customer_id(&req)?, Some(path.into_inner()))
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse::new(order, vec![])))
}

/// PATCH /orders/reference/{reference}
///
/// Fulfillment callback.
#[utoipa::path(
    patch,
    path = "/orders/reference/{reference}",
    request_body = UpdateOrderRequest,
    params(("reference" = String, Path, description = "Order reference")),
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Status transition not allowed"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    service: web::Data<SharedOrderService>,
    path: web::Path<String>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order = service
        .update_order(&path.into_inner(), body.into_inner().into())
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse::new(order, vec![])))
}

/// POST /orders/reference/{reference}/refund
#[utoipa::path(
    post,
    path = "/orders/reference/{reference}/refund",
    request_body = RefundOrderRequest,
    params(("reference" = String, Path, description = "Order reference")),
    responses(
        (status = 200, description = "Refund initiated", body = RefundOrderResponseBody),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Nothing to refund, amount exceeds the order total, or order not refundable"),
        (status = 502, description = "Payment provider error"),
    ),
    tag = "orders"
)]
pub async fn refund_order(
    service: web::Data<SharedOrderService>,
    path: web::Path<String>,
    body: web::Json<RefundOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let lines = body
        .into_inner()
        .items
        .into_iter()
        .map(|l| RefundLine {
            sku: l.sku,
            quantity: l.quantity,
        })
        .collect();
    let refund = service.refund_order(&path.into_inner(), lines).await?;

    Ok(HttpResponse::Ok().json(RefundOrderResponseBody::from(refund)))
}
