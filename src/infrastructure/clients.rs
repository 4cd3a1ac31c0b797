//! JSON-over-HTTP clients for the collaborating services.
//!
//! The commerce services (cart, address, customer, inventory, webhook,
//! wishlist, product) share one base URL. Payments go through a separate
//! adapter service that receives the provider-specific payload built by
//! [`ProviderKind`] and answers with the provider's raw id and status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::ServiceError;
use crate::domain::order::{DeliveryAddress, Order, OrderItem, OrderStatus};
use crate::domain::payment::{GatewayResponse, PaymentGateway, ProviderCharge, ProviderKind, ProviderRefund};
use crate::domain::ports::{
    AddressService, Cart, CartItem, CartService, CartShippingRate, Customer, CustomerService,
    InventoryService, OrderStatusNotification, ProductService, ProductVariant, WebhookService,
    WishlistService,
};

fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Unavailable(e.to_string()))
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Unavailable(e.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(alias = "message")]
    error: Option<String>,
}

/// Map a non-success response to a [`ServiceError`].
fn status_error(what: &str, status: StatusCode, body: &str) -> ServiceError {
    if status == StatusCode::NOT_FOUND {
        return ServiceError::NotFound(what.to_string());
    }
    if status.is_server_error() {
        return ServiceError::Unavailable(format!("{} answered {}", what, status));
    }
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.code.clone())
        .unwrap_or_else(|| status.as_u16().to_string());
    let message = parsed
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.to_string());
    ServiceError::rejected(code, message)
}

async fn check(what: &str, resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(what, status, &body))
}

async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T, ServiceError> {
    check(what, resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ServiceError::Unavailable(format!("{}: malformed response: {}", what, e)))
}

// ── Commerce services ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CommerceServicesClient {
    client: Client,
    base_url: String,
}

impl CommerceServicesClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, what: &str, path: &str) -> Result<T, ServiceError> {
        let resp = self.client.get(self.url(path)).send().await.map_err(transport)?;
        decode(what, resp).await
    }

    async fn send_json(
        &self,
        what: &str,
        builder: reqwest::RequestBuilder,
        body: serde_json::Value,
    ) -> Result<(), ServiceError> {
        let resp = builder.json(&body).send().await.map_err(transport)?;
        check(what, resp).await.map(|_| ())
    }
}

#[async_trait]
impl CartService for CommerceServicesClient {
    async fn get_cart(&self, customer_id: Uuid) -> Result<Cart, ServiceError> {
        self.get("cart", &format!("/customers/{}/cart", customer_id))
            .await
    }

    async fn get_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, ServiceError> {
        self.get("cart items", &format!("/carts/{}/items", cart_id))
            .await
    }

    async fn get_shipping_rate(&self, rate_id: Uuid) -> Result<CartShippingRate, ServiceError> {
        self.get("shipping rate", &format!("/shipping-rates/{}", rate_id))
            .await
    }
}

#[async_trait]
impl AddressService for CommerceServicesClient {
    async fn get_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<DeliveryAddress, ServiceError> {
        self.get(
            "address",
            &format!("/customers/{}/addresses/{}", customer_id, address_id),
        )
        .await
    }
}

#[async_trait]
impl CustomerService for CommerceServicesClient {
    async fn get_customer(&self, customer_id: Uuid) -> Result<Customer, ServiceError> {
        self.get("customer", &format!("/customers/{}", customer_id))
            .await
    }
}

#[async_trait]
impl InventoryService for CommerceServicesClient {
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        customer: &Customer,
    ) -> Result<(), ServiceError> {
        let body = json!({
            "order": order,
            "items": items,
            "address": order.delivery,
            "customer": customer,
        });
        let builder = self.client.post(self.url("/inventory/orders"));
        self.send_json("inventory order", builder, body).await
    }

    async fn update_order_status(
        &self,
        order: &Order,
        customer: &Customer,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        let body = json!({
            "order_reference": order.order_reference,
            "customer": customer,
            "status": status,
        });
        let builder = self
            .client
            .put(self.url(&format!("/inventory/orders/{}/status", order.id)));
        self.send_json("inventory order status", builder, body).await
    }
}

#[async_trait]
impl WebhookService for CommerceServicesClient {
    async fn notify_order_status_change(
        &self,
        notification: &OrderStatusNotification,
    ) -> Result<(), ServiceError> {
        let body = serde_json::to_value(notification)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let builder = self.client.post(self.url("/webhooks/order-status"));
        self.send_json("order status webhook", builder, body).await
    }
}

#[async_trait]
impl WishlistService for CommerceServicesClient {
    async fn bulk_remove(&self, customer_id: Uuid, product_ids: &[Uuid]) -> Result<(), ServiceError> {
        let builder = self
            .client
            .post(self.url(&format!("/customers/{}/wishlist/bulk-remove", customer_id)));
        self.send_json("wishlist", builder, json!({ "product_ids": product_ids }))
            .await
    }
}

#[async_trait]
impl ProductService for CommerceServicesClient {
    async fn get_variant(&self, variant_id: Uuid) -> Result<ProductVariant, ServiceError> {
        self.get("product variant", &format!("/product-variants/{}", variant_id))
            .await
    }
}

// ── Payment adapter ──────────────────────────────────────────────────────────

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    provider: ProviderKind,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, provider: ProviderKind, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn create_payment(&self, charge: ProviderCharge) -> Result<GatewayResponse, ServiceError> {
        let resp = self
            .client
            .post(format!("{}/payments", self.base_url))
            .json(&charge)
            .send()
            .await
            .map_err(transport)?;
        decode("payment", resp).await
    }

    async fn refund(&self, refund: ProviderRefund) -> Result<GatewayResponse, ServiceError> {
        let resp = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .json(&refund)
            .send()
            .await
            .map_err(transport)?;
        decode("refund", resp).await
    }
}
