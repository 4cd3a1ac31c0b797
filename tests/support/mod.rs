//! Recording fakes for the order service's collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use commerce_orders::application::order_service::{CreateOrderInput, OrderService};
use commerce_orders::application::side_effects::SideEffectDispatcher;
use commerce_orders::application::Collaborators;
use commerce_orders::domain::errors::ServiceError;
use commerce_orders::domain::order::{DeliveryAddress, ItemDimensions, Order, OrderItem, OrderStatus};
use commerce_orders::domain::payment::{
    GatewayResponse, PaymentGateway, ProviderCharge, ProviderKind, ProviderRefund,
};
use commerce_orders::domain::ports::{
    AddressService, Cart, CartItem, CartService, CartShippingRate, Customer, CustomerService,
    InventoryService, OrderRepository, OrderStatusNotification, ProductService, ProductVariant,
    WebhookService, WishlistService,
};
use commerce_orders::infrastructure::InMemoryOrderRepository;

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("valid decimal")
}

// ── Payment gateway ──────────────────────────────────────────────────────────

pub struct FakeGateway {
    provider: ProviderKind,
    pub payment_status: Mutex<String>,
    pub refund_status: Mutex<String>,
    pub fail_payments: Mutex<Option<ServiceError>>,
    pub charges: Mutex<Vec<ProviderCharge>>,
    pub refunds: Mutex<Vec<ProviderRefund>>,
    seq: AtomicUsize,
}

impl FakeGateway {
    pub fn new(provider: ProviderKind) -> Self {
        let (payment, refund) = match provider {
            ProviderKind::Stripe => ("processing", "succeeded"),
            ProviderKind::AuthorizeNet => ("4", "1"),
        };
        Self {
            provider,
            payment_status: Mutex::new(payment.to_string()),
            refund_status: Mutex::new(refund.to_string()),
            fail_payments: Mutex::new(None),
            charges: Mutex::new(vec![]),
            refunds: Mutex::new(vec![]),
            seq: AtomicUsize::new(0),
        }
    }

    pub fn set_payment_status(&self, status: &str) {
        *self.payment_status.lock().unwrap() = status.to_string();
    }

    pub fn set_refund_status(&self, status: &str) {
        *self.refund_status.lock().unwrap() = status.to_string();
    }

    pub fn charge_count(&self) -> usize {
        self.charges.lock().unwrap().len()
    }

    pub fn refund_requests(&self) -> Vec<ProviderRefund> {
        self.refunds.lock().unwrap().clone()
    }

    pub fn last_payment_id(&self) -> String {
        format!("pay_{}", self.seq.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn create_payment(&self, charge: ProviderCharge) -> Result<GatewayResponse, ServiceError> {
        self.charges.lock().unwrap().push(charge);
        if let Some(err) = self.fail_payments.lock().unwrap().clone() {
            return Err(err);
        }
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayResponse {
            id: format!("pay_{}", n),
            status: self.payment_status.lock().unwrap().clone(),
        })
    }

    async fn refund(&self, refund: ProviderRefund) -> Result<GatewayResponse, ServiceError> {
        let n = {
            let mut refunds = self.refunds.lock().unwrap();
            refunds.push(refund);
            refunds.len()
        };
        Ok(GatewayResponse {
            id: format!("re_{}", n),
            status: self.refund_status.lock().unwrap().clone(),
        })
    }
}

// ── Commerce services ────────────────────────────────────────────────────────

/// One customer with one active cart at a time.
pub struct FakeCommerce {
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub cart: Mutex<Cart>,
    pub items: Mutex<Vec<CartItem>>,
    pub rates: Mutex<HashMap<Uuid, CartShippingRate>>,
    pub variants: Mutex<HashMap<Uuid, Uuid>>,
    pub notifications: Mutex<Vec<OrderStatusNotification>>,
    pub inventory_orders: Mutex<Vec<Uuid>>,
    /// `(sku, quantity)` of the items handed to inventory, per order.
    pub inventory_items: Mutex<HashMap<Uuid, Vec<(String, i32)>>>,
    pub inventory_updates: Mutex<Vec<(Uuid, OrderStatus)>>,
    pub wishlist_removals: Mutex<Vec<(Uuid, Vec<Uuid>)>>,
    /// When set, webhook, inventory and wishlist calls fail.
    pub fail_side_effects: AtomicBool,
    pub failed_calls: Mutex<Vec<&'static str>>,
}

impl FakeCommerce {
    pub fn new() -> Self {
        let cart_id = Uuid::new_v4();
        let rate_id = Uuid::new_v4();
        let mut rates = HashMap::new();
        rates.insert(
            rate_id,
            CartShippingRate {
                id: rate_id,
                cart_id,
                amount: dec("3.00"),
                carrier: "UPS".to_string(),
                service_type: "Ground".to_string(),
                eta: Some("3 days".to_string()),
            },
        );
        Self {
            customer_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            cart: Mutex::new(Cart {
                id: cart_id,
                tax_amount: dec("1.00"),
                tax_currency: "USD".to_string(),
                shipping_rate_id: Some(rate_id),
            }),
            items: Mutex::new(vec![
                cart_item("A", 2, "10.00"),
                cart_item("B", 1, "5.00"),
            ]),
            rates: Mutex::new(rates),
            variants: Mutex::new(HashMap::new()),
            notifications: Mutex::new(vec![]),
            inventory_orders: Mutex::new(vec![]),
            inventory_items: Mutex::new(HashMap::new()),
            inventory_updates: Mutex::new(vec![]),
            wishlist_removals: Mutex::new(vec![]),
            fail_side_effects: AtomicBool::new(false),
            failed_calls: Mutex::new(vec![]),
        }
    }

    pub fn fail_side_effects(&self) {
        self.fail_side_effects.store(true, Ordering::SeqCst);
    }

    pub fn failed_calls(&self) -> Vec<&'static str> {
        self.failed_calls.lock().unwrap().clone()
    }

    fn side_effect_call(&self, service: &'static str) -> Result<(), ServiceError> {
        if !self.fail_side_effects.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.failed_calls.lock().unwrap().push(service);
        Err(ServiceError::Unavailable(format!("{} is down", service)))
    }

    pub fn cart_id(&self) -> Uuid {
        self.cart.lock().unwrap().id
    }

    pub fn cart_rate_id(&self) -> Uuid {
        self.cart
            .lock()
            .unwrap()
            .shipping_rate_id
            .expect("cart has a shipping rate")
    }

    /// Replace the active cart with a fresh one holding the same items.
    pub fn new_cart(&self) {
        let mut cart = self.cart.lock().unwrap();
        let cart_id = Uuid::new_v4();
        let rate_id = Uuid::new_v4();
        self.rates.lock().unwrap().insert(
            rate_id,
            CartShippingRate {
                id: rate_id,
                cart_id,
                amount: dec("3.00"),
                carrier: "UPS".to_string(),
                service_type: "Ground".to_string(),
                eta: None,
            },
        );
        cart.id = cart_id;
        cart.shipping_rate_id = Some(rate_id);
    }

    /// A shipping rate that belongs to some other cart.
    pub fn foreign_rate(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.rates.lock().unwrap().insert(
            id,
            CartShippingRate {
                id,
                cart_id: Uuid::new_v4(),
                amount: dec("7.00"),
                carrier: "FedEx".to_string(),
                service_type: "Express".to_string(),
                eta: None,
            },
        );
        id
    }

    pub fn notified_statuses(&self, order_id: Uuid) -> Vec<OrderStatus> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.order_id == order_id)
            .map(|n| n.status)
            .collect()
    }
}

pub fn cart_item(sku: &str, quantity: i32, price: &str) -> CartItem {
    CartItem {
        product_id: Uuid::new_v4(),
        variant_id: None,
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        image: None,
        price: dec(price),
        quantity,
        dimensions: ItemDimensions::default(),
    }
}

#[async_trait]
impl CartService for FakeCommerce {
    async fn get_cart(&self, customer_id: Uuid) -> Result<Cart, ServiceError> {
        if customer_id != self.customer_id {
            return Err(ServiceError::NotFound("cart".to_string()));
        }
        Ok(self.cart.lock().unwrap().clone())
    }

    async fn get_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, ServiceError> {
        if cart_id != self.cart_id() {
            return Err(ServiceError::NotFound("cart items".to_string()));
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn get_shipping_rate(&self, rate_id: Uuid) -> Result<CartShippingRate, ServiceError> {
        self.rates
            .lock()
            .unwrap()
            .get(&rate_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("shipping rate".to_string()))
    }
}

#[async_trait]
impl AddressService for FakeCommerce {
    async fn get_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<DeliveryAddress, ServiceError> {
        if customer_id != self.customer_id || address_id != self.address_id {
            return Err(ServiceError::NotFound("address".to_string()));
        }
        Ok(DeliveryAddress {
            full_name: "Grace Hopper".to_string(),
            address: "1 Compiler Lane".to_string(),
            city: Some("Arlington".to_string()),
            state: "VA".to_string(),
            country: "US".to_string(),
            postal: "22201".to_string(),
            phone: None,
        })
    }
}

#[async_trait]
impl CustomerService for FakeCommerce {
    async fn get_customer(&self, customer_id: Uuid) -> Result<Customer, ServiceError> {
        Ok(Customer {
            id: customer_id,
            stripe_id: Some("cus_test".to_string()),
        })
    }
}

#[async_trait]
impl InventoryService for FakeCommerce {
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        _customer: &Customer,
    ) -> Result<(), ServiceError> {
        self.side_effect_call("inventory")?;
        self.inventory_items.lock().unwrap().insert(
            order.id,
            items.iter().map(|i| (i.sku.clone(), i.quantity)).collect(),
        );
        self.inventory_orders.lock().unwrap().push(order.id);
        Ok(())
    }

    async fn update_order_status(
        &self,
        order: &Order,
        _customer: &Customer,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        self.side_effect_call("inventory")?;
        self.inventory_updates.lock().unwrap().push((order.id, status));
        Ok(())
    }
}

#[async_trait]
impl WebhookService for FakeCommerce {
    async fn notify_order_status_change(
        &self,
        notification: &OrderStatusNotification,
    ) -> Result<(), ServiceError> {
        self.side_effect_call("webhook")?;
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[async_trait]
impl WishlistService for FakeCommerce {
    async fn bulk_remove(&self, customer_id: Uuid, product_ids: &[Uuid]) -> Result<(), ServiceError> {
        self.side_effect_call("wishlist")?;
        self.wishlist_removals
            .lock()
            .unwrap()
            .push((customer_id, product_ids.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl ProductService for FakeCommerce {
    async fn get_variant(&self, variant_id: Uuid) -> Result<ProductVariant, ServiceError> {
        self.variants
            .lock()
            .unwrap()
            .get(&variant_id)
            .map(|product_id| ProductVariant {
                id: variant_id,
                product_id: *product_id,
            })
            .ok_or_else(|| ServiceError::NotFound("product variant".to_string()))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub service: OrderService<Arc<dyn OrderRepository>>,
    pub repo: Arc<InMemoryOrderRepository>,
    pub gateway: Arc<FakeGateway>,
    pub commerce: Arc<FakeCommerce>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ProviderKind::Stripe)
    }

    /// Must be called from within a Tokio runtime.
    pub fn with_provider(provider: ProviderKind) -> Self {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let gateway = Arc::new(FakeGateway::new(provider));
        let commerce = Arc::new(FakeCommerce::new());
        let collaborators = Collaborators {
            payments: gateway.clone(),
            carts: commerce.clone(),
            addresses: commerce.clone(),
            customers: commerce.clone(),
            inventory: commerce.clone(),
            webhooks: commerce.clone(),
            wishlists: commerce.clone(),
            products: commerce.clone(),
        };
        let dispatcher = SideEffectDispatcher::spawn(collaborators.clone(), Duration::from_secs(5));
        let shared: Arc<dyn OrderRepository> = repo.clone();
        Self {
            service: OrderService::new(shared, collaborators, dispatcher),
            repo,
            gateway,
            commerce,
        }
    }

    pub fn customer(&self) -> Option<Uuid> {
        Some(self.commerce.customer_id)
    }

    pub fn order_input(&self) -> CreateOrderInput {
        CreateOrderInput {
            address_id: self.commerce.address_id,
            shipping_rate_id: None,
            payment_token: "pm_card_visa".to_string(),
        }
    }

    pub fn stored(&self, order_id: Uuid) -> Order {
        self.repo
            .find_by_id(order_id)
            .expect("find succeeds")
            .expect("order is stored")
    }

    pub fn stored_items(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.repo.find_items(order_id).expect("find succeeds")
    }
}

/// Poll `check` until it holds or `timeout` elapses. Panics on timeout.
pub async fn wait_for<F>(label: &str, timeout: Duration, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("{} did not happen within {:?}", label, timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
