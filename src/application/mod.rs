pub mod order_service;
pub mod side_effects;

use std::sync::Arc;

use crate::domain::payment::PaymentGateway;
use crate::domain::ports::{
    AddressService, CartService, CustomerService, InventoryService, ProductService,
    WebhookService, WishlistService,
};

/// External services the order core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub payments: Arc<dyn PaymentGateway>,
    pub carts: Arc<dyn CartService>,
    pub addresses: Arc<dyn AddressService>,
    pub customers: Arc<dyn CustomerService>,
    pub inventory: Arc<dyn InventoryService>,
    pub webhooks: Arc<dyn WebhookService>,
    pub wishlists: Arc<dyn WishlistService>,
    pub products: Arc<dyn ProductService>,
}
