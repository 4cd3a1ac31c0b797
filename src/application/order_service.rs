use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use uuid::Uuid;

use super::side_effects::{SideEffect, SideEffectDispatcher};
use super::Collaborators;
use crate::domain::errors::{DomainError, ServiceError};
use crate::domain::order::{
    ItemRefund, Order, OrderItem, OrderItemStatus, OrderPage, OrderPatch, OrderStatus,
    OrderWithItems, RefundRecord, RefundSettlement,
};
use crate::domain::payment::{CreatePaymentRequest, ProviderKind, RefundRequest, RefundStatus};
use crate::domain::ports::{CartItem, OrderRepository};
use crate::domain::reference::{generate_reference, DEFAULT_MAX_ATTEMPTS};
use crate::domain::refund::{calculate_refund, RefundLine, RefundableItem};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub address_id: Uuid,
    pub shipping_rate_id: Option<Uuid>,
    /// Saved payment method at the configured provider.
    pub payment_token: String,
}

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order_id: Uuid,
    pub order_reference: String,
    pub status: OrderStatus,
    pub total: BigDecimal,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct RefundOrderResponse {
    pub refund_id: String,
    pub total_refundable_amount: BigDecimal,
    pub refundable_items: Vec<RefundableItem>,
    pub order_status: OrderStatus,
}

pub struct OrderService<R> {
    repo: Arc<R>,
    collaborators: Collaborators,
    provider: ProviderKind,
    side_effects: SideEffectDispatcher,
    reference_max_attempts: u32,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R, collaborators: Collaborators, side_effects: SideEffectDispatcher) -> Self {
        let provider = collaborators.payments.provider();
        Self {
            repo: Arc::new(repo),
            collaborators,
            provider,
            side_effects,
            reference_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_reference_max_attempts(mut self, attempts: u32) -> Self {
        self.reference_max_attempts = attempts.max(1);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Run a blocking repository call off the async executor.
    async fn with_repo<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, DomainError> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || f(repo.as_ref()))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
    }

    async fn load_owned(&self, customer_id: Uuid, order_id: Uuid) -> Result<Order, DomainError> {
        self.with_repo(move |repo| repo.find_by_id(order_id))
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or(DomainError::NotFound)
    }

    async fn load_by_reference(&self, reference: &str) -> Result<Order, DomainError> {
        let reference = reference.to_string();
        self.with_repo(move |repo| repo.find_by_reference(&reference))
            .await?
            .ok_or(DomainError::NotFound)
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        self.with_repo(move |repo| repo.find_items(order_id)).await
    }

    // ── Customer-facing operations ──────────────────────────────────────────

    pub async fn create_order(
        &self,
        customer_id: Option<Uuid>,
        input: CreateOrderInput,
    ) -> Result<CreatedOrder, DomainError> {
        let customer_id = customer_id.ok_or(DomainError::CustomerIdRequired)?;
        let c = &self.collaborators;

        let delivery = c
            .addresses
            .get_address(customer_id, input.address_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => DomainError::AddressNotFound,
                other => DomainError::Creating(other.to_string()),
            })?;

        let cart = c.carts.get_cart(customer_id).await.map_err(DomainError::Cart)?;
        let cart_items = c
            .carts
            .get_cart_items(cart.id)
            .await
            .map_err(DomainError::Cart)?;
        if cart_items.is_empty() {
            return Err(DomainError::CartEmpty);
        }

        let shipping_amount = match input.shipping_rate_id.or(cart.shipping_rate_id) {
            Some(rate_id) => {
                let rate = c
                    .carts
                    .get_shipping_rate(rate_id)
                    .await
                    .map_err(|e| DomainError::Creating(format!("shipping rate {}: {}", rate_id, e)))?;
                if rate.cart_id != cart.id {
                    return Err(DomainError::Creating(format!(
                        "shipping rate {} does not belong to cart {}",
                        rate_id, cart.id
                    )));
                }
                rate.amount
            }
            None => BigDecimal::zero(),
        };

        let customer = c
            .customers
            .get_customer(customer_id)
            .await
            .map_err(|e| DomainError::Creating(e.to_string()))?;

        let subtotal = cart_subtotal(&cart_items);
        let total = &subtotal + &cart.tax_amount + &shipping_amount;

        let charge = self.provider.charge_payload(&CreatePaymentRequest {
            amount: total.clone(),
            currency: cart.tax_currency.clone(),
            payment_token: input.payment_token,
            customer_id,
            stripe_customer_id: customer.stripe_id.clone(),
        })?;
        let payment = c
            .payments
            .create_payment(charge)
            .await
            .map_err(DomainError::Payment)?;
        let status = self.provider.payment_status(&payment.status).initial_order_status();

        let order_id = Uuid::new_v4();
        let max_attempts = self.reference_max_attempts;
        let order_reference = self
            .with_repo(move |repo| {
                generate_reference(order_id, max_attempts, |candidate| {
                    repo.reference_exists(candidate)
                })
            })
            .await?;

        let now = Utc::now();
        let (stripe_payment_intent_id, authorize_net_payment_id) = match self.provider {
            ProviderKind::Stripe => (Some(payment.id), None),
            ProviderKind::AuthorizeNet => (None, Some(payment.id)),
        };
        let order = Order {
            id: order_id,
            customer_id,
            cart_id: cart.id,
            order_reference,
            tax_amount: cart.tax_amount,
            subtotal,
            shipping_rate: shipping_amount,
            total,
            refund_total: BigDecimal::zero(),
            currency: cart.tax_currency,
            delivery,
            stripe_payment_intent_id,
            authorize_net_payment_id,
            status,
            fulfillment: Default::default(),
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = cart_items
            .into_iter()
            .map(|ci| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: ci.product_id,
                variant_id: ci.variant_id,
                sku: ci.sku,
                name: ci.name,
                image: ci.image,
                dimensions: ci.dimensions,
                price: ci.price,
                quantity: ci.quantity,
                status: OrderItemStatus::Pending,
                refund_id: None,
                refunded_amount: None,
                refunded_at: None,
            })
            .collect();

        let (to_insert, items_to_insert) = (order.clone(), items.clone());
        self.with_repo(move |repo| repo.create_order(&to_insert, &items_to_insert))
            .await
            .map_err(into_storage_error)?;

        log::info!(
            "order {} ({}) created for customer {} with status {}",
            order.order_reference,
            order.id,
            customer_id,
            order.status
        );

        self.side_effects.dispatch(SideEffect::status_changed(&order));
        self.side_effects.dispatch(SideEffect::InventoryCreateOrder {
            order: order.clone(),
            items: items.clone(),
        });

        Ok(CreatedOrder {
            order_id: order.id,
            order_reference: order.order_reference,
            status: order.status,
            total: order.total,
            items,
        })
    }

    pub async fn list_orders(
        &self,
        customer_id: Option<Uuid>,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let customer_id = customer_id.ok_or(DomainError::CustomerIdRequired)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let mut items = self
            .with_repo(move |repo| repo.list_for_customer(customer_id, cursor, limit + 1))
            .await?;
        let next_cursor = if items.len() as i64 > limit {
            items.truncate(limit as usize);
            items.last().map(|o| o.id)
        } else {
            None
        };
        Ok(OrderPage { items, next_cursor })
    }

    pub async fn get_order(
        &self,
        customer_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> Result<OrderWithItems, DomainError> {
        let customer_id = customer_id.ok_or(DomainError::CustomerIdRequired)?;
        let order_id = order_id.ok_or(DomainError::OrderIdRequired)?;
        let order = self.load_owned(customer_id, order_id).await?;
        let items = self.load_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Cancel a pending or paid order. No refund is issued; a paid order keeps
    /// its charge until refunded through `refund_order`.
    pub async fn cancel_order(
        &self,
        customer_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> Result<Order, DomainError> {
        let customer_id = customer_id.ok_or(DomainError::CustomerIdRequired)?;
        let order_id = order_id.ok_or(DomainError::OrderIdRequired)?;
        let mut order = self.load_owned(customer_id, order_id).await?;

        match order.status {
            OrderStatus::Cancelled => return Err(DomainError::AlreadyCancelled),
            status if !status.can_cancel() => return Err(DomainError::CannotBeCancelled(status)),
            _ => {}
        }

        let expected = order.status;
        let applied = self
            .with_repo(move |repo| {
                repo.transition_status(order_id, expected, OrderStatus::Cancelled)
            })
            .await?;
        if !applied {
            return Err(DomainError::Updating(format!(
                "order {} changed status while being cancelled",
                order.order_reference
            )));
        }

        log::info!("order {} cancelled from {}", order.order_reference, expected);
        order.status = OrderStatus::Cancelled;
        self.side_effects.dispatch(SideEffect::InventoryUpdateStatus {
            order: order.clone(),
            status: OrderStatus::Cancelled,
        });
        Ok(order)
    }

    // ── Payment gateway callbacks ───────────────────────────────────────────

    /// Idempotent: a replayed event finds the order no longer pending.
    pub async fn process_payment_succeeded(&self, payment_id: &str) -> Result<Order, DomainError> {
        let order = self
            .resolve_payment(payment_id, OrderStatus::PaymentSuccess)
            .await?;

        match self.load_items(order.id).await {
            Ok(items) => self.side_effects.dispatch(SideEffect::WishlistPrune {
                order_id: order.id,
                customer_id: order.customer_id,
                items,
            }),
            Err(e) => log::warn!(
                "skipping wishlist pruning for order {}: {}",
                order.order_reference,
                e
            ),
        }
        Ok(order)
    }

    pub async fn process_payment_failed(&self, payment_id: &str) -> Result<Order, DomainError> {
        self.resolve_payment(payment_id, OrderStatus::PaymentFailed)
            .await
    }

    async fn resolve_payment(
        &self,
        payment_id: &str,
        next: OrderStatus,
    ) -> Result<Order, DomainError> {
        let provider = self.provider;
        let lookup = payment_id.to_string();
        let mut order = self
            .with_repo(move |repo| repo.find_by_payment_id(provider, &lookup))
            .await?
            .ok_or(DomainError::NotFound)?;

        if order.status != OrderStatus::Pending {
            log::info!(
                "ignoring {} for payment {}: order {} is {}",
                next,
                payment_id,
                order.order_reference,
                order.status
            );
            return Err(DomainError::NotPending);
        }

        let order_id = order.id;
        let applied = self
            .with_repo(move |repo| repo.transition_status(order_id, OrderStatus::Pending, next))
            .await?;
        if !applied {
            return Err(DomainError::NotPending);
        }

        log::info!("order {} moved to {}", order.order_reference, next);
        order.status = next;
        self.side_effects.dispatch(SideEffect::status_changed(&order));
        self.side_effects.dispatch(SideEffect::InventoryUpdateStatus {
            order: order.clone(),
            status: next,
        });
        Ok(order)
    }

    // ── Fulfillment callback ────────────────────────────────────────────────

    pub async fn update_order(
        &self,
        order_reference: &str,
        patch: OrderPatch,
    ) -> Result<Order, DomainError> {
        let order = self.load_by_reference(order_reference).await?;
        if patch.is_empty() {
            return Ok(order);
        }

        if let Some(next) = patch.status {
            if next != order.status && !order.status.can_transition_to(next) {
                return Err(DomainError::InvalidTransition {
                    from: order.status,
                    to: next,
                });
            }
        }

        if !patch.items.is_empty() {
            let items = self.load_items(order.id).await?;
            for item_patch in &patch.items {
                let item = items
                    .iter()
                    .find(|i| i.id == item_patch.item_id)
                    .ok_or_else(|| {
                        DomainError::Updating(format!(
                            "item {} does not belong to order {}",
                            item_patch.item_id, order.order_reference
                        ))
                    })?;
                if let Some(next) = item_patch.status {
                    if next != item.status && !item.status.can_transition_to(next) {
                        return Err(DomainError::Updating(format!(
                            "item {} cannot move from {} to {}",
                            item.id, item.status, next
                        )));
                    }
                }
            }
        }

        let (order_id, expected) = (order.id, order.status);
        let updated = self
            .with_repo(move |repo| repo.apply_patch(order_id, expected, &patch))
            .await
            .map_err(into_storage_error)?
            .ok_or_else(|| {
                DomainError::Updating(format!(
                    "order {} changed while being updated",
                    order.order_reference
                ))
            })?;

        if updated.status != order.status {
            log::info!(
                "order {} moved from {} to {}",
                updated.order_reference,
                order.status,
                updated.status
            );
            self.side_effects.dispatch(SideEffect::status_changed(&updated));
        }
        Ok(updated)
    }

    // ── Refunds ─────────────────────────────────────────────────────────────

    pub async fn refund_order(
        &self,
        order_reference: &str,
        lines: Vec<RefundLine>,
    ) -> Result<RefundOrderResponse, DomainError> {
        let mut order = self.load_by_reference(order_reference).await?;
        if order.status == OrderStatus::Refunded {
            return Err(DomainError::Refunding(format!(
                "order {} is already refunded",
                order.order_reference
            )));
        }
        if !order.status.accepts_refund() {
            return Err(DomainError::Refunding(format!(
                "order {} in status {} has no payment to refund",
                order.order_reference, order.status
            )));
        }

        let items = self.load_items(order.id).await?;
        let calc = calculate_refund(&items, &lines, &order.refundable_balance())?;
        let payment_id = self.payment_id(&order)?;

        let amount = if calc.should_refund_whole_order {
            None
        } else {
            Some(calc.refundable_amount.clone())
        };
        let payload = self.provider.refund_payload(&RefundRequest { payment_id, amount })?;
        let refund = self
            .collaborators
            .payments
            .refund(payload)
            .await
            .map_err(DomainError::Payment)?;
        if self.provider.refund_status(&refund.status) == RefundStatus::Failed {
            return Err(DomainError::Refunding(format!(
                "payment provider declined refund {} with status {}",
                refund.id, refund.status
            )));
        }

        // A whole-order refund returns the full charge, tax and shipping included.
        let charged_back = if calc.should_refund_whole_order {
            order.refundable_balance()
        } else {
            calc.refundable_amount.clone()
        };
        let next_status = calc.completes_order.then_some(OrderStatus::Refunded);
        let record = RefundRecord {
            refund_id: refund.id.clone(),
            items: calc
                .items
                .iter()
                .map(|i| ItemRefund {
                    item_id: i.item_id,
                    amount: i.amount.clone(),
                })
                .collect(),
            amount: charged_back.clone(),
            expected_status: order.status,
            next_status,
        };
        let order_id = order.id;
        let applied = self
            .with_repo(move |repo| repo.record_refund(order_id, &record))
            .await?;
        if !applied {
            log::error!(
                "refund {} issued for order {} but the order changed before it was recorded",
                refund.id,
                order.order_reference
            );
            return Err(DomainError::Refunding(format!(
                "order {} changed while the refund was in flight",
                order.order_reference
            )));
        }

        log::info!(
            "refund {} of {} initiated for order {}",
            refund.id,
            charged_back,
            order.order_reference
        );
        order.refund_total += &charged_back;
        if let Some(status) = next_status {
            order.status = status;
        }
        self.side_effects.dispatch(SideEffect::status_changed(&order));

        Ok(RefundOrderResponse {
            refund_id: refund.id,
            total_refundable_amount: calc.refundable_amount,
            refundable_items: calc.items,
            order_status: order.status,
        })
    }

    /// Idempotent: only items still awaiting this refund are touched.
    pub async fn process_refund_succeeded(
        &self,
        refund_id: &str,
        refund_amount: BigDecimal,
    ) -> Result<(), DomainError> {
        let lookup = refund_id.to_string();
        let refunded = self
            .with_repo(move |repo| repo.find_items_by_refund_id(&lookup))
            .await?;
        let Some(order_id) = refunded.first().map(|i| i.order_id) else {
            log::info!("refund {} matches no order items, ignoring", refund_id);
            return Ok(());
        };

        let order = self
            .with_repo(move |repo| repo.find_by_id(order_id))
            .await?
            .ok_or(DomainError::NotFound)?;
        if order.status == OrderStatus::Refunded {
            log::info!(
                "order {} already refunded, ignoring refund {}",
                order.order_reference,
                refund_id
            );
            return Ok(());
        }

        let item_ids: Vec<Uuid> = refunded
            .iter()
            .filter(|i| {
                i.status == OrderItemStatus::InitiatedRefund
                    && i.refund_id.as_deref() == Some(refund_id)
            })
            .map(|i| i.id)
            .collect();
        if item_ids.is_empty() {
            return Ok(());
        }

        let recorded: BigDecimal = refunded
            .iter()
            .filter(|i| item_ids.contains(&i.id))
            .filter_map(|i| i.refunded_amount.clone())
            .sum();
        if recorded != refund_amount {
            log::warn!(
                "refund {} settled for {} but {} was recorded on its items",
                refund_id,
                refund_amount,
                recorded
            );
        }

        let all_items = self.load_items(order_id).await?;
        let every_item_refunded = all_items.iter().all(|i| {
            i.is_fully_refunded()
                && (i.status == OrderItemStatus::Refunded || item_ids.contains(&i.id))
        });
        let mark_order_refunded = every_item_refunded && order.status.accepts_refund();

        let settlement = RefundSettlement {
            order_id,
            refund_id: refund_id.to_string(),
            item_ids,
            refunded_at: Utc::now(),
            mark_order_refunded,
        };
        self.with_repo(move |repo| repo.settle_refund(&settlement))
            .await?;

        if mark_order_refunded {
            log::info!("order {} fully refunded", order.order_reference);
            let mut order = order;
            order.status = OrderStatus::Refunded;
            self.side_effects.dispatch(SideEffect::status_changed(&order));
        }
        Ok(())
    }

    fn payment_id(&self, order: &Order) -> Result<String, DomainError> {
        order
            .payment_id(self.provider)
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::Refunding(format!(
                    "order {} was not charged through {}",
                    order.order_reference, self.provider
                ))
            })
    }
}

/// Store failures surface as 500s; rejections such as a consumed cart pass through.
fn into_storage_error(e: DomainError) -> DomainError {
    match e {
        DomainError::Internal(detail) => DomainError::Storage(detail),
        other => other,
    }
}

fn cart_subtotal(items: &[CartItem]) -> BigDecimal {
    items
        .iter()
        .map(|i| &i.price * BigDecimal::from(i.quantity))
        .sum()
}
