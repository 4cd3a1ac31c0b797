use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::{DomainError, ServiceError};
use crate::domain::order::{
    Order, OrderItem, OrderItemStatus, OrderPatch, OrderStatus, RefundRecord, RefundSettlement,
};
use crate::domain::payment::ProviderKind;
use crate::domain::ports::OrderRepository;
use crate::schema::{carts, order_items, order_outbox, orders};

use super::models::{
    NewOrderItemRow, NewOutboxEventRow, OrderChangeset, OrderItemChangeset, OrderItemRow,
    OrderRow,
};
use super::outbox::OutboxMessage;

pub const CART_ACTIVE: &str = "active";
pub const CART_PURCHASED: &str = "purchased";

// ── Diesel / r2d2 errors ─────────────────────────────────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn write_outbox(conn: &mut PgConnection, message: OutboxMessage) -> Result<(), DomainError> {
    diesel::insert_into(order_outbox::table)
        .values(&NewOutboxEventRow::from(message))
        .execute(conn)?;
    Ok(())
}

fn status_outbox(row: &OrderRow, status: OrderStatus) -> OutboxMessage {
    OutboxMessage::status_changed(row.id, row.customer_id, &row.order_reference, status)
}

fn to_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, DomainError> {
    rows.into_iter().map(Order::try_from).collect()
}

fn to_items(rows: Vec<OrderItemRow>) -> Result<Vec<OrderItem>, DomainError> {
    rows.into_iter().map(OrderItem::try_from).collect()
}

impl OrderRepository for DieselOrderRepository {
    fn create_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Claim the cart. Losing this race means another order already
            //    consumed it.
            let claimed = diesel::update(carts::table)
                .filter(carts::id.eq(order.cart_id))
                .filter(carts::status.eq(CART_ACTIVE))
                .set((
                    carts::status.eq(CART_PURCHASED),
                    carts::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            if claimed == 0 {
                return Err(DomainError::Cart(ServiceError::rejected(
                    "CART_NOT_ACTIVE",
                    format!("cart {} is not active", order.cart_id),
                )));
            }

            // 2. Insert the order and its items
            diesel::insert_into(orders::table)
                .values(&OrderRow::from(order))
                .execute(conn)?;
            let rows: Vec<NewOrderItemRow> = items
                .iter()
                .zip(0..)
                .map(|(item, position)| NewOrderItemRow::new(item, position))
                .collect();
            diesel::insert_into(order_items::table)
                .values(&rows)
                .execute(conn)?;

            // 3. Outbox event in the same transaction
            write_outbox(conn, OutboxMessage::order_created(order, items))
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        orders::table
            .filter(orders::order_reference.eq(reference))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    fn find_by_payment_id(
        &self,
        provider: ProviderKind,
        payment_id: &str,
    ) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let query = orders::table.select(OrderRow::as_select()).into_boxed();
        let query = match provider {
            ProviderKind::Stripe => query.filter(orders::stripe_payment_intent_id.eq(payment_id)),
            ProviderKind::AuthorizeNet => {
                query.filter(orders::authorize_net_payment_id.eq(payment_id))
            }
        };
        query
            .first(&mut conn)
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::position.asc())
            .select(OrderItemRow::as_select())
            .load(&mut conn)?;
        to_items(rows)
    }

    fn find_items_by_refund_id(&self, refund_id: &str) -> Result<Vec<OrderItem>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = order_items::table
            .filter(order_items::refund_id.eq(refund_id))
            .order(order_items::position.asc())
            .select(OrderItemRow::as_select())
            .load(&mut conn)?;
        to_items(rows)
    }

    fn reference_exists(&self, reference: &str) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let found = diesel::select(diesel::dsl::exists(
            orders::table.filter(orders::order_reference.eq(reference)),
        ))
        .get_result(&mut conn)?;
        Ok(found)
    }

    fn list_for_customer(
        &self,
        customer_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = orders::table
            .filter(orders::customer_id.eq(customer_id))
            .into_boxed();

        // Keyset pagination on (created_at, id), newest first.
        if let Some(cursor) = cursor {
            let anchor: Option<(DateTime<Utc>, Uuid)> = orders::table
                .filter(orders::id.eq(cursor))
                .filter(orders::customer_id.eq(customer_id))
                .select((orders::created_at, orders::id))
                .first(&mut conn)
                .optional()?;
            let Some((created_at, id)) = anchor else {
                return Err(DomainError::InvalidInput(format!("unknown cursor {}", cursor)));
            };
            query = query.filter(
                orders::created_at
                    .lt(created_at)
                    .or(orders::created_at.eq(created_at).and(orders::id.lt(id))),
            );
        }

        let rows = query
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(limit)
            .select(OrderRow::as_select())
            .load(&mut conn)?;
        to_orders(rows)
    }

    fn transition_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(orders::table)
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(expected.as_str()))
                .set((
                    orders::status.eq(next.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .returning(OrderRow::as_returning())
                .get_result(conn)
                .optional()?;

            let Some(row) = updated else {
                return Ok(false);
            };
            write_outbox(conn, status_outbox(&row, next))?;
            Ok(true)
        })
    }

    fn apply_patch(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(orders::table)
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(expected.as_str()))
                .set(&OrderChangeset::from_patch(patch, Utc::now()))
                .returning(OrderRow::as_returning())
                .get_result(conn)
                .optional()?;

            let Some(row) = updated else {
                return Ok(None);
            };

            for item in patch.items.iter().filter(|i| i.status.is_some() || i.sku.is_some()) {
                let changed = diesel::update(order_items::table)
                    .filter(order_items::id.eq(item.item_id))
                    .filter(order_items::order_id.eq(order_id))
                    .set(&OrderItemChangeset {
                        status: item.status.map(|s| s.as_str().to_string()),
                        sku: item.sku.clone(),
                    })
                    .execute(conn)?;
                if changed == 0 {
                    return Err(DomainError::Updating(format!(
                        "item {} does not belong to order {}",
                        item.item_id, order_id
                    )));
                }
            }

            if let Some(status) = patch.status.filter(|s| *s != expected) {
                write_outbox(conn, status_outbox(&row, status))?;
            }
            Order::try_from(row).map(Some)
        })
    }

    fn record_refund(&self, order_id: Uuid, record: &RefundRecord) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let status = record.next_status.unwrap_or(record.expected_status);

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(orders::table)
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(record.expected_status.as_str()))
                .set((
                    orders::refund_total.eq(orders::refund_total + record.amount.clone()),
                    orders::status.eq(status.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .returning(OrderRow::as_returning())
                .get_result(conn)
                .optional()?;

            let Some(row) = updated else {
                return Ok(false);
            };

            for item in &record.items {
                diesel::update(order_items::table)
                    .filter(order_items::id.eq(item.item_id))
                    .filter(order_items::order_id.eq(order_id))
                    .set((
                        order_items::status.eq(OrderItemStatus::InitiatedRefund.as_str()),
                        order_items::refund_id.eq(Some(record.refund_id.as_str())),
                        order_items::refunded_amount.eq(Some(item.amount.clone())),
                    ))
                    .execute(conn)?;
            }

            write_outbox(
                conn,
                OutboxMessage::refund_initiated(order_id, &record.refund_id, &record.amount),
            )?;
            if let Some(next) = record.next_status {
                write_outbox(conn, status_outbox(&row, next))?;
            }
            Ok(true)
        })
    }

    fn settle_refund(&self, settlement: &RefundSettlement) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            diesel::update(order_items::table)
                .filter(order_items::id.eq_any(settlement.item_ids.clone()))
                .filter(order_items::refund_id.eq(settlement.refund_id.as_str()))
                .filter(order_items::status.eq(OrderItemStatus::InitiatedRefund.as_str()))
                .set((
                    order_items::status.eq(OrderItemStatus::Refunded.as_str()),
                    order_items::refunded_at.eq(Some(settlement.refunded_at)),
                ))
                .execute(conn)?;

            write_outbox(
                conn,
                OutboxMessage::refund_settled(
                    settlement.order_id,
                    &settlement.refund_id,
                    &settlement.item_ids,
                ),
            )?;

            if settlement.mark_order_refunded {
                let closed = [
                    OrderStatus::Pending.as_str(),
                    OrderStatus::PaymentFailed.as_str(),
                    OrderStatus::Cancelled.as_str(),
                    OrderStatus::Refunded.as_str(),
                ];
                let updated = diesel::update(orders::table)
                    .filter(orders::id.eq(settlement.order_id))
                    .filter(orders::status.ne_all(closed))
                    .set((
                        orders::status.eq(OrderStatus::Refunded.as_str()),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .returning(OrderRow::as_returning())
                    .get_result(conn)
                    .optional()?;
                if let Some(row) = updated {
                    write_outbox(conn, status_outbox(&row, OrderStatus::Refunded))?;
                }
            }
            Ok(())
        })
    }
}
