//! PostgreSQL-backed `OrderRepository`.
//!
//! Placement and cancellation are single transactions. Variant rows are
//! locked in id order so concurrent checkouts touching the same variants
//! queue instead of deadlocking, and stock never goes below zero.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::AsyncConnection as _;
use diesel_async::AsyncPgConnection;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{OrderRepository, OrderRepositoryError, StatusChange};
use crate::domain::{
    LowStockItem, MovementKind, Order, OrderDetail, OrderFilter, OrderItem, OrderPlacement,
    OrderStatus, PaymentStatus, StockMovement, UserId, crossed_low_threshold,
};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::diesel_helpers::{collect_rows, count_to_total};
use super::models::{OrderItemRow, OrderRow, StockMovementRow};
use super::pool::{DbPool, PoolError};
use super::schema::{discounts, order_items, orders, product_variants, stock_movements};

/// Diesel implementation of the order store.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> OrderRepositoryError {
    map_basic_pool_error(error, OrderRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> OrderRepositoryError {
    map_basic_diesel_error(
        error,
        OrderRepositoryError::query,
        OrderRepositoryError::connection,
    )
}

/// Failure inside a placement transaction: either the database gave up or a
/// business rule aborted the transaction.
#[derive(Debug)]
enum TxError {
    Database(DieselError),
    Rejected(OrderRepositoryError),
}

impl From<DieselError> for TxError {
    fn from(error: DieselError) -> Self {
        Self::Database(error)
    }
}

impl From<TxError> for OrderRepositoryError {
    fn from(error: TxError) -> Self {
        match error {
            TxError::Rejected(rejection) => rejection,
            TxError::Database(err) if unique_violation(&err) == Some("orders_order_number_key") => {
                Self::duplicate_order_number()
            }
            TxError::Database(err) => map_diesel_error(err),
        }
    }
}

/// Quantity requested per variant, in lock order.
fn requested_by_variant(items: &[OrderItem]) -> Vec<(Uuid, i32, String)> {
    let mut merged: HashMap<Uuid, (i32, String)> = HashMap::new();
    for item in items {
        merged
            .entry(item.variant_id)
            .and_modify(|(quantity, _)| *quantity += item.quantity)
            .or_insert_with(|| (item.quantity, item.product_name.clone()));
    }
    let mut lines: Vec<(Uuid, i32, String)> = merged
        .into_iter()
        .map(|(id, (quantity, name))| (id, quantity, name))
        .collect();
    lines.sort_by_key(|(id, _, _)| *id);
    lines
}

struct LockedVariant {
    product_id: Uuid,
    sku: String,
    stock_quantity: i32,
    low_stock_threshold: i32,
}

async fn lock_variant(
    conn: &mut AsyncPgConnection,
    variant_id: Uuid,
) -> Result<Option<LockedVariant>, DieselError> {
    let row: Option<(Uuid, String, i32, i32)> = product_variants::table
        .find(variant_id)
        .select((
            product_variants::product_id,
            product_variants::sku,
            product_variants::stock_quantity,
            product_variants::low_stock_threshold,
        ))
        .for_update()
        .first(conn)
        .await
        .optional()?;
    Ok(row.map(
        |(product_id, sku, stock_quantity, low_stock_threshold)| LockedVariant {
            product_id,
            sku,
            stock_quantity,
            low_stock_threshold,
        },
    ))
}

/// Move a locked variant's stock and append the matching ledger row.
async fn move_stock(
    conn: &mut AsyncPgConnection,
    movement: &StockMovement,
) -> Result<(), DieselError> {
    diesel::update(product_variants::table.find(movement.variant_id))
        .set(product_variants::stock_quantity.eq(movement.quantity_after))
        .execute(conn)
        .await?;
    diesel::insert_into(stock_movements::table)
        .values(StockMovementRow::from(movement))
        .execute(conn)
        .await?;
    Ok(())
}

async fn place_in_transaction(
    conn: &mut AsyncPgConnection,
    placement: &OrderPlacement,
) -> Result<Vec<LowStockItem>, TxError> {
    let order = &placement.order;

    let mut locked = Vec::new();
    for (variant_id, requested, product_name) in requested_by_variant(&placement.items) {
        let Some(variant) = lock_variant(conn, variant_id).await? else {
            return Err(TxError::Rejected(OrderRepositoryError::unknown_variant(
                variant_id,
            )));
        };
        if variant.stock_quantity < requested {
            return Err(TxError::Rejected(OrderRepositoryError::insufficient_stock(
                variant_id,
                variant.stock_quantity,
                requested,
            )));
        }
        locked.push((variant_id, requested, product_name, variant));
    }

    diesel::insert_into(orders::table)
        .values(OrderRow::from(order))
        .execute(conn)
        .await?;
    let items: Vec<OrderItemRow> = placement.items.iter().map(OrderItemRow::from).collect();
    diesel::insert_into(order_items::table)
        .values(&items)
        .execute(conn)
        .await?;

    let mut crossed = Vec::new();
    for (variant_id, requested, product_name, variant) in locked {
        let after = variant.stock_quantity - requested;
        let movement = StockMovement {
            id: Uuid::new_v4(),
            variant_id,
            kind: MovementKind::Sale,
            quantity_change: -requested,
            quantity_before: variant.stock_quantity,
            quantity_after: after,
            reason: Some(format!("order {}", order.order_number)),
            order_id: Some(order.id),
            performed_by: placement.performed_by,
            created_at: order.created_at,
        };
        move_stock(conn, &movement).await?;
        if crossed_low_threshold(variant.stock_quantity, after, variant.low_stock_threshold) {
            crossed.push(LowStockItem {
                variant_id,
                product_id: variant.product_id,
                product_name,
                sku: variant.sku,
                stock_quantity: after,
                low_stock_threshold: variant.low_stock_threshold,
            });
        }
    }

    if let Some(discount_id) = placement.discount_id {
        let counted = diesel::update(
            discounts::table.filter(discounts::id.eq(discount_id)).filter(
                discounts::usage_limit
                    .is_null()
                    .or(discounts::times_used.lt(discounts::usage_limit.assume_not_null())),
            ),
        )
        .set(discounts::times_used.eq(discounts::times_used + 1))
        .execute(conn)
        .await?;
        if counted == 0 {
            return Err(TxError::Rejected(OrderRepositoryError::discount_exhausted()));
        }
    }

    Ok(crossed)
}

async fn cancel_in_transaction(
    conn: &mut AsyncPgConnection,
    change: &StatusChange,
    order_number: &str,
) -> Result<(), DieselError> {
    let lines: Vec<(Uuid, i32)> = order_items::table
        .filter(order_items::order_id.eq(change.order_id))
        .select((order_items::variant_id, order_items::quantity))
        .load(conn)
        .await?;
    let mut returned: HashMap<Uuid, i32> = HashMap::new();
    for (variant_id, quantity) in lines {
        *returned.entry(variant_id).or_default() += quantity;
    }
    let mut returned: Vec<(Uuid, i32)> = returned.into_iter().collect();
    returned.sort_by_key(|(id, _)| *id);

    for (variant_id, quantity) in returned {
        let Some(variant) = lock_variant(conn, variant_id).await? else {
            continue;
        };
        let movement = StockMovement {
            id: Uuid::new_v4(),
            variant_id,
            kind: MovementKind::Return,
            quantity_change: quantity,
            quantity_before: variant.stock_quantity,
            quantity_after: variant.stock_quantity + quantity,
            reason: Some(format!("order {order_number} cancelled")),
            order_id: Some(change.order_id),
            performed_by: change.performed_by,
            created_at: change.at,
        };
        move_stock(conn, &movement).await?;
    }
    Ok(())
}

async fn attach_items(
    conn: &mut AsyncPgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<OrderDetail>, OrderRepositoryError> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let item_rows: Vec<OrderItemRow> = order_items::table
        .filter(order_items::order_id.eq_any(&ids))
        .order((order_items::order_id, order_items::product_name, order_items::sku))
        .select(OrderItemRow::as_select())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.order_id).or_default().push(row.into());
    }
    let orders: Vec<Order> = collect_rows(rows, OrderRepositoryError::query)?;
    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

impl DieselOrderRepository {
    async fn find_where(
        &self,
        query: orders::BoxedQuery<'_, diesel::pg::Pg>,
    ) -> Result<Option<OrderDetail>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let Some(row) = query
            .select(OrderRow::as_select())
            .first::<OrderRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
        else {
            return Ok(None);
        };
        Ok(attach_items(&mut conn, vec![row]).await?.pop())
    }
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn place(
        &self,
        placement: &OrderPlacement,
    ) -> Result<Vec<LowStockItem>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, TxError, _>(|conn| {
            async move { place_in_transaction(conn, placement).await }.scope_boxed()
        })
        .await
        .map_err(OrderRepositoryError::from)
    }

    async fn find(&self, id: Uuid) -> Result<Option<OrderDetail>, OrderRepositoryError> {
        self.find_where(orders::table.filter(orders::id.eq(id)).into_boxed())
            .await
    }

    async fn find_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderDetail>, OrderRepositoryError> {
        self.find_where(
            orders::table
                .filter(orders::order_number.eq(order_number))
                .into_boxed(),
        )
        .await
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<OrderDetail>, u64), OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let owner = *user_id.as_uuid();
        let total: i64 = orders::table
            .filter(orders::user_id.eq(owner))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<OrderRow> = orders::table
            .filter(orders::user_id.eq(owner))
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let details = attach_items(&mut conn, rows).await?;
        Ok((details, count_to_total(total)))
    }

    async fn list(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let filtered = || {
            let mut query = orders::table.into_boxed();
            if let Some(status) = filter.status {
                query = query.filter(orders::status.eq(status.as_str()));
            }
            if let Some(channel) = filter.channel {
                query = query.filter(orders::channel.eq(channel.as_str()));
            }
            query
        };
        let total: i64 = filtered()
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<OrderRow> = filtered()
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok((
            collect_rows(rows, OrderRepositoryError::query)?,
            count_to_total(total),
        ))
    }

    async fn change_status(&self, change: StatusChange) -> Result<bool, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let target = orders::table
                    .filter(orders::id.eq(change.order_id))
                    .filter(orders::status.eq(change.from.as_str()));
                let number: Option<String> = match change.payment_status {
                    Some(payment_status) => diesel::update(target)
                        .set((
                            orders::status.eq(change.to.as_str()),
                            orders::payment_status.eq(payment_status.as_str()),
                            orders::updated_at.eq(change.at),
                        ))
                        .returning(orders::order_number)
                        .get_result(conn)
                        .await
                        .optional()?,
                    None => diesel::update(target)
                        .set((
                            orders::status.eq(change.to.as_str()),
                            orders::updated_at.eq(change.at),
                        ))
                        .returning(orders::order_number)
                        .get_result(conn)
                        .await
                        .optional()?,
                };
                let Some(number) = number else {
                    return Ok(false);
                };
                if change.to == OrderStatus::Cancelled {
                    cancel_in_transaction(conn, &change, &number).await?;
                }
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn set_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(orders::table.find(order_id))
            .set((
                orders::payment_status.eq(payment_status.as_str()),
                orders::updated_at.eq(at),
            ))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(map_diesel_error)
    }

    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderDetail>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<OrderRow> = orders::table
            .filter(orders::created_at.ge(from))
            .filter(orders::created_at.lt(to))
            .order(orders::created_at.asc())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        attach_items(&mut conn, rows).await
    }
}
