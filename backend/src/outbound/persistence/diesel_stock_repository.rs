//! PostgreSQL-backed `StockRepository`.
//!
//! Stock levels change only through a compare-and-set on the stored level,
//! written in the same transaction as the ledger row that explains it.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::AsyncConnection as _;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{StockRepository, StockRepositoryError};
use crate::domain::{LowStockItem, StockMovement};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::diesel_helpers::{collect_rows, count_to_total};
use super::models::StockMovementRow;
use super::pool::{DbPool, PoolError};
use super::schema::{product_variants, products, stock_movements};

/// Diesel implementation of the stock ledger.
#[derive(Clone)]
pub struct DieselStockRepository {
    pool: DbPool,
}

impl DieselStockRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> StockRepositoryError {
    map_basic_pool_error(error, StockRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> StockRepositoryError {
    map_basic_diesel_error(
        error,
        StockRepositoryError::query,
        StockRepositoryError::connection,
    )
}

#[async_trait]
impl StockRepository for DieselStockRepository {
    async fn apply_movement(&self, movement: &StockMovement) -> Result<bool, StockRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = StockMovementRow::from(movement);
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let updated = diesel::update(
                    product_variants::table
                        .filter(product_variants::id.eq(row.variant_id))
                        .filter(product_variants::stock_quantity.eq(row.quantity_before)),
                )
                .set(product_variants::stock_quantity.eq(row.quantity_after))
                .execute(conn)
                .await?;
                if updated == 0 {
                    return Ok(false);
                }
                diesel::insert_into(stock_movements::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn list_movements(
        &self,
        variant_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<(Vec<StockMovement>, u64), StockRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = stock_movements::table.into_boxed();
        let mut count = stock_movements::table.into_boxed();
        if let Some(id) = variant_id {
            query = query.filter(stock_movements::variant_id.eq(id));
            count = count.filter(stock_movements::variant_id.eq(id));
        }

        let total: i64 = count
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<StockMovementRow> = query
            .order((stock_movements::created_at.desc(), stock_movements::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(StockMovementRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok((
            collect_rows(rows, StockRepositoryError::query)?,
            count_to_total(total),
        ))
    }

    async fn low_stock(&self, limit: u32) -> Result<Vec<LowStockItem>, StockRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(Uuid, Uuid, String, String, i32, i32)> = product_variants::table
            .inner_join(products::table)
            .filter(product_variants::stock_quantity.le(product_variants::low_stock_threshold))
            .order((
                product_variants::stock_quantity.asc(),
                product_variants::sku.asc(),
            ))
            .limit(i64::from(limit))
            .select((
                product_variants::id,
                products::id,
                products::name,
                product_variants::sku,
                product_variants::stock_quantity,
                product_variants::low_stock_threshold,
            ))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(
                |(variant_id, product_id, product_name, sku, stock_quantity, low_stock_threshold)| {
                    LowStockItem {
                        variant_id,
                        product_id,
                        product_name,
                        sku,
                        stock_quantity,
                        low_stock_threshold,
                    }
                },
            )
            .collect())
    }
}
