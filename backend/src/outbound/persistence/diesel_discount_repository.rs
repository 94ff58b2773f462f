//! PostgreSQL-backed `DiscountRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::Discount;
use crate::domain::ports::{DiscountRepository, DiscountRepositoryError};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::diesel_helpers::{collect_rows, count_to_total};
use super::models::{DiscountChanges, DiscountRow};
use super::pool::{DbPool, PoolError};
use super::schema::discounts;

/// Diesel implementation of the discount code store.
#[derive(Clone)]
pub struct DieselDiscountRepository {
    pool: DbPool,
}

impl DieselDiscountRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DiscountRepositoryError {
    map_basic_pool_error(error, DiscountRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> DiscountRepositoryError {
    map_basic_diesel_error(
        error,
        DiscountRepositoryError::query,
        DiscountRepositoryError::connection,
    )
}

fn map_write_error(error: DieselError, discount: &Discount) -> DiscountRepositoryError {
    match unique_violation(&error) {
        Some("discounts_code_key") => DiscountRepositoryError::duplicate_code(&*discount.code),
        _ => map_diesel_error(error),
    }
}

fn decode(row: DiscountRow) -> Result<Discount, DiscountRepositoryError> {
    Discount::try_from(row).map_err(DiscountRepositoryError::query)
}

#[async_trait]
impl DiscountRepository for DieselDiscountRepository {
    async fn list(&self, page: PageRequest) -> Result<(Vec<Discount>, u64), DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = discounts::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<DiscountRow> = discounts::table
            .order((discounts::created_at.desc(), discounts::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(DiscountRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok((
            collect_rows(rows, DiscountRepositoryError::query)?,
            count_to_total(total),
        ))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Discount>, DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        discounts::table
            .find(id)
            .select(DiscountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        discounts::table
            .filter(discounts::code.eq(code))
            .select(DiscountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn insert(&self, discount: &Discount) -> Result<(), DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(discounts::table)
            .values(DiscountRow::from(discount))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_write_error(err, discount))
    }

    async fn update(&self, discount: &Discount) -> Result<bool, DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(discounts::table.find(discount.id))
            .set(&DiscountChanges::from(discount))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_write_error(err, discount))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DiscountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(discounts::table.find(id))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(map_diesel_error)
    }
}
