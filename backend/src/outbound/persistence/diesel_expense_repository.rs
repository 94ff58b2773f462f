//! PostgreSQL-backed `ExpenseRepository`.

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_types::BigInt;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{ExpenseRepository, ExpenseRepositoryError};
use crate::domain::{CategoryTotal, Expense, ExpenseCategory, ExpenseFilter};

use super::diesel_basic_error_mapping::{
    foreign_key_violation, map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::diesel_helpers::count_to_total;
use super::models::{ExpenseCategoryRow, ExpenseRow};
use super::pool::{DbPool, PoolError};
use super::schema::{expense_categories, expenses};

/// Diesel implementation of the expense ledger.
#[derive(Clone)]
pub struct DieselExpenseRepository {
    pool: DbPool,
}

impl DieselExpenseRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ExpenseRepositoryError {
    map_basic_pool_error(error, ExpenseRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> ExpenseRepositoryError {
    map_basic_diesel_error(
        error,
        ExpenseRepositoryError::query,
        ExpenseRepositoryError::connection,
    )
}

fn map_category_write_error(
    error: DieselError,
    category: &ExpenseCategory,
) -> ExpenseRepositoryError {
    match unique_violation(&error) {
        Some("expense_categories_name_key") => {
            ExpenseRepositoryError::duplicate_category(&*category.name)
        }
        _ => map_diesel_error(error),
    }
}

fn map_expense_write_error(error: DieselError, expense: &Expense) -> ExpenseRepositoryError {
    match foreign_key_violation(&error) {
        Some("expenses_category_id_fkey") => {
            ExpenseRepositoryError::unknown_category(expense.category_id)
        }
        _ => map_diesel_error(error),
    }
}

fn filtered_expenses(filter: &ExpenseFilter) -> expenses::BoxedQuery<'_, diesel::pg::Pg> {
    let mut query = expenses::table.into_boxed();
    if let Some(from) = filter.from {
        query = query.filter(expenses::incurred_on.ge(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(expenses::incurred_on.le(to));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(expenses::category_id.eq(category_id));
    }
    query
}

#[async_trait]
impl ExpenseRepository for DieselExpenseRepository {
    async fn list_categories(&self) -> Result<Vec<ExpenseCategory>, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ExpenseCategoryRow> = expense_categories::table
            .order(expense_categories::name)
            .select(ExpenseCategoryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(ExpenseCategory::from).collect())
    }

    async fn insert_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<(), ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(expense_categories::table)
            .values(ExpenseCategoryRow::from(category))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_category_write_error(err, category))
    }

    async fn update_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<bool, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(expense_categories::table.find(category.id))
            .set(&ExpenseCategoryRow::from(category))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_category_write_error(err, category))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(expense_categories::table.find(id))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| {
                if foreign_key_violation(&err) == Some("expenses_category_id_fkey") {
                    ExpenseRepositoryError::category_in_use()
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn list_expenses(
        &self,
        filter: ExpenseFilter,
        page: PageRequest,
    ) -> Result<(Vec<Expense>, u64), ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = filtered_expenses(&filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<ExpenseRow> = filtered_expenses(&filter)
            .order((
                expenses::incurred_on.desc(),
                expenses::created_at.desc(),
                expenses::id.desc(),
            ))
            .limit(page.limit())
            .offset(page.offset())
            .select(ExpenseRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok((
            rows.into_iter().map(Expense::from).collect(),
            count_to_total(total),
        ))
    }

    async fn find_expense(&self, id: Uuid) -> Result<Option<Expense>, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = expenses::table
            .find(id)
            .select(ExpenseRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Expense::from))
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<(), ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(expenses::table)
            .values(ExpenseRow::from(expense))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_expense_write_error(err, expense))
    }

    async fn update_expense(&self, expense: &Expense) -> Result<bool, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(expenses::table.find(expense.id))
            .set((
                expenses::category_id.eq(expense.category_id),
                expenses::amount.eq(expense.amount),
                expenses::description.eq(expense.description.as_str()),
                expenses::incurred_on.eq(expense.incurred_on),
            ))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_expense_write_error(err, expense))
    }

    async fn delete_expense(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(expenses::table.find(id))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(map_diesel_error)
    }

    async fn totals_by_category(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>, ExpenseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(Uuid, String, i64)> = expenses::table
            .inner_join(expense_categories::table)
            .filter(expenses::incurred_on.ge(from))
            .filter(expenses::incurred_on.le(to))
            .group_by((expense_categories::id, expense_categories::name))
            .select((
                expense_categories::id,
                expense_categories::name,
                sql::<BigInt>("SUM(expenses.amount)::BIGINT"),
            ))
            .order(expense_categories::name)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|(category_id, name, total)| CategoryTotal {
                category_id,
                name,
                total,
            })
            .collect())
    }
}
