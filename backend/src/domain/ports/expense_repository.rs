//! Port for expense bookkeeping.

use async_trait::async_trait;
use chrono::NaiveDate;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::{CategoryTotal, Error, Expense, ExpenseCategory, ExpenseFilter};

use super::define_port_error;

define_port_error! {
    /// Errors raised by expense repository adapters.
    pub enum ExpenseRepositoryError: persistence {
        /// Another category already uses the name.
        DuplicateCategory { name: String } => "expense category {name} already exists",
        /// The category still has expenses.
        CategoryInUse => "expense category still has expenses",
        /// The expense references a category that does not exist.
        UnknownCategory { id: Uuid } => "expense category {id} does not exist",
    }
}

impl From<ExpenseRepositoryError> for Error {
    fn from(err: ExpenseRepositoryError) -> Self {
        match err {
            ExpenseRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("expense repository unavailable: {message}"))
            }
            ExpenseRepositoryError::Query { message } => {
                Error::internal(format!("expense repository error: {message}"))
            }
            ExpenseRepositoryError::DuplicateCategory { name } => {
                Error::conflict(format!("expense category {name} already exists"))
                    .with_reason("expense_category_taken")
            }
            ExpenseRepositoryError::CategoryInUse => {
                Error::conflict("expense category still has expenses")
                    .with_reason("expense_category_in_use")
            }
            ExpenseRepositoryError::UnknownCategory { id } => {
                Error::invalid_field("categoryId", "unknown_category", format!(
                    "expense category {id} does not exist"
                ))
            }
        }
    }
}

/// Storage for expenses and their categories.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Every category, ordered by name.
    async fn list_categories(&self) -> Result<Vec<ExpenseCategory>, ExpenseRepositoryError>;

    /// Insert a category.
    async fn insert_category(&self, category: &ExpenseCategory)
    -> Result<(), ExpenseRepositoryError>;

    /// Overwrite a category.
    async fn update_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<bool, ExpenseRepositoryError>;

    /// Delete a category without expenses.
    async fn delete_category(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError>;

    /// Page through expenses, most recent day first.
    async fn list_expenses(
        &self,
        filter: ExpenseFilter,
        page: PageRequest,
    ) -> Result<(Vec<Expense>, u64), ExpenseRepositoryError>;

    /// Fetch an expense.
    async fn find_expense(&self, id: Uuid) -> Result<Option<Expense>, ExpenseRepositoryError>;

    /// Insert an expense.
    async fn insert_expense(&self, expense: &Expense) -> Result<(), ExpenseRepositoryError>;

    /// Overwrite an expense.
    async fn update_expense(&self, expense: &Expense) -> Result<bool, ExpenseRepositoryError>;

    /// Delete an expense.
    async fn delete_expense(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError>;

    /// Per-category totals for expenses incurred between the inclusive dates.
    /// Categories without expenses are omitted.
    async fn totals_by_category(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>, ExpenseRepositoryError>;
}
