//! Expense bookkeeping for the back office.

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::ExpenseRepository;
use crate::domain::{
    Error, Expense, ExpenseCategory, ExpenseDraft, ExpenseFilter, ExpenseSummary,
    ExpenseValidationError, UserId,
};

const CATEGORY_NAME_MAX: usize = 100;

fn validation_error(err: ExpenseValidationError) -> Error {
    let (field, code) = match err {
        ExpenseValidationError::NonPositiveAmount => ("amount", "non_positive_amount"),
        ExpenseValidationError::EmptyDescription => ("description", "required"),
    };
    Error::invalid_field(field, code, err.to_string())
}

fn inverted_range(from: NaiveDate, to: NaiveDate) -> Result<(), Error> {
    if from > to {
        return Err(Error::invalid_field(
            "to",
            "inverted_range",
            "to must not be before from",
        ));
    }
    Ok(())
}

fn category(id: Uuid, name: &str, description: Option<String>) -> Result<ExpenseCategory, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_field("name", "required", "name is required"));
    }
    if name.chars().count() > CATEGORY_NAME_MAX {
        return Err(Error::invalid_field(
            "name",
            "too_long",
            format!("name must be at most {CATEGORY_NAME_MAX} characters"),
        ));
    }
    Ok(ExpenseCategory {
        id,
        name: name.to_owned(),
        description: description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
    })
}

/// Raw expense fields before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseInput {
    /// Category.
    pub category_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
    /// What was paid for.
    pub description: String,
    /// Day incurred.
    pub incurred_on: NaiveDate,
}

impl ExpenseInput {
    fn validate(&self) -> Result<ExpenseDraft, Error> {
        ExpenseDraft::new(
            self.category_id,
            self.amount,
            &self.description,
            self.incurred_on,
        )
        .map_err(validation_error)
    }
}

/// Expense service.
#[derive(Clone)]
pub struct ExpenseService {
    expenses: Arc<dyn ExpenseRepository>,
    clock: Arc<dyn Clock>,
}

impl ExpenseService {
    /// Create the service.
    pub fn new(expenses: Arc<dyn ExpenseRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { expenses, clock }
    }

    /// Every category, by name.
    pub async fn list_categories(&self) -> Result<Vec<ExpenseCategory>, Error> {
        Ok(self.expenses.list_categories().await?)
    }

    /// Add a category.
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<ExpenseCategory, Error> {
        let category = category(Uuid::new_v4(), name, description)?;
        self.expenses.insert_category(&category).await?;
        info!(category_id = %category.id, name = %category.name, "expense category created");
        Ok(category)
    }

    /// Rename or re-describe a category.
    pub async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<ExpenseCategory, Error> {
        let category = category(id, name, description)?;
        if !self.expenses.update_category(&category).await? {
            return Err(Error::not_found(format!("expense category {id} not found")));
        }
        Ok(category)
    }

    /// Delete a category that has no expenses.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), Error> {
        if !self.expenses.delete_category(id).await? {
            return Err(Error::not_found(format!("expense category {id} not found")));
        }
        Ok(())
    }

    /// Page through expenses.
    pub async fn list(
        &self,
        filter: ExpenseFilter,
        page: PageRequest,
    ) -> Result<Page<Expense>, Error> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            inverted_range(from, to)?;
        }
        let (items, total) = self.expenses.list_expenses(filter, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Fetch one expense.
    pub async fn get(&self, id: Uuid) -> Result<Expense, Error> {
        self.expenses
            .find_expense(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("expense {id} not found")))
    }

    /// Record an expense.
    pub async fn create(&self, input: ExpenseInput, actor: UserId) -> Result<Expense, Error> {
        let draft = input.validate()?;
        let expense = Expense {
            id: Uuid::new_v4(),
            category_id: draft.category_id,
            amount: draft.amount,
            description: draft.description,
            incurred_on: draft.incurred_on,
            recorded_by: actor,
            created_at: self.clock.utc(),
        };
        self.expenses.insert_expense(&expense).await?;
        info!(
            expense_id = %expense.id,
            amount = expense.amount,
            recorded_by = %actor,
            "expense recorded"
        );
        Ok(expense)
    }

    /// Correct an expense. The recorder and creation time are kept.
    pub async fn update(&self, id: Uuid, input: ExpenseInput) -> Result<Expense, Error> {
        let draft = input.validate()?;
        let existing = self.get(id).await?;
        let expense = Expense {
            category_id: draft.category_id,
            amount: draft.amount,
            description: draft.description,
            incurred_on: draft.incurred_on,
            ..existing
        };
        if !self.expenses.update_expense(&expense).await? {
            return Err(Error::not_found(format!("expense {id} not found")));
        }
        Ok(expense)
    }

    /// Remove an expense.
    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        if !self.expenses.delete_expense(id).await? {
            return Err(Error::not_found(format!("expense {id} not found")));
        }
        info!(expense_id = %id, "expense deleted");
        Ok(())
    }

    /// Totals for the inclusive day range.
    pub async fn summary(&self, from: NaiveDate, to: NaiveDate) -> Result<ExpenseSummary, Error> {
        inverted_range(from, to)?;
        let totals = self.expenses.totals_by_category(from, to).await?;
        Ok(ExpenseSummary::new(from, to, totals))
    }
}
