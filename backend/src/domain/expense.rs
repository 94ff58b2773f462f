//! Shop running costs grouped into categories.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Money;
use super::user::UserId;

/// Expense input failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpenseValidationError {
    /// Amount zero or negative.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    /// Description blank after trimming.
    #[error("description must not be empty")]
    EmptyDescription,
}

/// Bucket for expenses, such as rent or packaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    /// Identifier.
    pub id: Uuid,
    /// Unique name.
    pub name: String,
    /// Optional explanation.
    pub description: Option<String>,
}

/// One recorded cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Identifier.
    pub id: Uuid,
    /// Category.
    pub category_id: Uuid,
    /// Positive amount in minor units.
    pub amount: Money,
    /// What was paid for.
    pub description: String,
    /// Day the cost was incurred.
    pub incurred_on: NaiveDate,
    /// Staff member who recorded it.
    pub recorded_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating or replacing an expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    /// Category.
    pub category_id: Uuid,
    /// Positive amount.
    pub amount: Money,
    /// Non-empty description.
    pub description: String,
    /// Day incurred.
    pub incurred_on: NaiveDate,
}

impl ExpenseDraft {
    /// Trim and validate raw input.
    pub fn new(
        category_id: Uuid,
        amount: Money,
        description: &str,
        incurred_on: NaiveDate,
    ) -> Result<Self, ExpenseValidationError> {
        if amount <= 0 {
            return Err(ExpenseValidationError::NonPositiveAmount);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(ExpenseValidationError::EmptyDescription);
        }
        Ok(Self {
            category_id,
            amount,
            description: description.to_owned(),
            incurred_on,
        })
    }
}

/// Expense listing filter. Dates are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    /// Earliest day.
    pub from: Option<NaiveDate>,
    /// Latest day.
    pub to: Option<NaiveDate>,
    /// Restrict to one category.
    pub category_id: Option<Uuid>,
}

/// Spend for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    /// Category.
    pub category_id: Uuid,
    /// Category name.
    pub name: String,
    /// Summed amount.
    pub total: Money,
}

/// Totals for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    /// First day, inclusive.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
    /// Grand total.
    pub total: Money,
    /// Per-category totals, largest first.
    pub by_category: Vec<CategoryTotal>,
}

impl ExpenseSummary {
    /// Assemble a summary from per-category totals.
    pub fn new(from: NaiveDate, to: NaiveDate, mut by_category: Vec<CategoryTotal>) -> Self {
        by_category.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        let total = by_category.iter().map(|c| c.total).sum();
        Self {
            from,
            to,
            total,
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).expect("date")
    }

    #[rstest]
    #[case(0, "rent", false)]
    #[case(-5, "rent", false)]
    #[case(100, "   ", false)]
    #[case(100, " rent ", true)]
    fn draft_validation(#[case] amount: Money, #[case] description: &str, #[case] ok: bool) {
        let draft = ExpenseDraft::new(Uuid::new_v4(), amount, description, day());
        assert_eq!(draft.is_ok(), ok);
        if let Ok(draft) = draft {
            assert_eq!(draft.description, "rent");
        }
    }

    #[rstest]
    fn summary_sorts_and_totals() {
        let small = CategoryTotal {
            category_id: Uuid::new_v4(),
            name: "Packaging".to_owned(),
            total: 500,
        };
        let large = CategoryTotal {
            category_id: Uuid::new_v4(),
            name: "Rent".to_owned(),
            total: 40_000,
        };
        let summary = ExpenseSummary::new(day(), day(), vec![small, large]);
        assert_eq!(summary.total, 40_500);
        assert_eq!(summary.by_category[0].name, "Rent");
    }
}
