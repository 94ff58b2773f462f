//! Sales reporting for the back office.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::ports::{ExpenseRepository, OrderRepository};
use crate::domain::{Error, SalesReport, build_sales_report};

/// Longest window a single report may cover.
const MAX_WINDOW_DAYS: i64 = 366;

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    orders: Arc<dyn OrderRepository>,
    expenses: Arc<dyn ExpenseRepository>,
}

impl ReportService {
    /// Create the service.
    pub fn new(orders: Arc<dyn OrderRepository>, expenses: Arc<dyn ExpenseRepository>) -> Self {
        Self { orders, expenses }
    }

    /// Settled sales for orders created in `[from, to)`, with the expenses
    /// incurred on the days the window touches.
    pub async fn sales_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SalesReport, Error> {
        if from >= to {
            return Err(Error::invalid_field(
                "to",
                "inverted_range",
                "to must be after from",
            ));
        }
        if to - from > Duration::days(MAX_WINDOW_DAYS) {
            return Err(Error::invalid_field(
                "to",
                "range_too_long",
                format!("reports cover at most {MAX_WINDOW_DAYS} days"),
            ));
        }
        let orders = self.orders.created_between(from, to).await?;
        let last_day = (to - Duration::nanoseconds(1)).date_naive();
        let expenses: i64 = self
            .expenses
            .totals_by_category(from.date_naive(), last_day)
            .await?
            .iter()
            .map(|c| c.total)
            .sum();
        debug!(%from, %to, orders = orders.len(), "sales report built");
        Ok(build_sales_report(from, to, &orders, expenses))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{MockExpenseRepository, MockOrderRepository};
    use crate::domain::{CategoryTotal, ErrorCode};
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;
    use uuid::Uuid;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[tokio::test]
    async fn expenses_cover_the_days_inside_the_window() {
        let mut orders = MockOrderRepository::new();
        orders
            .expect_created_between()
            .withf(|from, to| *from == at(1) && *to == at(8))
            .return_once(|_, _| Ok(Vec::new()));
        let mut expenses = MockExpenseRepository::new();
        expenses
            .expect_totals_by_category()
            .withf(|from, to| {
                *from == NaiveDate::from_ymd_opt(2026, 3, 1).expect("date")
                    && *to == NaiveDate::from_ymd_opt(2026, 3, 7).expect("date")
            })
            .return_once(|_, _| {
                Ok(vec![CategoryTotal {
                    category_id: Uuid::new_v4(),
                    name: "Rent".into(),
                    total: 50_000,
                }])
            });

        let report = ReportService::new(Arc::new(orders), Arc::new(expenses))
            .sales_report(at(1), at(8))
            .await
            .expect("report");
        assert_eq!(report.expenses, 50_000);
        assert_eq!(report.estimated_profit, -50_000);
    }

    #[rstest]
    #[case(at(8), at(1))]
    #[case(at(1), at(1))]
    #[tokio::test]
    async fn empty_or_inverted_windows_are_rejected(
        #[case] from: DateTime<Utc>,
        #[case] to: DateTime<Utc>,
    ) {
        let mut orders = MockOrderRepository::new();
        orders.expect_created_between().times(0);
        let error = ReportService::new(Arc::new(orders), Arc::new(MockExpenseRepository::new()))
            .sales_report(from, to)
            .await
            .expect_err("rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }
}
