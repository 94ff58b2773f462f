//! Expense categories, the expense ledger and period summaries.

use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{Expense, ExpenseCategory, ExpenseFilter, ExpenseInput, ExpenseSummary, Money};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, missing_field_error, page_request, parse_date, parse_optional_date,
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategoryForm {
    #[schema(example = "Rent")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseForm {
    pub category_id: Uuid,
    /// Cents.
    #[schema(example = 8500000)]
    pub amount: Money,
    #[schema(example = "March shop rent")]
    pub description: String,
    /// `YYYY-MM-DD`.
    #[schema(example = "2026-03-01")]
    pub incurred_on: String,
}

impl ExpenseForm {
    fn into_input(self) -> ApiResult<ExpenseInput> {
        Ok(ExpenseInput {
            category_id: self.category_id,
            amount: self.amount,
            description: self.description,
            incurred_on: parse_date(&self.incurred_on, FieldName::new("incurredOn"))?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExpenseQuery {
    /// First day, inclusive.
    pub from: Option<String>,
    /// Last day, inclusive.
    pub to: Option<String>,
    pub category_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// First day, inclusive.
    pub from: Option<String>,
    /// Last day, inclusive.
    pub to: Option<String>,
}

fn required_date(value: Option<&str>, field: FieldName) -> ApiResult<NaiveDate> {
    let raw = value.ok_or_else(|| missing_field_error(field))?;
    parse_date(raw, field)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/expense-categories",
    responses((status = 200, description = "Expense categories", body = Object)),
    tags = ["admin"],
    operation_id = "listExpenseCategories"
)]
#[get("/admin/expense-categories")]
pub async fn list_categories(
    state: web::Data<HttpState>,
    _staff: Staff,
) -> ApiResult<web::Json<Vec<ExpenseCategory>>> {
    Ok(web::Json(state.expenses.list_categories().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/expense-categories",
    request_body = ExpenseCategoryForm,
    responses(
        (status = 201, description = "Category created", body = Object),
        (status = 400, description = "Invalid category", body = ErrorSchema),
        (status = 409, description = "Name already used", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createExpenseCategory"
)]
#[post("/admin/expense-categories")]
pub async fn create_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    payload: web::Json<ExpenseCategoryForm>,
) -> ApiResult<HttpResponse> {
    let ExpenseCategoryForm { name, description } = payload.into_inner();
    let category = state.expenses.create_category(&name, description).await?;
    Ok(HttpResponse::Created().json(category))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/expense-categories/{id}",
    params(("id" = Uuid, Path, description = "Expense category id")),
    request_body = ExpenseCategoryForm,
    responses(
        (status = 200, description = "Category updated", body = Object),
        (status = 404, description = "Unknown category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateExpenseCategory"
)]
#[put("/admin/expense-categories/{id}")]
pub async fn update_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<ExpenseCategoryForm>,
) -> ApiResult<web::Json<ExpenseCategory>> {
    let ExpenseCategoryForm { name, description } = payload.into_inner();
    let category = state
        .expenses
        .update_category(id.into_inner(), &name, description)
        .await?;
    Ok(web::Json(category))
}

/// Categories that still hold expenses cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/expense-categories/{id}",
    params(("id" = Uuid, Path, description = "Expense category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Unknown category", body = ErrorSchema),
        (status = 409, description = "Category in use", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteExpenseCategory"
)]
#[delete("/admin/expense-categories/{id}")]
pub async fn delete_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.expenses.delete_category(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/expenses",
    params(ExpenseQuery),
    responses(
        (status = 200, description = "Page of expenses", body = Object),
        (status = 400, description = "Invalid filter", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "listExpenses"
)]
#[get("/admin/expenses")]
pub async fn list_expenses(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<ExpenseQuery>,
) -> ApiResult<HttpResponse> {
    let filter = ExpenseFilter {
        from: parse_optional_date(query.from.as_deref(), FieldName::new("from"))?,
        to: parse_optional_date(query.to.as_deref(), FieldName::new("to"))?,
        category_id: query.category_id,
    };
    let page = page_request(query.page, query.per_page)?;
    Ok(HttpResponse::Ok().json(state.expenses.list(filter, page).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/expenses",
    request_body = ExpenseForm,
    responses(
        (status = 201, description = "Expense recorded", body = Object),
        (status = 400, description = "Invalid expense", body = ErrorSchema),
        (status = 404, description = "Unknown category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createExpense"
)]
#[post("/admin/expenses")]
pub async fn create_expense(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    payload: web::Json<ExpenseForm>,
) -> ApiResult<HttpResponse> {
    let input = payload.into_inner().into_input()?;
    let expense = state.expenses.create(input, staff.user_id).await?;
    Ok(HttpResponse::Created().json(expense))
}

/// Totals per category for an inclusive day range.
#[utoipa::path(
    get,
    path = "/api/v1/admin/expenses/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Expense summary", body = Object),
        (status = 400, description = "Missing or invalid range", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "expenseSummary"
)]
#[get("/admin/expenses/summary")]
pub async fn expense_summary(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<SummaryQuery>,
) -> ApiResult<web::Json<ExpenseSummary>> {
    let from = required_date(query.from.as_deref(), FieldName::new("from"))?;
    let to = required_date(query.to.as_deref(), FieldName::new("to"))?;
    Ok(web::Json(state.expenses.summary(from, to).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Expense", body = Object),
        (status = 404, description = "Unknown expense", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "getExpense"
)]
#[get("/admin/expenses/{id}")]
pub async fn get_expense(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<Expense>> {
    Ok(web::Json(state.expenses.get(id.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    request_body = ExpenseForm,
    responses(
        (status = 200, description = "Expense updated", body = Object),
        (status = 400, description = "Invalid expense", body = ErrorSchema),
        (status = 404, description = "Unknown expense or category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateExpense"
)]
#[put("/admin/expenses/{id}")]
pub async fn update_expense(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<ExpenseForm>,
) -> ApiResult<web::Json<Expense>> {
    let input = payload.into_inner().into_input()?;
    Ok(web::Json(state.expenses.update(id.into_inner(), input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 404, description = "Unknown expense", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteExpense"
)]
#[delete("/admin/expenses/{id}")]
pub async fn delete_expense(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.expenses.delete(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
