//! Sales reporting.

use actix_web::{get, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::SalesReport;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, missing_field_error, parse_instant};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Inclusive start, RFC 3339 or `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Exclusive end, RFC 3339 or `YYYY-MM-DD`.
    pub to: Option<String>,
}

fn required_instant(
    value: Option<&str>,
    field: FieldName,
) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    let raw = value.ok_or_else(|| missing_field_error(field))?;
    parse_instant(raw, field)
}

/// Settled sales, channel and payment breakdowns, top products and
/// estimated profit for a window of at most 366 days.
#[utoipa::path(
    get,
    path = "/api/v1/admin/reports/sales",
    params(ReportQuery),
    responses(
        (status = 200, description = "Sales report", body = Object),
        (status = 400, description = "Missing or invalid window", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "salesReport"
)]
#[get("/admin/reports/sales")]
pub async fn sales_report(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<ReportQuery>,
) -> ApiResult<web::Json<SalesReport>> {
    let from = required_instant(query.from.as_deref(), FieldName::new("from"))?;
    let to = required_instant(query.to.as_deref(), FieldName::new("to"))?;
    Ok(web::Json(state.reports.sales_report(from, to).await?))
}
