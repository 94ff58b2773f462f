//! Stock ledger and low-stock alerts.

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{LowStockItem, MovementKind};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, page_request, parse_choice};

const DEFAULT_LOW_STOCK_LIMIT: u32 = 20;

/// Manual stock movement.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementForm {
    pub variant_id: Uuid,
    /// `addition`, `adjustment`, `damage`, `sale` or `return`.
    #[schema(example = "addition")]
    pub kind: String,
    /// Units moved; for `adjustment` the new absolute quantity.
    #[schema(example = 12)]
    pub quantity: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementQuery {
    /// Restrict to one variant.
    pub variant_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockQuery {
    /// Maximum rows (default 20, at most 100).
    pub limit: Option<u32>,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/stock/movements",
    request_body = MovementForm,
    responses(
        (status = 201, description = "Movement recorded", body = Object),
        (status = 400, description = "Invalid movement", body = ErrorSchema),
        (status = 404, description = "Unknown variant", body = ErrorSchema),
        (status = 409, description = "Stock would go negative", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "recordStockMovement"
)]
#[post("/admin/stock/movements")]
pub async fn record_movement(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    payload: web::Json<MovementForm>,
) -> ApiResult<HttpResponse> {
    let MovementForm {
        variant_id,
        kind,
        quantity,
        reason,
    } = payload.into_inner();
    let kind: MovementKind = parse_choice(kind.trim(), FieldName::new("kind"))?;
    let movement = state
        .stock
        .record_movement(variant_id, kind, quantity, reason, staff.user_id)
        .await?;
    Ok(HttpResponse::Created().json(movement))
}

/// Ledger rows, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/stock/movements",
    params(MovementQuery),
    responses(
        (status = 200, description = "Page of movements", body = Object),
        (status = 400, description = "Invalid page", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "listStockMovements"
)]
#[get("/admin/stock/movements")]
pub async fn list_movements(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<MovementQuery>,
) -> ApiResult<HttpResponse> {
    let page = page_request(query.page, query.per_page)?;
    let movements = state.stock.list_movements(query.variant_id, page).await?;
    Ok(HttpResponse::Ok().json(movements))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stock/low",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Variants at or below threshold", body = Object),
        (status = 403, description = "Staff only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "lowStock"
)]
#[get("/admin/stock/low")]
pub async fn low_stock(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<LowStockQuery>,
) -> ApiResult<web::Json<Vec<LowStockItem>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOW_STOCK_LIMIT);
    Ok(web::Json(state.stock.low_stock(limit).await?))
}
