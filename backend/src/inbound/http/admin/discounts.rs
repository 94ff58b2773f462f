//! Discount code management.

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Discount, DiscountDraft, Money};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, PageQuery, parse_choice, parse_instant, required_text,
};

/// Discount definition. Codes are stored upper-case.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountForm {
    #[schema(example = "KARIBU10")]
    pub code: String,
    pub description: Option<String>,
    /// `percentage` (1 to 100) or `fixed` (cents).
    #[schema(example = "percentage")]
    pub kind: String,
    #[schema(example = 10)]
    pub value: i64,
    #[serde(default)]
    pub min_order_amount: Money,
    /// RFC 3339 timestamp or date; defaults to now.
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub usage_limit: Option<i32>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

impl DiscountForm {
    fn into_draft(self) -> ApiResult<DiscountDraft> {
        let starts_at = self
            .starts_at
            .as_deref()
            .map(|raw| parse_instant(raw, FieldName::new("startsAt")))
            .transpose()?;
        let ends_at = self
            .ends_at
            .as_deref()
            .map(|raw| parse_instant(raw, FieldName::new("endsAt")))
            .transpose()?;
        Ok(DiscountDraft {
            code: required_text(&self.code, FieldName::new("code"))?,
            description: self.description,
            kind: parse_choice(self.kind.trim(), FieldName::new("kind"))?,
            value: self.value,
            min_order_amount: self.min_order_amount,
            starts_at,
            ends_at,
            usage_limit: self.usage_limit,
            is_active: self.is_active,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/discounts",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of discounts", body = Object),
        (status = 403, description = "Staff only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "listDiscounts"
)]
#[get("/admin/discounts")]
pub async fn list_discounts(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<PageQuery>,
) -> ApiResult<HttpResponse> {
    let discounts = state.discounts.list(query.into_inner().into_request()?).await?;
    Ok(HttpResponse::Ok().json(discounts))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/discounts",
    request_body = DiscountForm,
    responses(
        (status = 201, description = "Discount created", body = Object),
        (status = 400, description = "Invalid discount", body = ErrorSchema),
        (status = 409, description = "Code already used", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createDiscount"
)]
#[post("/admin/discounts")]
pub async fn create_discount(
    state: web::Data<HttpState>,
    _staff: Staff,
    payload: web::Json<DiscountForm>,
) -> ApiResult<HttpResponse> {
    let discount = state
        .discounts
        .create(payload.into_inner().into_draft()?)
        .await?;
    Ok(HttpResponse::Created().json(discount))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses(
        (status = 200, description = "Discount", body = Object),
        (status = 404, description = "Unknown discount", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "getDiscount"
)]
#[get("/admin/discounts/{id}")]
pub async fn get_discount(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<Discount>> {
    Ok(web::Json(state.discounts.get(id.into_inner()).await?))
}

/// Replace a discount definition; usage so far is kept.
#[utoipa::path(
    put,
    path = "/api/v1/admin/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    request_body = DiscountForm,
    responses(
        (status = 200, description = "Discount updated", body = Object),
        (status = 400, description = "Invalid discount", body = ErrorSchema),
        (status = 404, description = "Unknown discount", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateDiscount"
)]
#[put("/admin/discounts/{id}")]
pub async fn update_discount(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<DiscountForm>,
) -> ApiResult<web::Json<Discount>> {
    let draft = payload.into_inner().into_draft()?;
    Ok(web::Json(
        state.discounts.update(id.into_inner(), draft).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses(
        (status = 204, description = "Discount deleted"),
        (status = 404, description = "Unknown discount", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteDiscount"
)]
#[delete("/admin/discounts/{id}")]
pub async fn delete_discount(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.discounts.delete(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
