//! Back-office order handling and the point-of-sale till.
//!
//! ```text
//! GET /api/v1/admin/orders?status=paid&channel=online
//! PUT /api/v1/admin/orders/{id}/status {"status":"shipped"}
//! POST /api/v1/admin/pos/sales {"items":[…],"payment":{"method":"cash","amountTendered":500000}}
//! ```

use actix_web::{HttpResponse, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{CartLine, Money, OrderDetail, OrderFilter, PosPayment, PosSaleRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, page_request, parse_choice, parse_optional_choice,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderQuery {
    /// Order status, e.g. `paid`.
    pub status: Option<String>,
    /// `online` or `pos`.
    pub channel: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderQuery {
    fn filter(&self) -> ApiResult<OrderFilter> {
        Ok(OrderFilter {
            status: parse_optional_choice(self.status.as_deref(), FieldName::new("status"))?,
            channel: parse_optional_choice(self.channel.as_deref(), FieldName::new("channel"))?,
        })
    }
}

/// Target fulfilment status.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct StatusForm {
    #[schema(example = "shipped")]
    pub status: String,
}

/// How a till sale is settled.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PosPaymentForm {
    /// Cash at the till; change is computed from the tender.
    Cash {
        #[serde(rename = "amountTendered")]
        amount_tendered: Money,
    },
    /// STK push to the customer's phone.
    Mpesa { phone: String },
}

impl From<PosPaymentForm> for PosPayment {
    fn from(form: PosPaymentForm) -> Self {
        match form {
            PosPaymentForm::Cash { amount_tendered } => Self::Cash { amount_tendered },
            PosPaymentForm::Mpesa { phone } => Self::Mpesa { phone },
        }
    }
}

/// Till sale.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PosSaleForm {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<CartLine>,
    pub payment: PosPaymentForm,
    pub discount_code: Option<String>,
    pub customer_phone: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderQuery),
    responses(
        (status = 200, description = "Page of orders", body = Object),
        (status = 400, description = "Invalid filter or page", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListOrders"
)]
#[get("/admin/orders")]
pub async fn list_orders(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<OrderQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.filter()?;
    let page = page_request(query.page, query.per_page)?;
    Ok(HttpResponse::Ok().json(state.orders.list(filter, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = Object),
        (status = 404, description = "Unknown order", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminGetOrder"
)]
#[get("/admin/orders/{id}")]
pub async fn get_order(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<OrderDetail>> {
    Ok(web::Json(state.orders.get(&staff, id.into_inner()).await?))
}

/// Move an order along `pending → paid → processing → shipped → delivered`.
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = StatusForm,
    responses(
        (status = 200, description = "Order updated", body = Object),
        (status = 400, description = "Unknown status", body = ErrorSchema),
        (status = 409, description = "Transition not allowed", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateOrderStatus"
)]
#[put("/admin/orders/{id}/status")]
pub async fn update_status(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    id: web::Path<Uuid>,
    payload: web::Json<StatusForm>,
) -> ApiResult<web::Json<OrderDetail>> {
    let status = parse_choice(payload.status.trim(), FieldName::new("status"))?;
    let order = state
        .orders
        .update_status(&staff, id.into_inner(), status)
        .await?;
    Ok(web::Json(order))
}

/// Cancel any order that has not shipped; stock is returned.
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = Object),
        (status = 409, description = "Order can no longer be cancelled", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminCancelOrder"
)]
#[post("/admin/orders/{id}/cancel")]
pub async fn cancel_order(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<OrderDetail>> {
    Ok(web::Json(state.orders.cancel(&staff, id.into_inner()).await?))
}

/// Record a till sale. Cash sales complete immediately; M-Pesa sales wait
/// for the STK callback.
#[utoipa::path(
    post,
    path = "/api/v1/admin/pos/sales",
    request_body = PosSaleForm,
    responses(
        (status = 201, description = "Sale recorded", body = Object),
        (status = 400, description = "Invalid sale", body = ErrorSchema),
        (status = 409, description = "Insufficient stock", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "posSale"
)]
#[post("/admin/pos/sales")]
pub async fn pos_sale(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    payload: web::Json<PosSaleForm>,
) -> ApiResult<HttpResponse> {
    let PosSaleForm {
        items,
        payment,
        discount_code,
        customer_phone,
    } = payload.into_inner();
    let sale = state
        .orders
        .sell(
            &staff,
            PosSaleRequest {
                items,
                payment: payment.into(),
                discount_code,
                customer_phone,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(sale))
}
