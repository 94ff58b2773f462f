//! Customer checkout, order history and payment retries.
//!
//! ```text
//! POST /api/v1/discounts/validate {"code":"KARIBU10"}
//! POST /api/v1/checkout {"shipping":{…},"paymentMethod":"mpesa"}
//! GET /api/v1/orders?page=1
//! GET /api/v1/orders/track/HC-20260302-7QK2ZP
//! POST /api/v1/orders/{id}/payment {"phone":"0712345678"}
//! ```

use actix_web::{HttpResponse, get, post, web};
use pagination::Page;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    CheckoutRequest, DiscountQuote, Money, OrderDetail, Payment, PaymentInitiation,
    ShippingDetails,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::cache_control::private_no_cache_header;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::CartSession;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, PageQuery, parse_choice, required_text};

/// Discount preview form. Without a subtotal the session cart is priced.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountRequest {
    #[schema(example = "KARIBU10")]
    pub code: String,
    pub subtotal: Option<Money>,
}

/// Delivery address.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    #[schema(example = "Wanjiru Kamau")]
    pub recipient: String,
    #[schema(example = "0712345678")]
    pub phone: String,
    #[schema(example = "Moi Avenue 12")]
    pub address: String,
    #[schema(example = "Nairobi")]
    pub city: String,
}

/// Checkout form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub shipping: ShippingForm,
    /// `mpesa` or `cash_on_delivery`.
    #[schema(example = "mpesa")]
    pub payment_method: String,
    pub discount_code: Option<String>,
    pub notes: Option<String>,
    /// Phone to bill when it differs from the delivery phone.
    pub mpesa_phone: Option<String>,
}

impl CheckoutForm {
    fn into_request(self) -> ApiResult<CheckoutRequest> {
        let payment_method = parse_choice(
            self.payment_method.trim(),
            FieldName::new("paymentMethod"),
        )?;
        let ShippingForm {
            recipient,
            phone,
            address,
            city,
        } = self.shipping;
        Ok(CheckoutRequest {
            shipping: ShippingDetails {
                recipient,
                phone,
                address,
                city,
            },
            payment_method,
            discount_code: self
                .discount_code
                .map(|code| code.trim().to_owned())
                .filter(|code| !code.is_empty()),
            notes: self.notes,
            mpesa_phone: self.mpesa_phone,
        })
    }
}

/// Phone to send another STK push to.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRetryRequest {
    #[schema(example = "0712345678")]
    pub phone: String,
}

/// Preview what a discount code does.
#[utoipa::path(
    post,
    path = "/api/v1/discounts/validate",
    request_body = ValidateDiscountRequest,
    responses(
        (status = 200, description = "Discount preview", body = Object),
        (status = 400, description = "Code unknown, expired, exhausted or below minimum", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "validateDiscount",
    security([])
)]
#[post("/discounts/validate")]
pub async fn validate_discount(
    state: web::Data<HttpState>,
    session: CartSession,
    payload: web::Json<ValidateDiscountRequest>,
) -> ApiResult<web::Json<DiscountQuote>> {
    let ValidateDiscountRequest { code, subtotal } = payload.into_inner();
    let code = required_text(&code, FieldName::new("code"))?;
    let subtotal = match subtotal {
        Some(amount) => amount,
        None => state.cart.view(&session.cart()).await?.subtotal,
    };
    Ok(web::Json(state.discounts.validate(&code, subtotal).await?))
}

/// Turn the session cart into an order.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutForm,
    responses(
        (status = 201, description = "Order placed; M-Pesa orders carry the STK push", body = Object),
        (status = 400, description = "Empty cart, bad form or rejected discount", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Email not verified", body = ErrorSchema),
        (status = 409, description = "Insufficient stock", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "checkout"
)]
#[post("/checkout")]
pub async fn checkout(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    session: CartSession,
    payload: web::Json<CheckoutForm>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner().into_request()?;
    let mut cart = session.cart();
    let receipt = state.orders.checkout(&principal, &mut cart, request).await?;
    session.store(&cart)?;
    Ok(HttpResponse::Created().json(receipt))
}

/// The caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of orders", body = Object),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "listMyOrders"
)]
#[get("/orders")]
pub async fn my_orders(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    query: web::Query<PageQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.into_inner().into_request()?;
    let orders: Page<OrderDetail> = state.orders.my_orders(&principal, page).await?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(orders))
}

/// Look an order up by its public number.
#[utoipa::path(
    get,
    path = "/api/v1/orders/track/{orderNumber}",
    params(("orderNumber" = String, Path, description = "Order number, e.g. HC-20260302-7QK2ZP")),
    responses(
        (status = 200, description = "Order", body = Object),
        (status = 404, description = "Unknown order or not yours", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "trackOrder"
)]
#[get("/orders/track/{order_number}")]
pub async fn track_order(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    order_number: web::Path<String>,
) -> ApiResult<web::Json<OrderDetail>> {
    Ok(web::Json(state.orders.track(&principal, &order_number).await?))
}

/// One order with its lines.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = Object),
        (status = 404, description = "Unknown order or not yours", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "getOrder"
)]
#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<OrderDetail>> {
    Ok(web::Json(state.orders.get(&principal, id.into_inner()).await?))
}

/// Cancel a pending order; its stock is returned.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Cancelled order", body = Object),
        (status = 404, description = "Unknown order or not yours", body = ErrorSchema),
        (status = 409, description = "Order can no longer be cancelled", body = ErrorSchema)
    ),
    tags = ["orders"],
    operation_id = "cancelOrder"
)]
#[post("/orders/{id}/cancel")]
pub async fn cancel_order(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<OrderDetail>> {
    Ok(web::Json(state.orders.cancel(&principal, id.into_inner()).await?))
}

/// Send another STK push for an unpaid order.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PaymentRetryRequest,
    responses(
        (status = 202, description = "STK push started", body = Object),
        (status = 400, description = "Invalid phone", body = ErrorSchema),
        (status = 409, description = "Order already paid or closed", body = ErrorSchema),
        (status = 503, description = "Gateway unavailable", body = ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "retryPayment"
)]
#[post("/orders/{id}/payment")]
pub async fn retry_payment(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    id: web::Path<Uuid>,
    payload: web::Json<PaymentRetryRequest>,
) -> ApiResult<HttpResponse> {
    let started: PaymentInitiation = state
        .payments
        .retry(&principal, id.into_inner(), &payload.phone)
        .await?;
    Ok(HttpResponse::Accepted().json(started))
}

/// Latest payment attempt for an order.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Latest payment", body = Object),
        (status = 404, description = "No payment yet, or not your order", body = ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "paymentStatus"
)]
#[get("/orders/{id}/payment")]
pub async fn payment_status(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let payment: Payment = state.payments.status(&principal, id.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(payment))
}

#[cfg(test)]
#[path = "orders_tests.rs"]
mod tests;
