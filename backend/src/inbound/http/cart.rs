//! Guest and customer cart, kept in the encrypted session cookie.
//!
//! ```text
//! GET /api/v1/cart
//! POST /api/v1/cart/items {"variantId":"…","quantity":2}
//! PUT /api/v1/cart/items/{variantId} {"quantity":3}
//! DELETE /api/v1/cart/items/{variantId}
//! DELETE /api/v1/cart
//! ```

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::CartView;
use crate::inbound::http::ApiResult;
use crate::inbound::http::cache_control::private_no_cache_header;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::CartSession;
use crate::inbound::http::state::HttpState;

/// Line to add; merged with an existing line for the same variant.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub variant_id: Uuid,
    #[schema(example = 1, minimum = 1, maximum = 99)]
    pub quantity: u32,
}

/// New quantity for a line; zero removes it.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetQuantityRequest {
    #[schema(example = 2, minimum = 0, maximum = 99)]
    pub quantity: u32,
}

fn cart_response(view: &CartView) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(view)
}

/// Price the cart against the live catalogue.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Priced cart", body = Object)),
    tags = ["cart"],
    operation_id = "viewCart",
    security([])
)]
#[get("/cart")]
pub async fn view_cart(
    state: web::Data<HttpState>,
    session: CartSession,
) -> ApiResult<HttpResponse> {
    let view = state.cart.view(&session.cart()).await?;
    Ok(cart_response(&view))
}

/// Add a variant to the cart.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = Object),
        (status = 400, description = "Quantity or line limit exceeded", body = ErrorSchema),
        (status = 404, description = "Unknown or inactive variant", body = ErrorSchema)
    ),
    tags = ["cart"],
    operation_id = "addCartItem",
    security([])
)]
#[post("/cart/items")]
pub async fn add_item(
    state: web::Data<HttpState>,
    session: CartSession,
    payload: web::Json<AddItemRequest>,
) -> ApiResult<HttpResponse> {
    let mut cart = session.cart();
    let view = state
        .cart
        .add(&mut cart, payload.variant_id, payload.quantity)
        .await?;
    session.store(&cart)?;
    Ok(cart_response(&view))
}

/// Change a line's quantity.
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{variantId}",
    params(("variantId" = Uuid, Path, description = "Variant in the cart")),
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Updated cart", body = Object),
        (status = 400, description = "Quantity out of range", body = ErrorSchema),
        (status = 404, description = "Variant not in cart", body = ErrorSchema)
    ),
    tags = ["cart"],
    operation_id = "setCartQuantity",
    security([])
)]
#[put("/cart/items/{variant_id}")]
pub async fn set_quantity(
    state: web::Data<HttpState>,
    session: CartSession,
    variant_id: web::Path<Uuid>,
    payload: web::Json<SetQuantityRequest>,
) -> ApiResult<HttpResponse> {
    let mut cart = session.cart();
    let view = state
        .cart
        .set_quantity(&mut cart, variant_id.into_inner(), payload.quantity)
        .await?;
    session.store(&cart)?;
    Ok(cart_response(&view))
}

/// Drop a line.
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{variantId}",
    params(("variantId" = Uuid, Path, description = "Variant in the cart")),
    responses(
        (status = 200, description = "Updated cart", body = Object),
        (status = 404, description = "Variant not in cart", body = ErrorSchema)
    ),
    tags = ["cart"],
    operation_id = "removeCartItem",
    security([])
)]
#[delete("/cart/items/{variant_id}")]
pub async fn remove_item(
    state: web::Data<HttpState>,
    session: CartSession,
    variant_id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let mut cart = session.cart();
    let view = state.cart.remove(&mut cart, variant_id.into_inner()).await?;
    session.store(&cart)?;
    Ok(cart_response(&view))
}

/// Empty the cart.
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 200, description = "Empty cart", body = Object)),
    tags = ["cart"],
    operation_id = "clearCart",
    security([])
)]
#[delete("/cart")]
pub async fn clear_cart(
    state: web::Data<HttpState>,
    session: CartSession,
) -> ApiResult<HttpResponse> {
    let mut cart = session.cart();
    let view = state.cart.clear(&mut cart);
    session.store(&cart)?;
    Ok(cart_response(&view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::json;

    use crate::domain::{NewProduct, NewVariant, Role};
    use crate::inbound::http::test_utils::{TestApi, json_body, session_cookie};

    async fn variant(api: &TestApi, stock: i32) -> Uuid {
        let admin = api.backend.seed_user("stock@hera.co.ke", Role::Admin).await;
        let product = api
            .state
            .catalogue
            .create_product(NewProduct {
                category_id: None,
                name: "Maasai Shuka Scarf".into(),
                description: "Red check".into(),
                base_price: 150_000,
                image_urls: Vec::new(),
                is_active: true,
            })
            .await
            .expect("product");
        api.state
            .catalogue
            .create_variant(
                product.product.id,
                NewVariant {
                    sku: "SHUKA-RED".into(),
                    size: None,
                    colour: Some("red".into()),
                    price_override: Some(120_000),
                    initial_stock: stock,
                    low_stock_threshold: 1,
                },
                admin.id,
            )
            .await
            .expect("variant")
            .id
    }

    #[actix_web::test]
    async fn cart_survives_in_the_session_cookie() {
        let api = TestApi::new();
        let variant_id = variant(&api, 5).await;
        let app = actix_test::init_service(api.app()).await;

        let added = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/cart/items")
                .set_json(json!({ "variantId": variant_id, "quantity": 2 }))
                .to_request(),
        )
        .await;
        assert_eq!(added.status(), StatusCode::OK);
        let cookie = session_cookie(&added);

        let again = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/cart/items")
                .cookie(cookie)
                .set_json(json!({ "variantId": variant_id, "quantity": 1 }))
                .to_request(),
        )
        .await;
        let cookie = session_cookie(&again);
        let body = json_body(again).await;
        assert_eq!(body["lines"][0]["quantity"], 3);
        assert_eq!(body["lines"][0]["unitPrice"], 120_000);

        let viewed = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/api/v1/cart").cookie(cookie).to_request(),
        )
        .await;
        let body = json_body(viewed).await;
        assert_eq!(body["lines"][0]["quantity"], 3);
    }

    #[actix_web::test]
    async fn asking_for_more_than_stock_is_flagged() {
        let api = TestApi::new();
        let variant_id = variant(&api, 1).await;
        let app = actix_test::init_service(api.app()).await;

        let added = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/cart/items")
                .set_json(json!({ "variantId": variant_id, "quantity": 4 }))
                .to_request(),
        )
        .await;
        let body = json_body(added).await;
        assert_eq!(body["lines"][0]["status"], "insufficient_stock");
    }

    #[actix_web::test]
    async fn quantity_limits_are_enforced() {
        let api = TestApi::new();
        let variant_id = variant(&api, 5).await;
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/cart/items")
                .set_json(json!({ "variantId": variant_id, "quantity": 100 }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn zero_quantity_removes_the_line_and_clear_empties() {
        let api = TestApi::new();
        let variant_id = variant(&api, 5).await;
        let app = actix_test::init_service(api.app()).await;

        let added = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/cart/items")
                .set_json(json!({ "variantId": variant_id, "quantity": 2 }))
                .to_request(),
        )
        .await;
        let cookie: Cookie<'static> = session_cookie(&added);

        let zeroed = actix_test::call_service(
            &app,
            actix_test::TestRequest::put()
                .uri(&format!("/api/v1/cart/items/{variant_id}"))
                .cookie(cookie.clone())
                .set_json(json!({ "quantity": 0 }))
                .to_request(),
        )
        .await;
        assert_eq!(zeroed.status(), StatusCode::OK);
        let body = json_body(zeroed).await;
        assert_eq!(body["lines"].as_array().map(Vec::len), Some(0));

        let cleared = actix_test::call_service(
            &app,
            actix_test::TestRequest::delete().uri("/api/v1/cart").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(cleared.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn malformed_variant_ids_are_invalid_requests() {
        let api = TestApi::new();
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::delete()
                .uri("/api/v1/cart/items/not-a-uuid")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
