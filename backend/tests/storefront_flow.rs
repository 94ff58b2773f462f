//! End-to-end storefront journeys over the in-memory backend.

#[path = "support/hera.rs"]
mod hera;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use hera::{Harness, bearer, json_body, session_cookie};
use hera_backend::domain::Role;
use hera_backend::test_support::CALLBACK_URI;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

const SHOPPER: &str = "nyambura@example.co.ke";
const PASSWORD: &str = "sokoni-2026!";

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn shipping() -> Value {
    json!({
        "recipient": "Nyambura Wairimu",
        "phone": "0712345678",
        "address": "Kimathi Street 4",
        "city": "Nairobi"
    })
}

fn callback(checkout_id: &str, result_code: i32, shillings: i64) -> Value {
    let mut stk = json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": checkout_id,
        "ResultCode": result_code,
        "ResultDesc": "The service request is processed successfully."
    });
    if result_code == 0 {
        stk["CallbackMetadata"] = json!({
            "Item": [
                { "Name": "Amount", "Value": shillings },
                { "Name": "MpesaReceiptNumber", "Value": "SLK4H2P9QX" },
                { "Name": "PhoneNumber", "Value": 254712345678_u64 }
            ]
        });
    }
    json!({ "Body": { "stkCallback": stk } })
}

#[rstest]
#[actix_web::test]
async fn a_new_customer_buys_with_mpesa(harness: Harness) {
    let variant_id = harness
        .stocked_variant("Kanga Maxi Dress", 250_000, 5)
        .await;
    let (_, staff_token) = harness.signed_in("duka@hera.co.ke", Role::Staff).await;
    let app = test::init_service(harness.app()).await;

    let discount = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/admin/discounts")
            .insert_header(bearer(&staff_token))
            .set_json(json!({ "code": "karibu10", "kind": "percentage", "value": 10 }))
            .to_request(),
    )
    .await;
    assert_eq!(discount.status(), StatusCode::CREATED);

    // Sign up and verify.
    let registered = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "email": SHOPPER,
                "fullName": "Nyambura Wairimu",
                "password": PASSWORD
            }))
            .to_request(),
    )
    .await;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let verification = json_body(registered).await["verificationToken"]
        .as_str()
        .expect("debug builds echo the token")
        .to_owned();
    let verified = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/auth/verify")
            .set_json(json!({ "token": verification }))
            .to_request(),
    )
    .await;
    assert_eq!(verified.status(), StatusCode::OK);
    let login = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": SHOPPER, "password": PASSWORD }))
            .to_request(),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    let token = json_body(login).await["tokens"]["accessToken"]
        .as_str()
        .expect("access token")
        .to_owned();

    // Browse as a guest.
    let listed = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/products?search=kanga")
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(listed["total"], 1);
    let slug = listed["items"][0]["slug"].as_str().expect("slug").to_owned();
    let detail = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri(&format!("/api/v1/products/{slug}"))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(detail["variants"][0]["id"], json!(variant_id));

    // Cart and discount preview.
    let added = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/cart/items")
            .set_json(json!({ "variantId": variant_id, "quantity": 2 }))
            .to_request(),
    )
    .await;
    assert_eq!(added.status(), StatusCode::OK);
    let cookie = session_cookie(&added);
    let quote = json_body(
        test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/v1/discounts/validate")
                .cookie(cookie.clone())
                .set_json(json!({ "code": "KARIBU10" }))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(quote["subtotal"], 500_000);
    assert_eq!(quote["discountAmount"], 50_000);

    // Checkout.
    let placed = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/checkout")
            .insert_header(bearer(&token))
            .cookie(cookie)
            .set_json(json!({
                "shipping": shipping(),
                "paymentMethod": "mpesa",
                "discountCode": "karibu10"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let receipt = json_body(placed).await;
    assert_eq!(receipt["order"]["discountAmount"], 50_000);
    assert_eq!(receipt["order"]["shippingFee"], 30_000);
    assert_eq!(receipt["order"]["total"], 480_000);
    assert_eq!(receipt["order"]["paymentStatus"], "pending");
    let order_id = receipt["order"]["id"].as_str().expect("order id").to_owned();
    let order_number = receipt["order"]["orderNumber"]
        .as_str()
        .expect("order number")
        .to_owned();
    assert_eq!(harness.backend.store.stock_of(variant_id), Some(3));
    let pushed = harness.backend.gateway.requests();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].account_reference, order_number);

    // Safaricom confirms.
    let checkout_id = harness
        .backend
        .gateway
        .last_checkout_id()
        .expect("stk push recorded");
    let acknowledged = test::call_service(
        &app,
        TestRequest::post()
            .uri(CALLBACK_URI)
            .set_json(callback(&checkout_id, 0, 4_800))
            .to_request(),
    )
    .await;
    assert_eq!(acknowledged.status(), StatusCode::OK);
    assert_eq!(
        json_body(acknowledged).await,
        json!({ "ResultCode": 0, "ResultDesc": "Accepted" })
    );

    let payment = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri(&format!("/api/v1/orders/{order_id}/payment"))
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(payment["status"], "succeeded");
    assert_eq!(payment["receiptNumber"], "SLK4H2P9QX");

    let tracked = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri(&format!("/api/v1/orders/track/{order_number}"))
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(tracked["status"], "paid");
    assert_eq!(tracked["paymentStatus"], "paid");
    assert_eq!(tracked["items"][0]["quantity"], 2);

    let history = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/orders")
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(history["total"], 1);

    // Staff heard about the order and the payment.
    let unread = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/notifications/unread-count")
                .insert_header(bearer(&staff_token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert!(unread["count"].as_u64().expect("count") >= 2);
}

#[rstest]
#[actix_web::test]
async fn duplicate_callbacks_are_acknowledged_once(harness: Harness) {
    let variant_id = harness.stocked_variant("Maasai Shuka", 120_000, 2).await;
    let (_, token) = harness.signed_in(SHOPPER, Role::Customer).await;
    let app = test::init_service(harness.app()).await;
    let added = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/cart/items")
            .set_json(json!({ "variantId": variant_id, "quantity": 1 }))
            .to_request(),
    )
    .await;
    let placed = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/checkout")
            .insert_header(bearer(&token))
            .cookie(session_cookie(&added))
            .set_json(json!({ "shipping": shipping(), "paymentMethod": "mpesa" }))
            .to_request(),
    )
    .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let checkout_id = harness
        .backend
        .gateway
        .last_checkout_id()
        .expect("stk push recorded");

    for result_code in [1032, 0] {
        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri(CALLBACK_URI)
                .set_json(callback(&checkout_id, result_code, 1_500))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let payments = harness.backend.store.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status.as_str(), "failed");
}

#[rstest]
#[actix_web::test]
async fn forged_payment_confirmations_do_not_mark_orders_paid(harness: Harness) {
    let variant_id = harness.stocked_variant("Leso Scarf", 120_000, 2).await;
    let (_, token) = harness.signed_in(SHOPPER, Role::Customer).await;
    let app = test::init_service(harness.app()).await;
    let added = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/cart/items")
            .set_json(json!({ "variantId": variant_id, "quantity": 1 }))
            .to_request(),
    )
    .await;
    let placed = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/checkout")
            .insert_header(bearer(&token))
            .cookie(session_cookie(&added))
            .set_json(json!({ "shipping": shipping(), "paymentMethod": "mpesa" }))
            .to_request(),
    )
    .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let receipt = json_body(placed).await;
    let order_id = receipt["order"]["id"].as_str().expect("order id").to_owned();
    assert!(receipt["payment"]["payment"].get("checkoutRequestId").is_none());
    // An attacker who learnt the checkout id some other way.
    let checkout_id = harness
        .backend
        .gateway
        .last_checkout_id()
        .expect("stk push recorded");

    for (uri, shillings, status) in [
        ("/api/v1/payments/mpesa/callback", 1_500, StatusCode::UNAUTHORIZED),
        ("/api/v1/payments/mpesa/callback?token=hera", 1_500, StatusCode::UNAUTHORIZED),
        (CALLBACK_URI, 1, StatusCode::BAD_REQUEST),
    ] {
        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri(uri)
                .set_json(callback(&checkout_id, 0, shillings))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), status, "{uri} paying {shillings}");
    }

    let order = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri(&format!("/api/v1/orders/{order_id}"))
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(harness.backend.store.payments()[0].status.as_str(), "pending");
}

#[rstest]
#[actix_web::test]
async fn cash_on_delivery_orders_can_be_cancelled_by_the_customer(harness: Harness) {
    let variant_id = harness.stocked_variant("Kitenge Shirt", 180_000, 4).await;
    let (_, token) = harness.signed_in(SHOPPER, Role::Customer).await;
    let app = test::init_service(harness.app()).await;
    let added = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/cart/items")
            .set_json(json!({ "variantId": variant_id, "quantity": 3 }))
            .to_request(),
    )
    .await;
    let cookie = session_cookie(&added);

    let placed = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/checkout")
            .insert_header(bearer(&token))
            .cookie(cookie)
            .set_json(json!({ "shipping": shipping(), "paymentMethod": "cash_on_delivery" }))
            .to_request(),
    )
    .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let cookie = session_cookie(&placed);
    let receipt = json_body(placed).await;
    assert!(receipt.get("payment").is_none());
    let order_id = receipt["order"]["id"].as_str().expect("order id").to_owned();
    assert_eq!(harness.backend.store.stock_of(variant_id), Some(1));

    let emptied = json_body(
        test::call_service(
            &app,
            TestRequest::get().uri("/api/v1/cart").cookie(cookie).to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(emptied["itemCount"], 0);

    let cancelled = test::call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/cancel"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(cancelled.status(), StatusCode::OK);
    assert_eq!(json_body(cancelled).await["status"], "cancelled");
    assert_eq!(harness.backend.store.stock_of(variant_id), Some(4));

    let again = test::call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/cancel"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[rstest]
#[actix_web::test]
async fn other_customers_cannot_see_an_order(harness: Harness) {
    let variant_id = harness.stocked_variant("Leso Wrap", 90_000, 2).await;
    let (_, owner) = harness.signed_in(SHOPPER, Role::Customer).await;
    let (_, stranger) = harness
        .signed_in("otieno@example.co.ke", Role::Customer)
        .await;
    let app = test::init_service(harness.app()).await;
    let added = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/cart/items")
            .set_json(json!({ "variantId": variant_id, "quantity": 1 }))
            .to_request(),
    )
    .await;
    let placed = json_body(
        test::call_service(
            &app,
            TestRequest::post()
                .uri("/api/v1/checkout")
                .insert_header(bearer(&owner))
                .cookie(session_cookie(&added))
                .set_json(json!({ "shipping": shipping(), "paymentMethod": "cash_on_delivery" }))
                .to_request(),
        )
        .await,
    )
    .await;
    let order_id = placed["order"]["id"].as_str().expect("order id").to_owned();

    let response = test::call_service(
        &app,
        TestRequest::get()
            .uri(&format!("/api/v1/orders/{order_id}"))
            .insert_header(bearer(&stranger))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
