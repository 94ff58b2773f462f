//! Back-office flows that cross several endpoints.

#[path = "support/hera.rs"]
mod hera;

use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use hera::{Harness, bearer, json_body, session_cookie};
use hera_backend::domain::Role;
use hera_backend::test_support::SEED_PASSWORD;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[rstest]
#[actix_web::test]
async fn health_checks_answer_outside_the_api_scope(harness: Harness) {
    let app = test::init_service(harness.app()).await;
    for path in ["/health/ready", "/health/live"] {
        let response =
            test::call_service(&app, TestRequest::get().uri(path).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    harness.health.mark_unhealthy();
    let response = test::call_service(
        &app,
        TestRequest::get().uri("/health/live").to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[rstest]
#[actix_web::test]
async fn stale_access_tokens_are_renewed_in_flight(harness: Harness) {
    const EMAIL: &str = "wanjiku@example.co.ke";
    harness.backend.seed_user(EMAIL, Role::Customer).await;
    let outcome = harness
        .http
        .auth
        .login(EMAIL, SEED_PASSWORD)
        .await
        .expect("login");
    harness.backend.clock.advance(Duration::from_secs(20 * 60));
    let app = test::init_service(harness.app()).await;

    let expired = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&outcome.tokens.access_token))
            .to_request(),
    )
    .await;
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

    let renewed = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&outcome.tokens.access_token))
            .insert_header(("X-Refresh-Token", outcome.tokens.refresh_token.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(renewed.status(), StatusCode::OK);
    let fresh = renewed
        .headers()
        .get("x-access-token")
        .and_then(|value| value.to_str().ok())
        .expect("rotated access token")
        .to_owned();
    assert_ne!(fresh, outcome.tokens.access_token);
    assert_eq!(json_body(renewed).await["email"], EMAIL);

    let follow_up = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&fresh))
            .to_request(),
    )
    .await;
    assert_eq!(follow_up.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn locking_an_account_ends_its_sessions(harness: Harness) {
    let (_, admin) = harness.signed_in("mkurugenzi@hera.co.ke", Role::Admin).await;
    let (customer, token) = harness
        .signed_in("kamau@example.co.ke", Role::Customer)
        .await;
    let app = test::init_service(harness.app()).await;

    let locked = test::call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/api/v1/admin/users/{}/lock", customer.id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "until": "2099-01-01T00:00:00Z" }))
            .to_request(),
    )
    .await;
    assert_eq!(locked.status(), StatusCode::OK);

    let me = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let login = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "kamau@example.co.ke", "password": SEED_PASSWORD }))
            .to_request(),
    )
    .await;
    assert_ne!(login.status(), StatusCode::OK);

    let unlocked = test::call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/api/v1/admin/users/{}/unlock", customer.id))
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(unlocked.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn customers_hear_about_fulfilment(harness: Harness) {
    let variant_id = harness.stocked_variant("Ankara Tote", 150_000, 6).await;
    let (_, staff) = harness.signed_in("ghala@hera.co.ke", Role::Staff).await;
    let (_, customer) = harness
        .signed_in("achieng@example.co.ke", Role::Customer)
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
                .insert_header(bearer(&customer))
                .cookie(session_cookie(&added))
                .set_json(json!({
                    "shipping": {
                        "recipient": "Achieng Odhiambo",
                        "phone": "0722000111",
                        "address": "Oginga Odinga Road 12",
                        "city": "Kisumu"
                    },
                    "paymentMethod": "cash_on_delivery"
                }))
                .to_request(),
        )
        .await,
    )
    .await;
    let order_id = placed["order"]["id"].as_str().expect("order id").to_owned();

    for status in ["paid", "processing", "shipped", "delivered"] {
        let moved = test::call_service(
            &app,
            TestRequest::put()
                .uri(&format!("/api/v1/admin/orders/{order_id}/status"))
                .insert_header(bearer(&staff))
                .set_json(json!({ "status": status }))
                .to_request(),
        )
        .await;
        assert_eq!(moved.status(), StatusCode::OK, "{status}");
        assert_eq!(json_body(moved).await["status"], status);
    }

    let skipped = test::call_service(
        &app,
        TestRequest::put()
            .uri(&format!("/api/v1/admin/orders/{order_id}/status"))
            .insert_header(bearer(&staff))
            .set_json(json!({ "status": "shipped" }))
            .to_request(),
    )
    .await;
    assert_eq!(skipped.status(), StatusCode::CONFLICT);

    let inbox = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/notifications")
                .insert_header(bearer(&customer))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(inbox["total"], 4);
    assert!(
        inbox["items"]
            .as_array()
            .expect("items")
            .iter()
            .all(|item| item["kind"] == "order_status")
    );

    let cleared = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/notifications/read-all")
            .insert_header(bearer(&customer))
            .to_request(),
    )
    .await;
    assert!(cleared.status().is_success());
    let unread = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/notifications/unread-count")
                .insert_header(bearer(&customer))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(unread["count"], 0);
}

#[rstest]
#[actix_web::test]
async fn customers_are_kept_out_of_the_back_office(harness: Harness) {
    let (_, customer) = harness
        .signed_in("mteja@example.co.ke", Role::Customer)
        .await;
    let app = test::init_service(harness.app()).await;

    for path in [
        "/api/v1/admin/orders",
        "/api/v1/admin/stock/low",
        "/api/v1/admin/expenses/summary?from=2026-03-01&to=2026-04-01",
        "/api/v1/admin/users",
    ] {
        let response = test::call_service(
            &app,
            TestRequest::get()
                .uri(path)
                .insert_header(bearer(&customer))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }
}
