//! Tests for account handlers.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::Role;
use crate::inbound::http::test_utils::{TestApi, bearer, json_body};
use crate::test_support::SEED_PASSWORD;

#[actix_web::test]
async fn registration_verification_and_login_round_trip() {
    let api = TestApi::new();
    let app = actix_test::init_service(api.app()).await;

    let registered = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "email": "Achieng@Example.co.ke",
                "fullName": "Achieng Otieno",
                "password": "sokoni-2026!"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let body = json_body(registered).await;
    assert_eq!(body["user"]["email"], "achieng@example.co.ke");
    assert_eq!(body["user"]["isVerified"], false);
    let token = body["verificationToken"]
        .as_str()
        .expect("debug builds echo the token")
        .to_owned();

    let unverified = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "achieng@example.co.ke", "password": "sokoni-2026!" }))
            .to_request(),
    )
    .await;
    assert_eq!(unverified.status(), StatusCode::FORBIDDEN);

    let verified = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/verify")
            .set_json(json!({ "token": token }))
            .to_request(),
    )
    .await;
    assert_eq!(verified.status(), StatusCode::OK);

    let login = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "achieng@example.co.ke", "password": "sokoni-2026!" }))
            .to_request(),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(
        login.headers().get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-store")
    );
    let body = json_body(login).await;
    assert!(body["tokens"]["accessToken"].is_string());
    assert!(body["tokens"]["refreshToken"].is_string());
    assert_eq!(body["user"]["fullName"], "Achieng Otieno");
}

#[actix_web::test]
async fn duplicate_registration_conflicts() {
    let api = TestApi::new();
    api.backend.seed_user("baraka@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "email": "baraka@example.co.ke",
                "fullName": "Baraka",
                "password": "another-pass"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[rstest]
#[case(json!({ "email": "not-an-email", "fullName": "X", "password": "longenough" }), "email")]
#[case(json!({ "email": "x@example.co.ke", "fullName": "  ", "password": "longenough" }), "fullName")]
#[case(json!({ "email": "x@example.co.ke", "fullName": "X", "password": "short" }), "password")]
#[actix_web::test]
async fn registration_rejects_invalid_fields(#[case] payload: Value, #[case] field: &str) {
    let api = TestApi::new();
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(payload)
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["details"]["field"], field);
}

#[actix_web::test]
async fn malformed_json_is_an_invalid_request() {
    let api = TestApi::new();
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"email\":")
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"]["code"], "invalid_body");
}

#[actix_web::test]
async fn wrong_password_is_unauthorised() {
    let api = TestApi::new();
    api.backend.seed_user("chebet@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": "chebet@example.co.ke", "password": "guess-again" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "invalid credentials");
}

#[actix_web::test]
async fn me_requires_a_bearer_token() {
    let api = TestApi::new();
    let app = actix_test::init_service(api.app()).await;

    let response =
        actix_test::call_service(&app, actix_test::TestRequest::get().uri("/api/v1/me").to_request())
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn me_returns_the_profile() {
    let api = TestApi::new();
    let (_, token) = api.signed_in("daudi@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    insta::assert_json_snapshot!(body, { ".id" => "[id]" }, @r#"
    {
      "createdAt": "2026-03-02T06:00:00Z",
      "email": "daudi@example.co.ke",
      "fullName": "daudi",
      "id": "[id]",
      "isVerified": true,
      "lockedUntil": null,
      "phone": "0712345678",
      "role": "customer"
    }
    "#);
}

#[actix_web::test]
async fn profile_patch_can_clear_the_phone() {
    let api = TestApi::new();
    let (_, token) = api.signed_in("esther@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri("/api/v1/me")
            .insert_header(bearer(&token))
            .set_json(json!({ "fullName": "Esther Njeri", "phone": null }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["fullName"], "Esther Njeri");
    assert_eq!(body["phone"], Value::Null);
}

#[actix_web::test]
async fn refresh_rotates_and_retires_the_old_tokens() {
    let api = TestApi::new();
    api.backend.seed_user("faith@example.co.ke", Role::Customer).await;
    let first = api
        .state
        .auth
        .login("faith@example.co.ke", SEED_PASSWORD)
        .await
        .expect("login")
        .tokens;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/refresh")
            .set_json(json!({ "refreshToken": first.refresh_token }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = json_body(response).await;
    assert_ne!(rotated["accessToken"], first.access_token.as_str());

    let replay = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/refresh")
            .set_json(json!({ "refreshToken": first.refresh_token }))
            .to_request(),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let stale = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&first.access_token))
            .to_request(),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logout_is_idempotent() {
    let api = TestApi::new();
    let (_, token) = api.signed_in("gitau@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    for _ in 0..2 {
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/auth/logout")
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let me = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn password_change_checks_the_current_password() {
    let api = TestApi::new();
    let (_, token) = api.signed_in("halima@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/password")
            .insert_header(bearer(&token))
            .set_json(json!({ "currentPassword": "nope-nope", "newPassword": "fresh-pass-2026" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"]["field"], "currentPassword");

    let ok = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/password")
            .insert_header(bearer(&token))
            .set_json(json!({ "currentPassword": SEED_PASSWORD, "newPassword": "fresh-pass-2026" }))
            .to_request(),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);
    assert!(
        api.state
            .auth
            .login("halima@example.co.ke", "fresh-pass-2026")
            .await
            .is_ok()
    );
}
