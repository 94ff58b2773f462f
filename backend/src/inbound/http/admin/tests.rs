//! Back-office endpoint coverage against the in-memory backend.

use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::Role;
use crate::inbound::http::test_utils::{TestApi, bearer, json_body};

async fn staff(api: &TestApi) -> String {
    api.signed_in("duka@hera.co.ke", Role::Staff).await.1
}

#[rstest]
#[case("/api/v1/admin/products")]
#[case("/api/v1/admin/orders")]
#[case("/api/v1/admin/stock/low")]
#[case("/api/v1/admin/reports/sales?from=2026-03-01&to=2026-03-03")]
#[actix_web::test]
async fn customers_cannot_reach_the_back_office(#[case] uri: &str) {
    let api = TestApi::new();
    let (_, token) = api.signed_in("wambui@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let anonymous =
        actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let customer = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(customer.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn staff_build_the_catalogue_and_move_stock() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let app = actix_test::init_service(api.app()).await;

    let category = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/categories")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Dresses" }))
            .to_request(),
    )
    .await;
    assert_eq!(category.status(), StatusCode::CREATED);
    let category_id = json_body(category).await["id"].clone();

    let product = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/products")
            .insert_header(bearer(&token))
            .set_json(json!({
                "categoryId": category_id,
                "name": "Kitenge Maxi Dress",
                "basePrice": 450_000,
                "isActive": false
            }))
            .to_request(),
    )
    .await;
    assert_eq!(product.status(), StatusCode::CREATED);
    let product = json_body(product).await;
    let product_id = product["id"].as_str().expect("id").to_owned();

    let variant = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/api/v1/admin/products/{product_id}/variants"))
            .insert_header(bearer(&token))
            .set_json(json!({
                "sku": "kmd-red-m",
                "size": "M",
                "colour": "Red",
                "initialStock": 3,
                "lowStockThreshold": 5
            }))
            .to_request(),
    )
    .await;
    assert_eq!(variant.status(), StatusCode::CREATED);
    let variant = json_body(variant).await;
    let variant_id = variant["id"].as_str().expect("id").to_owned();
    assert_eq!(variant["sku"], "KMD-RED-M");

    let hidden = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/products?search=kitenge")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(hidden).await["total"], 1, "inactive products are listed");

    let low = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/stock/low")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let low = json_body(low).await;
    assert_eq!(low[0]["sku"], "KMD-RED-M");
    assert_eq!(low[0]["stockQuantity"], 3);

    let movement = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/stock/movements")
            .insert_header(bearer(&token))
            .set_json(json!({
                "variantId": variant_id,
                "kind": "addition",
                "quantity": 10,
                "reason": "Delivery from Eastleigh"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(movement.status(), StatusCode::CREATED);
    let movement = json_body(movement).await;
    assert_eq!(movement["quantityBefore"], 3);
    assert_eq!(movement["quantityAfter"], 13);

    let ledger = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(&format!("/api/v1/admin/stock/movements?variantId={variant_id}"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    let ledger = json_body(ledger).await;
    assert_eq!(ledger["total"], 2, "opening stock plus the delivery");
    assert_eq!(ledger["items"][0]["kind"], "addition");

    let removed = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/api/v1/admin/products/{product_id}"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(removed).await["outcome"], "deleted");
}

#[rstest]
#[case(json!({ "kind": "theft", "quantity": 1 }), "kind")]
#[case(json!({ "kind": "addition", "quantity": 0 }), "quantity")]
#[actix_web::test]
async fn stock_movements_are_validated(#[case] mut payload: Value, #[case] field: &str) {
    let api = TestApi::new();
    let token = staff(&api).await;
    let variant_id = api.stocked_variant("Ankara Tote", 150_000, 4).await;
    payload["variantId"] = json!(variant_id);
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/stock/movements")
            .insert_header(bearer(&token))
            .set_json(payload)
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["details"]["field"], field);
}

#[actix_web::test]
async fn product_patch_clears_the_category() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let category = api
        .state
        .catalogue
        .create_category(crate::domain::NewCategory {
            name: "Bags".into(),
            description: None,
        })
        .await
        .expect("category");
    let product = api
        .state
        .catalogue
        .create_product(crate::domain::NewProduct {
            category_id: Some(category.id),
            name: "Kiondo Basket".into(),
            description: String::new(),
            base_price: 220_000,
            image_urls: Vec::new(),
            is_active: true,
        })
        .await
        .expect("product");
    let app = actix_test::init_service(api.app()).await;

    let untouched = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/api/v1/admin/products/{}", product.product.id))
            .insert_header(bearer(&token))
            .set_json(json!({ "basePrice": 240_000 }))
            .to_request(),
    )
    .await;
    let body = json_body(untouched).await;
    assert_eq!(body["basePrice"], 240_000);
    assert_eq!(body["categoryId"], json!(category.id));

    let cleared = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/api/v1/admin/products/{}", product.product.id))
            .insert_header(bearer(&token))
            .set_json(json!({ "categoryId": null }))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(cleared).await["categoryId"], Value::Null);
}

#[actix_web::test]
async fn discounts_are_managed_and_validated() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let app = actix_test::init_service(api.app()).await;

    let created = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/discounts")
            .insert_header(bearer(&token))
            .set_json(json!({
                "code": "karibu10",
                "kind": "percentage",
                "value": 10,
                "minOrderAmount": 100_000,
                "endsAt": "2026-04-01"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_body(created).await;
    assert_eq!(created["code"], "KARIBU10");
    assert_eq!(created["isActive"], true);

    let listed = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/discounts")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(listed).await["total"], 1);

    let bad_kind = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/discounts")
            .insert_header(bearer(&token))
            .set_json(json!({ "code": "HALF", "kind": "bogof", "value": 50 }))
            .to_request(),
    )
    .await;
    assert_eq!(bad_kind.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(bad_kind).await["details"]["field"], "kind");

    let id = created["id"].as_str().expect("id");
    let deleted = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/api/v1/admin/discounts/{id}"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn cash_sales_complete_at_the_till() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let variant_id = api.stocked_variant("Maasai Shuka", 250_000, 3).await;
    let app = actix_test::init_service(api.app()).await;

    let sale = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/pos/sales")
            .insert_header(bearer(&token))
            .set_json(json!({
                "items": [{ "variantId": variant_id, "quantity": 2 }],
                "payment": { "method": "cash", "amountTendered": 600_000 }
            }))
            .to_request(),
    )
    .await;
    assert_eq!(sale.status(), StatusCode::CREATED);
    let sale = json_body(sale).await;
    assert_eq!(sale["order"]["channel"], "pos");
    assert_eq!(sale["order"]["status"], "delivered");
    assert_eq!(sale["order"]["paymentStatus"], "paid");
    assert_eq!(sale["order"]["shippingFee"], 0);
    assert_eq!(sale["order"]["total"], 500_000);
    assert_eq!(sale["changeDue"], 100_000);

    let listed = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/orders?channel=pos&status=delivered")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(listed).await["total"], 1);

    let report = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/reports/sales?from=2026-03-01&to=2026-03-03")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(report.status(), StatusCode::OK);
    let report = json_body(report).await;
    assert_eq!(report["orderCount"], 1);
    assert_eq!(report["net"], 500_000);
    assert_eq!(report["topProducts"][0]["productName"], "Maasai Shuka");
}

#[actix_web::test]
async fn short_tender_is_rejected() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let variant_id = api.stocked_variant("Beaded Sandals", 180_000, 3).await;
    let app = actix_test::init_service(api.app()).await;

    let sale = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/pos/sales")
            .insert_header(bearer(&token))
            .set_json(json!({
                "items": [{ "variantId": variant_id, "quantity": 1 }],
                "payment": { "method": "cash", "amountTendered": 100_000 }
            }))
            .to_request(),
    )
    .await;
    assert_eq!(sale.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(sale).await["details"]["field"],
        "payment.amountTendered"
    );
}

#[actix_web::test]
async fn order_status_follows_the_fulfilment_path() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let variant_id = api.stocked_variant("Leso Wrap", 90_000, 3).await;
    let app = actix_test::init_service(api.app()).await;

    let sale = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/pos/sales")
            .insert_header(bearer(&token))
            .set_json(json!({
                "items": [{ "variantId": variant_id, "quantity": 1 }],
                "payment": { "method": "mpesa", "phone": "0712 345 678" }
            }))
            .to_request(),
    )
    .await;
    let sale = json_body(sale).await;
    assert_eq!(sale["order"]["status"], "pending");
    let order_id = sale["order"]["id"].as_str().expect("id").to_owned();

    let skipped = actix_test::call_service(
        &app,
        actix_test::TestRequest::put()
            .uri(&format!("/api/v1/admin/orders/{order_id}/status"))
            .insert_header(bearer(&token))
            .set_json(json!({ "status": "shipped" }))
            .to_request(),
    )
    .await;
    assert_eq!(skipped.status(), StatusCode::CONFLICT);

    let unknown = actix_test::call_service(
        &app,
        actix_test::TestRequest::put()
            .uri(&format!("/api/v1/admin/orders/{order_id}/status"))
            .insert_header(bearer(&token))
            .set_json(json!({ "status": "lost" }))
            .to_request(),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let cancelled = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/api/v1/admin/orders/{order_id}/cancel"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(cancelled.status(), StatusCode::OK);
    assert_eq!(json_body(cancelled).await["status"], "cancelled");
}

#[actix_web::test]
async fn account_management_is_admin_only() {
    let api = TestApi::new();
    let staff_token = staff(&api).await;
    let (admin, admin_token) = api.signed_in("mkurugenzi@hera.co.ke", Role::Admin).await;
    let (customer, _) = api.signed_in("xena@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let as_staff = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/users")
            .insert_header(bearer(&staff_token))
            .to_request(),
    )
    .await;
    assert_eq!(as_staff.status(), StatusCode::FORBIDDEN);

    let online = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/users/online")
            .insert_header(bearer(&staff_token))
            .to_request(),
    )
    .await;
    assert_eq!(online.status(), StatusCode::OK);
    assert_eq!(json_body(online).await, json!({ "userIds": [] }));

    let customers = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/users?role=customer")
            .insert_header(bearer(&admin_token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(customers).await["total"], 1);

    let promoted = actix_test::call_service(
        &app,
        actix_test::TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/role", customer.id))
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "role": "staff" }))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(promoted).await["role"], "staff");

    let self_demotion = actix_test::call_service(
        &app,
        actix_test::TestRequest::put()
            .uri(&format!("/api/v1/admin/users/{}/role", admin.id))
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "role": "customer" }))
            .to_request(),
    )
    .await;
    assert_eq!(self_demotion.status(), StatusCode::CONFLICT);

    let past_lock = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/api/v1/admin/users/{}/lock", customer.id))
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "until": "2026-03-01T00:00:00Z" }))
            .to_request(),
    )
    .await;
    assert_eq!(past_lock.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(past_lock).await["details"]["field"], "until");
}

#[actix_web::test]
async fn locking_an_account_ends_its_sessions() {
    let api = TestApi::new();
    let (_, admin_token) = api.signed_in("mkurugenzi@hera.co.ke", Role::Admin).await;
    let (customer, customer_token) = api.signed_in("yusra@example.co.ke", Role::Customer).await;
    let app = actix_test::init_service(api.app()).await;

    let locked = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/api/v1/admin/users/{}/lock", customer.id))
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "until": "2026-03-09T06:00:00Z" }))
            .to_request(),
    )
    .await;
    assert_eq!(locked.status(), StatusCode::OK);

    let me = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header(bearer(&customer_token))
            .to_request(),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let unlocked = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/api/v1/admin/users/{}/unlock", customer.id))
            .insert_header(bearer(&admin_token))
            .to_request(),
    )
    .await;
    assert_eq!(unlocked.status(), StatusCode::OK);
}

#[actix_web::test]
async fn expenses_roll_up_into_a_summary() {
    let api = TestApi::new();
    let token = staff(&api).await;
    let app = actix_test::init_service(api.app()).await;

    let category = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/admin/expense-categories")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Rent" }))
            .to_request(),
    )
    .await;
    assert_eq!(category.status(), StatusCode::CREATED);
    let category_id = json_body(category).await["id"].clone();

    for (amount, day) in [(8_500_000, "2026-03-01"), (1_200_000, "2026-03-15")] {
        let expense = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/admin/expenses")
                .insert_header(bearer(&token))
                .set_json(json!({
                    "categoryId": category_id,
                    "amount": amount,
                    "description": "Shop rent",
                    "incurredOn": day
                }))
                .to_request(),
        )
        .await;
        assert_eq!(expense.status(), StatusCode::CREATED);
    }

    let summary = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/expenses/summary?from=2026-03-01&to=2026-03-31")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(summary.status(), StatusCode::OK);
    let summary = json_body(summary).await;
    assert_eq!(summary["total"], 9_700_000);
    assert_eq!(summary["byCategory"][0]["name"], "Rent");

    let early = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/admin/expenses?to=2026-03-10")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(json_body(early).await["total"], 1);

    let in_use = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!(
                "/api/v1/admin/expense-categories/{}",
                category_id.as_str().expect("id")
            ))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(in_use.status(), StatusCode::CONFLICT);
}

#[rstest]
#[case("/api/v1/admin/expenses/summary?from=2026-03-01", "to")]
#[case("/api/v1/admin/expenses?from=March", "from")]
#[case("/api/v1/admin/reports/sales?to=2026-03-03", "from")]
#[case("/api/v1/admin/reports/sales?from=2026-03-03&to=2026-03-01", "to")]
#[actix_web::test]
async fn date_ranges_are_validated(#[case] uri: &str, #[case] field: &str) {
    let api = TestApi::new();
    let token = staff(&api).await;
    let app = actix_test::init_service(api.app()).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["details"]["field"], field);
}
