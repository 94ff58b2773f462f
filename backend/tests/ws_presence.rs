//! Live events reaching sockets on a running server while the REST API is
//! driven alongside them.

#[path = "support/hera.rs"]
mod hera;

use std::time::Duration;

use actix_web::HttpServer;
use actix_web::dev::ServerHandle;
use actix_web::http::{StatusCode, header};
use actix_web::test::{self, TestRequest};
use awc::{BoxedSocket, ws::Codec, ws::Frame};
use futures_util::{SinkExt, StreamExt};
use hera::{Harness, ORIGIN, bearer, json_body, session_cookie};
use hera_backend::domain::Role;
use serde_json::{Value, json};

type Socket = actix_codec::Framed<BoxedSocket, Codec>;

struct Running {
    harness: Harness,
    url: String,
    handle: ServerHandle,
}

fn start() -> Running {
    let harness = Harness::new();
    let (http, ws, health, key) = (
        harness.http.clone(),
        harness.ws.clone(),
        harness.health.clone(),
        harness.key.clone(),
    );
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let server = HttpServer::new(move || {
        hera::build_app(http.clone(), ws.clone(), health.clone(), key.clone())
    })
    .workers(1)
    .listen(listener)
    .expect("bind test server")
    .disable_signals()
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    Running {
        harness,
        url: format!("http://{addr}"),
        handle,
    }
}

async fn connect(running: &Running, token: &str) -> Socket {
    let (_resp, socket) = awc::Client::default()
        .ws(format!("{}/ws?token={token}", running.url))
        .set_header(header::ORIGIN, ORIGIN)
        .connect()
        .await
        .expect("websocket connect");
    socket
}

/// Next text event of the given `type`, skipping control frames and other
/// events.
async fn next_event(socket: &mut Socket, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let frame = socket.next().await.expect("open socket").expect("frame");
            let Frame::Text(bytes) = frame else {
                continue;
            };
            let event: Value = serde_json::from_slice(&bytes).expect("event json");
            if event["type"] == kind {
                return event;
            }
        }
    })
    .await
    .expect("event within timeout")
}

#[actix_web::test]
async fn staff_follow_a_customer_from_login_to_checkout() {
    let running = start();
    let variant_id = running
        .harness
        .stocked_variant("Kikoi Beach Wrap", 95_000, 4)
        .await;
    let (_, staff_token) = running
        .harness
        .signed_in("mauzo@hera.co.ke", Role::Staff)
        .await;
    let (customer, customer_token) = running
        .harness
        .signed_in("halima@example.co.ke", Role::Customer)
        .await;

    let mut staff = connect(&running, &staff_token).await;
    let greeting = next_event(&mut staff, "unreadCount").await;
    assert_eq!(greeting["count"], 0);

    let mut shopper = connect(&running, &customer_token).await;
    let online = loop {
        let event = next_event(&mut staff, "presence").await;
        if event["userId"] == json!(customer.id) {
            break event;
        }
    };
    assert_eq!(online["online"], true);

    let app = test::init_service(running.harness.app()).await;
    let listed = json_body(
        test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/admin/users/online")
                .insert_header(bearer(&staff_token))
                .to_request(),
        )
        .await,
    )
    .await;
    assert!(
        listed["userIds"]
            .as_array()
            .expect("user ids")
            .contains(&json!(customer.id))
    );

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
            .insert_header(bearer(&customer_token))
            .cookie(session_cookie(&added))
            .set_json(json!({
                "shipping": {
                    "recipient": "Halima Said",
                    "phone": "0733444555",
                    "address": "Moi Avenue 7",
                    "city": "Mombasa"
                },
                "paymentMethod": "cash_on_delivery"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let order_number = json_body(placed).await["order"]["orderNumber"]
        .as_str()
        .expect("order number")
        .to_owned();

    let pushed = next_event(&mut staff, "notification").await;
    assert_eq!(pushed["notification"]["kind"], "new_order");
    assert!(
        pushed["notification"]["message"]
            .as_str()
            .expect("message")
            .contains(&order_number)
    );
    let counted = next_event(&mut staff, "unreadCount").await;
    assert_eq!(counted["count"], 1);

    shopper.close().await.expect("close shopper socket");
    let offline = loop {
        let event = next_event(&mut staff, "presence").await;
        if event["userId"] == json!(customer.id) {
            break event;
        }
    };
    assert_eq!(offline["online"], false);
    assert!(!running.harness.http.presence.is_online(customer.id));

    running.handle.stop(false).await;
}
