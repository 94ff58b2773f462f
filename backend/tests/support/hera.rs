//! Shared harness for backend integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so the
//! wiring below is pulled in with `#[path]` rather than copied. It mirrors the
//! production app: `/api/v1` behind silent refresh and the cookie session,
//! the `/ws` entry, and the health probes, all over in-memory ports.
#![allow(
    dead_code,
    reason = "Each test crate uses a different subset of the harness"
)]

use std::sync::Arc;
use std::time::Duration;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use hera_backend::Trace;
use hera_backend::domain::{Money, NewProduct, NewVariant, PresenceRegistry, Role, User};
use hera_backend::inbound::http::health::{HealthState, live, ready};
use hera_backend::inbound::http::routes;
use hera_backend::inbound::http::state::{HttpState, HttpStatePolicies};
use hera_backend::inbound::ws;
use hera_backend::inbound::ws::hub::LiveHub;
use hera_backend::inbound::ws::state::{WsSettings, WsState};
use hera_backend::middleware::SilentRefresh;
use hera_backend::test_support::{InMemoryBackend, SEED_PASSWORD};

pub const ORIGIN: &str = "http://localhost:5173";

/// In-memory backend with both adapter states sharing one live hub.
pub struct Harness {
    pub backend: InMemoryBackend,
    pub http: web::Data<HttpState>,
    pub ws: web::Data<WsState>,
    pub health: web::Data<HealthState>,
    pub key: Key,
}

/// Socket settings short enough for tests to observe timeouts.
pub fn quick_ws_settings() -> WsSettings {
    WsSettings {
        allowed_origins: vec![Url::parse(ORIGIN).expect("static origin")],
        presence_grace: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(200),
        client_timeout: Duration::from_secs(5),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ws_settings(quick_ws_settings())
    }

    pub fn with_ws_settings(settings: WsSettings) -> Self {
        let backend = InMemoryBackend::new();
        let hub = Arc::new(LiveHub::new());
        let http = HttpState::new(
            backend.ports_with_publisher(hub.clone()),
            HttpStatePolicies::default(),
            Arc::new(PresenceRegistry::new()),
        );
        let ws = WsState::sharing(&http, hub, settings);
        let health = HealthState::new();
        health.mark_ready();
        Self {
            backend,
            http: web::Data::new(http),
            ws: web::Data::new(ws),
            health: web::Data::new(health),
            key: Key::generate(),
        }
    }

    /// The production route table over this harness's state.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        build_app(
            self.http.clone(),
            self.ws.clone(),
            self.health.clone(),
            self.key.clone(),
        )
    }

    /// Seed a verified account and sign it in.
    pub async fn signed_in(&self, email: &str, role: Role) -> (User, String) {
        let user = self.backend.seed_user(email, role).await;
        let outcome = self
            .http
            .auth
            .login(email, SEED_PASSWORD)
            .await
            .expect("seeded account logs in");
        (user, outcome.tokens.access_token)
    }

    /// Create an active product with one variant and return the variant id.
    pub async fn stocked_variant(&self, name: &str, price: Money, stock: i32) -> Uuid {
        let owner = match self.backend.store.user_by_email(CATALOGUE_OWNER) {
            Some(user) => user,
            None => self.backend.seed_user(CATALOGUE_OWNER, Role::Admin).await,
        };
        let product = self
            .http
            .catalogue
            .create_product(NewProduct {
                category_id: None,
                name: name.to_owned(),
                description: format!("{name}, tailored in Nairobi"),
                base_price: price,
                image_urls: Vec::new(),
                is_active: true,
            })
            .await
            .expect("fixture product");
        self.http
            .catalogue
            .create_variant(
                product.product.id,
                NewVariant {
                    sku: format!("SKU-{}", Uuid::new_v4().simple()),
                    size: Some("M".to_owned()),
                    colour: None,
                    price_override: None,
                    initial_stock: stock,
                    low_stock_threshold: 2,
                },
                owner.id,
            )
            .await
            .expect("fixture variant")
            .id
    }
}

const CATALOGUE_OWNER: &str = "catalogue@hera.co.ke";

/// Assemble the app the way the server does, with a plain-HTTP cookie.
pub fn build_app(
    http: web::Data<HttpState>,
    ws_state: web::Data<WsState>,
    health: web::Data<HealthState>,
    key: Key,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let session = SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build();
    App::new()
        .app_data(http)
        .app_data(ws_state)
        .app_data(health)
        .wrap(Trace)
        .service(
            web::scope("/api/v1")
                .wrap(SilentRefresh)
                .wrap(session)
                .configure(routes::configure),
        )
        .service(ws::ws_entry)
        .service(ready)
        .service(live)
}

/// `Authorization` header for a bearer token.
pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Read and parse a JSON response body.
pub async fn json_body(response: ServiceResponse) -> Value {
    let body = actix_web::test::read_body(response).await;
    serde_json::from_slice(&body).expect("response JSON")
}

/// First `session` cookie on a response, detached from its lifetime.
pub fn session_cookie(response: &ServiceResponse) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}
