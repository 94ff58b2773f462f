//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Money, NewProduct, NewVariant, PresenceRegistry, Role, User};
use crate::inbound::http::routes;
use crate::inbound::http::state::{HttpState, HttpStatePolicies};
use crate::test_support::{InMemoryBackend, SEED_PASSWORD};

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    test_session_middleware_with_key(Key::generate())
}

fn test_session_middleware_with_key(key: Key) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Bare application wrapped in the test session middleware.
pub fn session_app() -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new().wrap(test_session_middleware())
}

/// In-memory backend plus the HTTP state wired to it.
pub struct TestApi {
    pub backend: InMemoryBackend,
    pub state: web::Data<HttpState>,
    key: Key,
}

impl TestApi {
    pub fn new() -> Self {
        let backend = InMemoryBackend::new();
        let state = HttpState::new(
            backend.ports(),
            HttpStatePolicies::default(),
            Arc::new(PresenceRegistry::new()),
        );
        Self {
            backend,
            state: web::Data::new(state),
            key: Key::generate(),
        }
    }

    /// Full `/api/v1` surface. Every call shares one cookie key, so session
    /// cookies survive across `init_service` calls in a test.
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
        App::new().app_data(self.state.clone()).service(
            web::scope("/api/v1")
                .wrap(test_session_middleware_with_key(self.key.clone()))
                .configure(routes::configure),
        )
    }

    /// Seed a verified account and return it with a live access token.
    pub async fn signed_in(&self, email: &str, role: Role) -> (User, String) {
        let user = self.backend.seed_user(email, role).await;
        let outcome = self
            .state
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
            .state
            .catalogue
            .create_product(NewProduct {
                category_id: None,
                name: name.to_owned(),
                description: format!("{name}, made in Nairobi"),
                base_price: price,
                image_urls: Vec::new(),
                is_active: true,
            })
            .await
            .expect("fixture product");
        self.state
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

impl Default for TestApi {
    fn default() -> Self {
        Self::new()
    }
}

/// `Authorization` header value for a bearer token.
pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
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

/// Read and parse a JSON response body.
pub async fn json_body(response: ServiceResponse) -> Value {
    let body = actix_web::test::read_body(response).await;
    serde_json::from_slice(&body).expect("response JSON")
}
