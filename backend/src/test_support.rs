//! In-memory doubles for every driven port.
//!
//! Compiled for unit tests and behind the `test-support` feature so the
//! integration suites in `tests/` can run the full HTTP and WebSocket stack
//! without PostgreSQL or Safaricom.

mod clock;
mod gateway;
mod memory;
mod publisher;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::ports::LiveEventPublisher;
use crate::domain::{CallbackToken, EmailAddress, Role, User, UserId};
use crate::inbound::http::state::HttpStatePorts;
use crate::outbound::security::Argon2PasswordHasher;

pub use clock::MutableClock;
pub use gateway::{FakeMpesaGateway, GatewayMode};
pub use memory::InMemoryStore;
pub use publisher::RecordingPublisher;

/// Password used for every seeded account.
pub const SEED_PASSWORD: &str = "kitenge-and-kikoi-2024";

/// Callback secret the in-memory ports accept.
pub const CALLBACK_TOKEN: &str = "daraja-callback-test-secret";

/// Callback route with [`CALLBACK_TOKEN`] attached.
pub const CALLBACK_URI: &str =
    "/api/v1/payments/mpesa/callback?token=daraja-callback-test-secret";

/// Instant the mutable clock starts at: a Monday morning in Nairobi.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A complete set of in-memory adapters sharing one store and clock.
#[derive(Clone)]
pub struct InMemoryBackend {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<FakeMpesaGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub clock: Arc<MutableClock>,
    hasher: Arc<Argon2PasswordHasher>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Fresh, empty backend with an accepting gateway.
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::default()),
            gateway: Arc::new(FakeMpesaGateway::default()),
            publisher: Arc::new(RecordingPublisher::default()),
            clock: Arc::new(MutableClock::new(epoch())),
            hasher: Arc::new(Argon2PasswordHasher::insecure_fast()),
        }
    }

    /// Ports wired to this backend, publishing to the recording publisher.
    pub fn ports(&self) -> HttpStatePorts {
        self.ports_with_publisher(self.publisher.clone())
    }

    /// Ports wired to this backend with a caller-supplied publisher.
    pub fn ports_with_publisher(&self, publisher: Arc<dyn LiveEventPublisher>) -> HttpStatePorts {
        HttpStatePorts {
            users: self.store.clone(),
            sessions: self.store.clone(),
            catalogue: self.store.clone(),
            stock: self.store.clone(),
            discounts: self.store.clone(),
            orders: self.store.clone(),
            payments: self.store.clone(),
            notifications: self.store.clone(),
            expenses: self.store.clone(),
            hasher: self.hasher.clone(),
            gateway: self.gateway.clone(),
            mpesa_callback_token: Some(CallbackToken::new(CALLBACK_TOKEN)),
            publisher,
            clock: self.clock.clone(),
        }
    }

    /// Insert a verified account whose password is [`SEED_PASSWORD`].
    ///
    /// # Panics
    ///
    /// Panics when the address is invalid or hashing fails; both indicate a
    /// broken test fixture.
    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        use crate::domain::ports::PasswordHasher as _;

        let email = EmailAddress::parse(email)
            .unwrap_or_else(|error| panic!("fixture email {email} is invalid: {error}"));
        let password_hash = self
            .hasher
            .hash(SEED_PASSWORD)
            .await
            .unwrap_or_else(|error| panic!("hashing fixture password failed: {error}"));
        let now = self.clock.now();
        let user = User {
            id: UserId::random(),
            full_name: email.as_str().split('@').next().unwrap_or("seed").to_owned(),
            email,
            phone: Some("0712345678".to_owned()),
            password_hash,
            role,
            is_verified: true,
            verification_token_hash: None,
            verification_expires_at: None,
            failed_login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        self.store.put_user(user.clone());
        user
    }
}
