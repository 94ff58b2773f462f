//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data`. It holds the
//! domain services, each wired to the port implementations supplied by the
//! server (Diesel adapters) or by tests (in-memory adapters).

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{
    CatalogueRepository, DiscountRepository, ExpenseRepository, LiveEventPublisher,
    MpesaGateway, NotificationRepository, OrderRepository, PasswordHasher, PaymentRepository,
    SessionRepository, StockRepository, UserRepository,
};
use crate::domain::{
    AuthPolicy, AuthService, CallbackToken, CartService, CatalogueService, CleanupService, DiscountService,
    ExpenseService, NotificationService, OrderService, PaymentService, PresenceRegistry,
    ReportService, ShippingPolicy, StockService, UserService,
};

/// Parameter object bundling every driven port.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub catalogue: Arc<dyn CatalogueRepository>,
    pub stock: Arc<dyn StockRepository>,
    pub discounts: Arc<dyn DiscountRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub gateway: Arc<dyn MpesaGateway>,
    /// Secret Daraja callbacks must present; `None` refuses them all.
    pub mpesa_callback_token: Option<CallbackToken>,
    pub publisher: Arc<dyn LiveEventPublisher>,
    pub clock: Arc<dyn Clock>,
}

/// Business settings that shape service behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpStatePolicies {
    pub auth: AuthPolicy,
    pub shipping: ShippingPolicy,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub auth: AuthService,
    pub users: UserService,
    pub catalogue: CatalogueService,
    pub cart: CartService,
    pub stock: StockService,
    pub discounts: DiscountService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub notifications: NotificationService,
    pub expenses: ExpenseService,
    pub reports: ReportService,
    pub presence: Arc<PresenceRegistry>,
}

impl HttpState {
    /// Wire every service from the supplied ports.
    ///
    /// # Examples
    /// ```no_run
    /// # #[cfg(feature = "test-support")]
    /// # {
    /// use std::sync::Arc;
    ///
    /// use hera_backend::domain::PresenceRegistry;
    /// use hera_backend::inbound::http::state::{HttpState, HttpStatePolicies};
    /// use hera_backend::test_support::InMemoryBackend;
    ///
    /// let backend = InMemoryBackend::new();
    /// let state = HttpState::new(
    ///     backend.ports(),
    ///     HttpStatePolicies::default(),
    ///     Arc::new(PresenceRegistry::new()),
    /// );
    /// let _auth = state.auth.clone();
    /// # }
    /// ```
    pub fn new(
        ports: HttpStatePorts,
        policies: HttpStatePolicies,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        let HttpStatePorts {
            users,
            sessions,
            catalogue,
            stock,
            discounts,
            orders,
            payments,
            notifications,
            expenses,
            hasher,
            gateway,
            mpesa_callback_token,
            publisher,
            clock,
        } = ports;

        let notification_service = NotificationService::new(
            notifications,
            users.clone(),
            publisher,
            clock.clone(),
        );
        let discount_service = DiscountService::new(discounts, clock.clone());
        let payment_service = PaymentService::new(
            orders.clone(),
            payments,
            gateway,
            notification_service.clone(),
            clock.clone(),
        )
        .with_callback_token(mpesa_callback_token);
        let order_service = OrderService::new(
            orders.clone(),
            catalogue.clone(),
            users.clone(),
            discount_service.clone(),
            payment_service.clone(),
            notification_service.clone(),
            clock.clone(),
            policies.shipping,
        );

        Self {
            auth: AuthService::new(
                users.clone(),
                sessions.clone(),
                hasher,
                clock.clone(),
                policies.auth,
            ),
            users: UserService::new(users, sessions, clock.clone()),
            catalogue: CatalogueService::new(catalogue.clone(), clock.clone()),
            cart: CartService::new(catalogue.clone()),
            stock: StockService::new(catalogue, stock, notification_service.clone(), clock.clone()),
            discounts: discount_service,
            orders: order_service,
            payments: payment_service,
            notifications: notification_service,
            expenses: ExpenseService::new(expenses.clone(), clock),
            reports: ReportService::new(orders, expenses),
            presence,
        }
    }
}

impl HttpStatePorts {
    /// Cleanup jobs run against the same account and session stores.
    pub fn cleanup_service(&self) -> CleanupService {
        CleanupService::new(self.sessions.clone(), self.users.clone(), self.clock.clone())
    }
}
