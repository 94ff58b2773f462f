//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports only: inbound adapters talk to the services in
//! [`crate::domain`] directly, while the services reach storage, hashing,
//! the payment gateway and live delivery through the traits declared here.

mod macros;
pub(crate) use macros::define_port_error;

mod catalogue_repository;
mod discount_repository;
mod expense_repository;
mod live_event_publisher;
mod mpesa_gateway;
mod notification_repository;
mod order_repository;
mod password_hasher;
mod payment_repository;
mod session_repository;
mod stock_repository;
mod user_repository;

#[cfg(test)]
pub use catalogue_repository::MockCatalogueRepository;
pub use catalogue_repository::{CatalogueRepository, CatalogueRepositoryError};
#[cfg(test)]
pub use discount_repository::MockDiscountRepository;
pub use discount_repository::{DiscountRepository, DiscountRepositoryError};
#[cfg(test)]
pub use expense_repository::MockExpenseRepository;
pub use expense_repository::{ExpenseRepository, ExpenseRepositoryError};
#[cfg(test)]
pub use live_event_publisher::MockLiveEventPublisher;
pub use live_event_publisher::{LiveEventPublisher, NoopLiveEventPublisher};
#[cfg(test)]
pub use mpesa_gateway::MockMpesaGateway;
pub use mpesa_gateway::{DisabledMpesaGateway, MpesaGateway, MpesaGatewayError};
#[cfg(test)]
pub use notification_repository::MockNotificationRepository;
pub use notification_repository::{NotificationRepository, NotificationRepositoryError};
#[cfg(test)]
pub use order_repository::MockOrderRepository;
pub use order_repository::{OrderRepository, OrderRepositoryError, StatusChange};
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHasher, PasswordHasherError};
#[cfg(test)]
pub use payment_repository::MockPaymentRepository;
pub use payment_repository::{PaymentRepository, PaymentRepositoryError, PaymentSettlement};
#[cfg(test)]
pub use session_repository::MockSessionRepository;
pub use session_repository::{SessionRepository, SessionRepositoryError};
#[cfg(test)]
pub use stock_repository::MockStockRepository;
pub use stock_repository::{StockRepository, StockRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
