//! PostgreSQL persistence adapters using Diesel.
//!
//! Each repository implements one domain port over a shared [`DbPool`].
//! Row structs (`models`) and table definitions (`schema`) stay private to
//! this module; adapters only translate between rows and domain types and
//! map database failures onto the port's error enum. Unique and foreign-key
//! violations are recognised by constraint name so the domain sees
//! `DuplicateSku`, `CategoryInUse` and friends instead of raw SQL errors.
//!
//! ```ignore
//! use hera_backend::outbound::persistence::{DbPool, DieselOrderRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/hera")).await?;
//! let orders = DieselOrderRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_catalogue_repository;
mod diesel_discount_repository;
mod diesel_expense_repository;
mod diesel_helpers;
mod diesel_notification_repository;
mod diesel_order_repository;
mod diesel_payment_repository;
mod diesel_session_repository;
mod diesel_stock_repository;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_catalogue_repository::DieselCatalogueRepository;
pub use diesel_discount_repository::DieselDiscountRepository;
pub use diesel_expense_repository::DieselExpenseRepository;
pub use diesel_notification_repository::DieselNotificationRepository;
pub use diesel_order_repository::DieselOrderRepository;
pub use diesel_payment_repository::DieselPaymentRepository;
pub use diesel_session_repository::DieselSessionRepository;
pub use diesel_stock_repository::DieselStockRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
