//! Port for orders and the stock they consume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::PageRequest;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    Error, LowStockItem, Order, OrderDetail, OrderFilter, OrderPlacement, OrderStatus,
    PaymentStatus, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by order repository adapters.
    pub enum OrderRepositoryError: persistence {
        /// A line asked for more units than are on hand.
        InsufficientStock { variant_id: Uuid, available: i32, requested: i32 } =>
            "variant {variant_id} has {available} units, {requested} requested",
        /// A line referenced a variant that no longer exists.
        UnknownVariant { variant_id: Uuid } => "variant {variant_id} does not exist",
        /// The discount reached its usage limit while the order was placed.
        DiscountExhausted => "discount usage limit reached",
        /// The generated order number collided with an existing order.
        DuplicateOrderNumber => "order number already exists",
    }
}

impl From<OrderRepositoryError> for Error {
    fn from(err: OrderRepositoryError) -> Self {
        match err {
            OrderRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("order repository unavailable: {message}"))
            }
            OrderRepositoryError::Query { message } => {
                Error::internal(format!("order repository error: {message}"))
            }
            OrderRepositoryError::InsufficientStock {
                variant_id,
                available,
                requested,
            } => Error::conflict("insufficient stock").with_details(json!({
                "code": "insufficient_stock",
                "variantId": variant_id,
                "available": available,
                "requested": requested,
            })),
            OrderRepositoryError::UnknownVariant { variant_id } => {
                Error::invalid_request(format!("variant {variant_id} is not available"))
                    .with_reason("variant_unavailable")
            }
            OrderRepositoryError::DiscountExhausted => {
                Error::conflict("discount code has been fully used")
                    .with_reason("discount_exhausted")
            }
            OrderRepositoryError::DuplicateOrderNumber => {
                Error::conflict("order number collision").with_reason("order_number_taken")
            }
        }
    }
}

/// Status change applied with a compare-and-set on the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Order to change.
    pub order_id: Uuid,
    /// Status the caller observed.
    pub from: OrderStatus,
    /// New status.
    pub to: OrderStatus,
    /// New payment status, when it changes too.
    pub payment_status: Option<PaymentStatus>,
    /// Operator, recorded on stock movements for cancellations.
    pub performed_by: Option<UserId>,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Storage for orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the order and its items, take stock with `sale` movements and
    /// count the discount use, all in one transaction. Returns the variants
    /// that crossed their low stock threshold.
    async fn place(
        &self,
        placement: &OrderPlacement,
    ) -> Result<Vec<LowStockItem>, OrderRepositoryError>;

    /// Fetch an order with its items.
    async fn find(&self, id: Uuid) -> Result<Option<OrderDetail>, OrderRepositoryError>;

    /// Fetch an order by its human-friendly number.
    async fn find_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderDetail>, OrderRepositoryError>;

    /// Page through a customer's orders, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<OrderDetail>, u64), OrderRepositoryError>;

    /// Page through every order matching a filter, newest first.
    async fn list(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), OrderRepositoryError>;

    /// Apply a status change if the order is still in `change.from`.
    /// Moving to `cancelled` returns every item to stock with `return`
    /// movements in the same transaction.
    async fn change_status(&self, change: StatusChange) -> Result<bool, OrderRepositoryError>;

    /// Set the payment status without touching the fulfilment status.
    async fn set_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError>;

    /// Every order created in `[from, to)` with its items.
    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderDetail>, OrderRepositoryError>;
}
