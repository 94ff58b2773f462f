//! Port for M-Pesa payment records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Error, Payment, PaymentState};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment repository adapters.
    pub enum PaymentRepositoryError: persistence {
        /// The checkout request id was already recorded.
        DuplicateCheckout { checkout_request_id: String } =>
            "checkout request {checkout_request_id} already recorded",
    }
}

impl From<PaymentRepositoryError> for Error {
    fn from(err: PaymentRepositoryError) -> Self {
        match err {
            PaymentRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("payment repository unavailable: {message}"))
            }
            PaymentRepositoryError::Query { message } => {
                Error::internal(format!("payment repository error: {message}"))
            }
            PaymentRepositoryError::DuplicateCheckout {
                checkout_request_id,
            } => Error::conflict(format!(
                "checkout request {checkout_request_id} already recorded"
            )),
        }
    }
}

/// Final outcome written when a callback arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettlement {
    /// `Succeeded` or `Failed`.
    pub status: PaymentState,
    /// Daraja result code.
    pub result_code: i32,
    /// Daraja result description.
    pub result_description: String,
    /// Receipt number on success.
    pub receipt_number: Option<String>,
    /// When the callback arrived.
    pub at: DateTime<Utc>,
}

/// Storage for payment attempts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a pending payment.
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentRepositoryError>;

    /// Fetch a payment by Daraja checkout request id.
    async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>, PaymentRepositoryError>;

    /// Settle a payment that is still pending. Returns the updated payment,
    /// or `None` when it was already settled.
    async fn settle(
        &self,
        checkout_request_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<Option<Payment>, PaymentRepositoryError>;

    /// Most recent payment attempt for an order.
    async fn latest_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PaymentRepositoryError>;
}
