//! Port for the Safaricom Daraja STK push API.

use async_trait::async_trait;

use crate::domain::{StkPushAccepted, StkPushRequest};

use super::define_port_error;

define_port_error! {
    /// Errors raised by M-Pesa gateway adapters.
    pub enum MpesaGatewayError {
        /// No credentials were configured.
        NotConfigured => "M-Pesa payments are not configured",
        /// The gateway could not be reached or answered with a server error.
        Unavailable { message: String } => "M-Pesa gateway unavailable: {message}",
        /// The gateway refused the request.
        Rejected { message: String } => "M-Pesa gateway rejected the request: {message}",
    }
}

/// Starts customer-confirmed payments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MpesaGateway: Send + Sync {
    /// Send an STK push to the customer's handset.
    async fn stk_push(&self, request: &StkPushRequest)
    -> Result<StkPushAccepted, MpesaGatewayError>;
}

/// Gateway used when no Daraja credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMpesaGateway;

#[async_trait]
impl MpesaGateway for DisabledMpesaGateway {
    async fn stk_push(
        &self,
        _request: &StkPushRequest,
    ) -> Result<StkPushAccepted, MpesaGatewayError> {
        Err(MpesaGatewayError::not_configured())
    }
}
