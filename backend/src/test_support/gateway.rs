//! Scripted stand-in for the Daraja STK push API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{MpesaGateway, MpesaGatewayError};
use crate::domain::{StkPushAccepted, StkPushRequest};

/// How the fake gateway answers the next push.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GatewayMode {
    /// Accept every push with sequential request identifiers.
    #[default]
    Accept,
    /// Fail every push with the given error.
    Fail(MpesaGatewayError),
}

#[derive(Debug, Default)]
pub struct FakeMpesaGateway {
    mode: Mutex<GatewayMode>,
    requests: Mutex<Vec<StkPushRequest>>,
    sequence: AtomicU64,
}

impl FakeMpesaGateway {
    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<StkPushRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checkout identifier of the most recent accepted push.
    pub fn last_checkout_id(&self) -> Option<String> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            n => Some(checkout_id(n)),
        }
    }
}

fn checkout_id(n: u64) -> String {
    format!("ws_CO_{n:08}")
}

#[async_trait]
impl MpesaGateway for FakeMpesaGateway {
    async fn stk_push(
        &self,
        request: &StkPushRequest,
    ) -> Result<StkPushAccepted, MpesaGatewayError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let mode = self
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match mode {
            GatewayMode::Accept => {
                let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(StkPushAccepted {
                    merchant_request_id: format!("mr-{n}"),
                    checkout_request_id: checkout_id(n),
                    customer_message: "Success. Request accepted for processing".to_owned(),
                })
            }
            GatewayMode::Fail(error) => Err(error),
        }
    }
}
