//! M-Pesa STK push payments and their asynchronous callbacks.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::order_service::ensure_visible;
use crate::domain::ports::{
    MpesaGateway, MpesaGatewayError, OrderRepository, PaymentRepository, PaymentSettlement,
    StatusChange,
};
use crate::domain::{
    CallbackToken, Channel, Error, MpesaPhone, NotificationDraft, NotificationKind, NotificationService, Order,
    OrderStatus, Payment, PaymentMethod, PaymentState, PaymentStatus, Principal, StkCallback,
    StkPushRequest, amount_in_shillings,
};

/// A started STK push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    /// Stored pending payment.
    pub payment: Payment,
    /// Gateway message to show the customer.
    pub customer_message: String,
}

pub(crate) fn parse_phone(field: &str, raw: &str) -> Result<MpesaPhone, Error> {
    MpesaPhone::parse(raw)
        .map_err(|err| Error::invalid_field(field, "invalid_phone", err.to_string()))
}

fn gateway_error(err: MpesaGatewayError) -> Error {
    match err {
        MpesaGatewayError::NotConfigured => {
            Error::service_unavailable("M-Pesa payments are not available")
                .with_reason("payments_unavailable")
        }
        MpesaGatewayError::Unavailable { message } => {
            Error::service_unavailable(format!("M-Pesa gateway unavailable: {message}"))
                .with_reason("mpesa_unavailable")
        }
        MpesaGatewayError::Rejected { message } => {
            Error::service_unavailable(format!("M-Pesa rejected the request: {message}"))
                .with_reason("mpesa_rejected")
        }
    }
}

/// Payment service.
#[derive(Clone)]
pub struct PaymentService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn MpesaGateway>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
    callback_token: Option<CallbackToken>,
}

impl PaymentService {
    /// Create the service.
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn MpesaGateway>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            payments,
            gateway,
            notifications,
            clock,
            callback_token: None,
        }
    }

    /// Accept callbacks presenting `token`. Without one every callback is
    /// refused.
    #[must_use]
    pub fn with_callback_token(mut self, token: Option<CallbackToken>) -> Self {
        self.callback_token = token;
        self
    }

    /// Check the secret a callback request presented.
    pub fn authorize_callback(&self, presented: Option<&str>) -> Result<(), Error> {
        match (&self.callback_token, presented) {
            (Some(expected), Some(presented)) if expected.matches(presented) => Ok(()),
            _ => {
                warn!("M-Pesa callback rejected: missing or wrong token");
                Err(Error::unauthorized("callback token rejected")
                    .with_reason("callback_unauthorized"))
            }
        }
    }

    /// Start an STK push for an order that has not been paid.
    pub async fn initiate(
        &self,
        order: &Order,
        phone: &MpesaPhone,
    ) -> Result<PaymentInitiation, Error> {
        if order.payment_method != PaymentMethod::Mpesa {
            return Err(Error::invalid_request("order is not paid with M-Pesa")
                .with_reason("wrong_payment_method"));
        }
        if order.status == OrderStatus::Cancelled
            || matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded)
        {
            return Err(Error::conflict("order does not accept payments")
                .with_reason("order_not_payable"));
        }

        let accepted = self
            .gateway
            .stk_push(&StkPushRequest {
                phone: phone.clone(),
                amount: order.total,
                account_reference: order.order_number.clone(),
                description: format!("Hera Collection {}", order.order_number),
            })
            .await
            .map_err(gateway_error)?;

        let now = self.clock.utc();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            phone: phone.as_str().to_owned(),
            amount: order.total,
            merchant_request_id: accepted.merchant_request_id,
            checkout_request_id: accepted.checkout_request_id,
            status: PaymentState::Pending,
            result_code: None,
            result_description: None,
            receipt_number: None,
            created_at: now,
            updated_at: now,
        };
        self.payments.insert(&payment).await?;
        self.orders
            .set_payment_status(order.id, PaymentStatus::Pending, now)
            .await?;
        info!(
            order_id = %order.id,
            checkout_request_id = %payment.checkout_request_id,
            "STK push started"
        );
        Ok(PaymentInitiation {
            payment,
            customer_message: accepted.customer_message,
        })
    }

    async fn load_visible(&self, principal: &Principal, order_id: Uuid) -> Result<Order, Error> {
        let detail = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("order {order_id} not found")))?;
        ensure_visible(principal, &detail.order)?;
        Ok(detail.order)
    }

    /// Start another STK push after a failed or abandoned attempt.
    pub async fn retry(
        &self,
        principal: &Principal,
        order_id: Uuid,
        phone: &str,
    ) -> Result<PaymentInitiation, Error> {
        let phone = parse_phone("phone", phone)?;
        let order = self.load_visible(principal, order_id).await?;
        self.initiate(&order, &phone).await
    }

    /// Latest payment attempt for an order.
    pub async fn status(&self, principal: &Principal, order_id: Uuid) -> Result<Payment, Error> {
        self.load_visible(principal, order_id).await?;
        self.payments
            .latest_for_order(order_id)
            .await?
            .ok_or_else(|| Error::not_found("no payment has been started for this order"))
    }

    /// Apply a Daraja callback. Repeated callbacks are ignored.
    pub async fn handle_callback(&self, callback: StkCallback) -> Result<(), Error> {
        let existing = self
            .payments
            .find_by_checkout_id(&callback.checkout_request_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "checkout request {} not found",
                    callback.checkout_request_id
                ))
            })?;
        if existing.status != PaymentState::Pending {
            info!(checkout_request_id = %existing.checkout_request_id, "callback already applied");
            return Ok(());
        }

        let succeeded = callback.succeeded();
        if succeeded {
            let expected = amount_in_shillings(existing.amount);
            if callback.amount != Some(expected) {
                warn!(
                    checkout_request_id = %existing.checkout_request_id,
                    expected,
                    reported = ?callback.amount,
                    "callback amount does not match the payment"
                );
                return Err(Error::invalid_request("callback amount does not match the payment")
                    .with_reason("amount_mismatch"));
            }
        }

        let now = self.clock.utc();
        let settlement = PaymentSettlement {
            status: if succeeded {
                PaymentState::Succeeded
            } else {
                PaymentState::Failed
            },
            result_code: callback.result_code,
            result_description: callback.result_description.clone(),
            receipt_number: callback.receipt_number.clone().filter(|_| succeeded),
            at: now,
        };
        let Some(payment) = self
            .payments
            .settle(&callback.checkout_request_id, &settlement)
            .await?
        else {
            info!(checkout_request_id = %callback.checkout_request_id, "callback lost settle race");
            return Ok(());
        };
        let Some(detail) = self.orders.find(payment.order_id).await? else {
            warn!(order_id = %payment.order_id, "settled payment for a missing order");
            return Ok(());
        };
        let order = detail.order;
        if succeeded {
            self.mark_paid(&order, &payment).await
        } else {
            self.mark_failed(&order, &callback).await
        }
    }

    async fn mark_paid(&self, order: &Order, payment: &Payment) -> Result<(), Error> {
        let now = self.clock.utc();
        if order.status == OrderStatus::Pending {
            let to = match order.channel {
                Channel::Pos => OrderStatus::Delivered,
                Channel::Online => OrderStatus::Paid,
            };
            let changed = self
                .orders
                .change_status(StatusChange {
                    order_id: order.id,
                    from: OrderStatus::Pending,
                    to,
                    payment_status: Some(PaymentStatus::Paid),
                    performed_by: None,
                    at: now,
                })
                .await?;
            if !changed {
                self.orders
                    .set_payment_status(order.id, PaymentStatus::Paid, now)
                    .await?;
            }
        } else {
            warn!(
                order_id = %order.id,
                status = order.status.as_str(),
                "payment received for an order that is no longer pending"
            );
            self.orders
                .set_payment_status(order.id, PaymentStatus::Paid, now)
                .await?;
        }
        info!(
            order_id = %order.id,
            receipt = payment.receipt_number.as_deref().unwrap_or_default(),
            "M-Pesa payment received"
        );
        self.notifications
            .notify_staff(NotificationDraft::new(
                NotificationKind::PaymentReceived,
                "Payment received",
                format!(
                    "Order {} was paid via M-Pesa ({})",
                    order.order_number,
                    payment.receipt_number.as_deref().unwrap_or("no receipt")
                ),
                Some(order.id),
            ))
            .await;
        Ok(())
    }

    async fn mark_failed(&self, order: &Order, callback: &StkCallback) -> Result<(), Error> {
        if order.payment_status == PaymentStatus::Pending {
            self.orders
                .set_payment_status(order.id, PaymentStatus::Failed, self.clock.utc())
                .await?;
        }
        info!(
            order_id = %order.id,
            result_code = callback.result_code,
            "M-Pesa payment failed"
        );
        let draft = NotificationDraft::new(
            NotificationKind::PaymentFailed,
            "Payment failed",
            format!(
                "Payment for order {} did not complete: {}",
                order.order_number, callback.result_description
            ),
            Some(order.id),
        );
        match order.user_id {
            Some(customer) => self.notifications.notify_user(customer, draft).await,
            None => self.notifications.notify_staff(draft).await,
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "payment_service_tests.rs"]
mod tests;
