//! PostgreSQL-backed `PaymentRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{PaymentRepository, PaymentRepositoryError, PaymentSettlement};
use crate::domain::{Payment, PaymentState};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::models::PaymentRow;
use super::pool::{DbPool, PoolError};
use super::schema::payments;

/// Diesel implementation of the STK push ledger.
#[derive(Clone)]
pub struct DieselPaymentRepository {
    pool: DbPool,
}

impl DieselPaymentRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PaymentRepositoryError {
    map_basic_pool_error(error, PaymentRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> PaymentRepositoryError {
    map_basic_diesel_error(
        error,
        PaymentRepositoryError::query,
        PaymentRepositoryError::connection,
    )
}

fn decode(row: PaymentRow) -> Result<Payment, PaymentRepositoryError> {
    Payment::try_from(row).map_err(PaymentRepositoryError::query)
}

#[async_trait]
impl PaymentRepository for DieselPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(payments::table)
            .values(PaymentRow::from(payment))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| match unique_violation(&err) {
                Some("payments_checkout_request_id_key") => {
                    PaymentRepositoryError::duplicate_checkout(&*payment.checkout_request_id)
                }
                _ => map_diesel_error(err),
            })
    }

    async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        payments::table
            .filter(payments::checkout_request_id.eq(checkout_request_id))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn settle(
        &self,
        checkout_request_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            payments::table
                .filter(payments::checkout_request_id.eq(checkout_request_id))
                .filter(payments::status.eq(PaymentState::Pending.as_str())),
        )
        .set((
            payments::status.eq(settlement.status.as_str()),
            payments::result_code.eq(Some(settlement.result_code)),
            payments::result_description.eq(Some(settlement.result_description.as_str())),
            payments::receipt_number.eq(settlement.receipt_number.as_deref()),
            payments::updated_at.eq(settlement.at),
        ))
        .returning(PaymentRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?
        .map(decode)
        .transpose()
    }

    async fn latest_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        payments::table
            .filter(payments::order_id.eq(order_id))
            .order((payments::created_at.desc(), payments::id.desc()))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }
}
