//! PostgreSQL-backed `NotificationRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{NotificationRepository, NotificationRepositoryError};
use crate::domain::{Notification, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::diesel_helpers::{affected, collect_rows, count_to_total};
use super::models::NotificationRow;
use super::pool::{DbPool, PoolError};
use super::schema::notifications;

/// Diesel implementation of the in-app inbox.
#[derive(Clone)]
pub struct DieselNotificationRepository {
    pool: DbPool,
}

impl DieselNotificationRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> NotificationRepositoryError {
    map_basic_pool_error(error, NotificationRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> NotificationRepositoryError {
    map_basic_diesel_error(
        error,
        NotificationRepositoryError::query,
        NotificationRepositoryError::connection,
    )
}

#[async_trait]
impl NotificationRepository for DieselNotificationRepository {
    async fn insert_many(
        &self,
        notifications: &[Notification],
    ) -> Result<(), NotificationRepositoryError> {
        if notifications.is_empty() {
            return Ok(());
        }
        let rows: Vec<NotificationRow> = notifications.iter().map(NotificationRow::from).collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(notifications::table)
            .values(&rows)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn list(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let recipient = *recipient_id.as_uuid();
        let filtered = || {
            let mut query = notifications::table
                .filter(notifications::recipient_id.eq(recipient))
                .into_boxed();
            if unread_only {
                query = query.filter(notifications::is_read.eq(false));
            }
            query
        };

        let total: i64 = filtered()
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<NotificationRow> = filtered()
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(NotificationRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok((
            collect_rows(rows, NotificationRepositoryError::query)?,
            count_to_total(total),
        ))
    }

    async fn mark_read(
        &self,
        recipient_id: &UserId,
        id: Uuid,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::recipient_id.eq(recipient_id.as_uuid())),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await
        .map(|updated| updated > 0)
        .map_err(map_diesel_error)
    }

    async fn mark_all_read(
        &self,
        recipient_id: &UserId,
    ) -> Result<u64, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(recipient_id.as_uuid()))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await
        .map(affected)
        .map_err(map_diesel_error)
    }

    async fn unread_count(&self, recipient_id: &UserId) -> Result<u64, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        notifications::table
            .filter(notifications::recipient_id.eq(recipient_id.as_uuid()))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .await
            .map(count_to_total)
            .map_err(map_diesel_error)
    }
}
