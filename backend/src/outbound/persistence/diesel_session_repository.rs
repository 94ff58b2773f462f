//! PostgreSQL-backed `SessionRepository`.
//!
//! Only SHA-256 fingerprints of tokens reach the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{SessionRepository, SessionRepositoryError};
use crate::domain::{AuthSession, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::diesel_helpers::affected;
use super::models::SessionRow;
use super::pool::{DbPool, PoolError};
use super::schema::auth_sessions;

/// Diesel implementation of the login session store.
#[derive(Clone)]
pub struct DieselSessionRepository {
    pool: DbPool,
}

impl DieselSessionRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SessionRepositoryError {
    map_basic_pool_error(error, SessionRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SessionRepositoryError {
    map_basic_diesel_error(
        error,
        SessionRepositoryError::query,
        SessionRepositoryError::connection,
    )
}

#[async_trait]
impl SessionRepository for DieselSessionRepository {
    async fn create(&self, session: &AuthSession) -> Result<(), SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(auth_sessions::table)
            .values(SessionRow::from(session))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_by_access_hash(
        &self,
        access_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = auth_sessions::table
            .filter(auth_sessions::access_token_hash.eq(access_hash))
            .select(SessionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(AuthSession::from))
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = auth_sessions::table
            .filter(auth_sessions::refresh_token_hash.eq(refresh_hash))
            .select(SessionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(AuthSession::from))
    }

    async fn rotate(
        &self,
        session: &AuthSession,
        previous_refresh_hash: &str,
    ) -> Result<bool, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            auth_sessions::table
                .filter(auth_sessions::id.eq(session.id))
                .filter(auth_sessions::refresh_token_hash.eq(previous_refresh_hash))
                .filter(auth_sessions::revoked_at.is_null()),
        )
        .set((
            auth_sessions::access_token_hash.eq(session.access_token_hash.as_str()),
            auth_sessions::refresh_token_hash.eq(session.refresh_token_hash.as_str()),
            auth_sessions::access_expires_at.eq(session.access_expires_at),
            auth_sessions::refresh_expires_at.eq(session.refresh_expires_at),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated == 1)
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            auth_sessions::table
                .filter(auth_sessions::id.eq(id))
                .filter(auth_sessions::revoked_at.is_null()),
        )
        .set(auth_sessions::revoked_at.eq(Some(at)))
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }

    async fn revoke_others(
        &self,
        user_id: &UserId,
        keep: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            auth_sessions::table
                .filter(auth_sessions::user_id.eq(user_id.as_uuid()))
                .filter(auth_sessions::id.ne(keep))
                .filter(auth_sessions::revoked_at.is_null()),
        )
        .set(auth_sessions::revoked_at.eq(Some(at)))
        .execute(&mut conn)
        .await
        .map(affected)
        .map_err(map_diesel_error)
    }

    async fn purge(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(
            auth_sessions::table.filter(
                auth_sessions::refresh_expires_at
                    .lt(now)
                    .or(auth_sessions::revoked_at.lt(revoked_before)),
            ),
        )
        .execute(&mut conn)
        .await
        .map(affected)
        .map_err(map_diesel_error)
    }
}
