//! Port for login session persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AuthSession, Error, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by session repository adapters.
    pub enum SessionRepositoryError: persistence {}
}

impl From<SessionRepositoryError> for Error {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("session repository unavailable: {message}"))
            }
            SessionRepositoryError::Query { message } => {
                Error::internal(format!("session repository error: {message}"))
            }
        }
    }
}

/// Storage for [`AuthSession`] rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session.
    async fn create(&self, session: &AuthSession) -> Result<(), SessionRepositoryError>;

    /// Look a session up by access token fingerprint.
    async fn find_by_access_hash(
        &self,
        access_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError>;

    /// Look a session up by refresh token fingerprint.
    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError>;

    /// Store rotated token fingerprints, provided the stored refresh hash
    /// still equals `previous_refresh_hash`. Returns `false` when another
    /// request rotated the session first.
    async fn rotate(
        &self,
        session: &AuthSession,
        previous_refresh_hash: &str,
    ) -> Result<bool, SessionRepositoryError>;

    /// Mark a session revoked. Revoking twice keeps the first instant.
    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), SessionRepositoryError>;

    /// Revoke every live session of a user except `keep`.
    async fn revoke_others(
        &self,
        user_id: &UserId,
        keep: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError>;

    /// Delete sessions whose refresh token expired before `now` or that were
    /// revoked before `revoked_before`.
    async fn purge(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError>;
}
