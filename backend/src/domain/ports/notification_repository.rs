//! Port for stored notifications.

use async_trait::async_trait;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::{Error, Notification, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification repository adapters.
    pub enum NotificationRepositoryError: persistence {}
}

impl From<NotificationRepositoryError> for Error {
    fn from(err: NotificationRepositoryError) -> Self {
        match err {
            NotificationRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("notification repository unavailable: {message}"))
            }
            NotificationRepositoryError::Query { message } => {
                Error::internal(format!("notification repository error: {message}"))
            }
        }
    }
}

/// Storage for per-recipient notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert notifications in one statement.
    async fn insert_many(
        &self,
        notifications: &[Notification],
    ) -> Result<(), NotificationRepositoryError>;

    /// Page through a recipient's notifications, newest first.
    async fn list(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), NotificationRepositoryError>;

    /// Mark one of the recipient's notifications read. Returns `false` when
    /// the recipient has no such notification.
    async fn mark_read(
        &self,
        recipient_id: &UserId,
        id: Uuid,
    ) -> Result<bool, NotificationRepositoryError>;

    /// Mark every notification of the recipient read.
    async fn mark_all_read(&self, recipient_id: &UserId)
    -> Result<u64, NotificationRepositoryError>;

    /// Unread notifications for the recipient.
    async fn unread_count(&self, recipient_id: &UserId) -> Result<u64, NotificationRepositoryError>;
}
