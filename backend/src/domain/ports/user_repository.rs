//! Port for account persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::PageRequest;

use crate::domain::{Error, EmailAddress, Role, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by user repository adapters.
    pub enum UserRepositoryError: persistence {
        /// Another account already uses the address.
        DuplicateEmail { email: String } => "email {email} is already registered",
        /// Back-office records still reference the account.
        InUse => "account is still referenced by back-office records",
    }
}

impl From<UserRepositoryError> for Error {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("user repository unavailable: {message}"))
            }
            UserRepositoryError::Query { message } => {
                Error::internal(format!("user repository error: {message}"))
            }
            UserRepositoryError::DuplicateEmail { email } => {
                Error::conflict(format!("email {email} is already registered"))
                    .with_reason("email_taken")
            }
            UserRepositoryError::InUse => {
                Error::conflict("account is still referenced by back-office records")
                    .with_reason("user_in_use")
            }
        }
    }
}

/// Storage for user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account.
    async fn create(&self, user: &User) -> Result<(), UserRepositoryError>;

    /// Fetch an account by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError>;

    /// Fetch an account by its normalised email.
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError>;

    /// Fetch the account holding an outstanding verification token.
    async fn find_by_verification_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, UserRepositoryError>;

    /// Overwrite every mutable column of an existing account.
    async fn update(&self, user: &User) -> Result<(), UserRepositoryError>;

    /// Page through accounts, newest first.
    async fn list(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<(Vec<User>, u64), UserRepositoryError>;

    /// Remove an account. Returns `false` when it did not exist.
    async fn delete(&self, id: &UserId) -> Result<bool, UserRepositoryError>;

    /// Identifiers of every staff and admin account.
    async fn staff_ids(&self) -> Result<Vec<UserId>, UserRepositoryError>;

    /// Delete unverified accounts whose verification window closed before
    /// `now` and that never placed an order.
    async fn delete_lapsed_unverified(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, UserRepositoryError>;
}
