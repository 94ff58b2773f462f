//! Port for one-way password hashing.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by password hashing adapters.
    pub enum PasswordHasherError {
        /// Hashing failed.
        Hash { message: String } => "password hashing failed: {message}",
        /// The stored hash could not be parsed.
        MalformedHash { message: String } => "stored password hash is malformed: {message}",
    }
}

/// Hashes and verifies passwords. Implementations run the expensive work off
/// the async executor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing hash of `password`.
    async fn hash(&self, password: &str) -> Result<String, PasswordHasherError>;

    /// Check `password` against a hash produced by [`PasswordHasher::hash`].
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHasherError>;
}
