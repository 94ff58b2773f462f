//! Port for discount code persistence.

use async_trait::async_trait;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::{Discount, Error};

use super::define_port_error;

define_port_error! {
    /// Errors raised by discount repository adapters.
    pub enum DiscountRepositoryError: persistence {
        /// Another discount already uses the code.
        DuplicateCode { code: String } => "discount code {code} already exists",
    }
}

impl From<DiscountRepositoryError> for Error {
    fn from(err: DiscountRepositoryError) -> Self {
        match err {
            DiscountRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("discount repository unavailable: {message}"))
            }
            DiscountRepositoryError::Query { message } => {
                Error::internal(format!("discount repository error: {message}"))
            }
            DiscountRepositoryError::DuplicateCode { code } => {
                Error::conflict(format!("discount code {code} already exists"))
                    .with_reason("discount_code_taken")
            }
        }
    }
}

/// Storage for discount codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// Page through discounts, newest first.
    async fn list(&self, page: PageRequest) -> Result<(Vec<Discount>, u64), DiscountRepositoryError>;

    /// Fetch a discount.
    async fn find(&self, id: Uuid) -> Result<Option<Discount>, DiscountRepositoryError>;

    /// Fetch a discount by its normalised code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, DiscountRepositoryError>;

    /// Insert a discount.
    async fn insert(&self, discount: &Discount) -> Result<(), DiscountRepositoryError>;

    /// Overwrite a discount's definition; the use counter is left untouched.
    async fn update(&self, discount: &Discount) -> Result<bool, DiscountRepositoryError>;

    /// Delete a discount.
    async fn delete(&self, id: Uuid) -> Result<bool, DiscountRepositoryError>;
}
