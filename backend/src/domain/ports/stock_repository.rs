//! Port for the stock ledger.

use async_trait::async_trait;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::{Error, LowStockItem, StockMovement};

use super::define_port_error;

define_port_error! {
    /// Errors raised by stock repository adapters.
    pub enum StockRepositoryError: persistence {}
}

impl From<StockRepositoryError> for Error {
    fn from(err: StockRepositoryError) -> Self {
        match err {
            StockRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("stock repository unavailable: {message}"))
            }
            StockRepositoryError::Query { message } => {
                Error::internal(format!("stock repository error: {message}"))
            }
        }
    }
}

/// Storage for stock levels and their movements.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Set the variant's level to `movement.quantity_after` and append the
    /// ledger row in one transaction, provided the stored level still equals
    /// `movement.quantity_before`. Returns `false` when the level moved.
    async fn apply_movement(&self, movement: &StockMovement) -> Result<bool, StockRepositoryError>;

    /// Page through movements, newest first.
    async fn list_movements(
        &self,
        variant_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<(Vec<StockMovement>, u64), StockRepositoryError>;

    /// Variants at or below their threshold, emptiest first.
    async fn low_stock(&self, limit: u32) -> Result<Vec<LowStockItem>, StockRepositoryError>;
}
