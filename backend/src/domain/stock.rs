//! Stock ledger rules.
//!
//! Every change to a variant's on-hand count is a [`StockMovement`] carrying
//! the quantity before and after. The count never drops below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::user::UserId;

/// Reason a stock level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received.
    Addition,
    /// Stock count corrected to an absolute figure.
    Adjustment,
    /// Goods written off.
    Damage,
    /// Goods sold.
    Sale,
    /// Goods returned to the shelf.
    Return,
}

impl MovementKind {
    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Adjustment => "adjustment",
            Self::Damage => "damage",
            Self::Sale => "sale",
            Self::Return => "return",
        }
    }
}

impl std::str::FromStr for MovementKind {
    type Err = StockRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addition" => Ok(Self::Addition),
            "adjustment" => Ok(Self::Adjustment),
            "damage" => Ok(Self::Damage),
            "sale" => Ok(Self::Sale),
            "return" => Ok(Self::Return),
            other => Err(StockRuleError::UnknownKind(other.to_owned())),
        }
    }
}

/// Rule violations raised while computing a movement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockRuleError {
    /// Quantity must be positive (zero is allowed for adjustments).
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    /// The movement would take stock below zero.
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient {
        /// Units on hand.
        available: i32,
        /// Units the movement needs.
        requested: i32,
    },
    /// The movement kind was not recognised.
    #[error("unknown movement kind: {0}")]
    UnknownKind(String),
    /// The result does not fit the stock column.
    #[error("stock quantity overflow")]
    Overflow,
}

/// Compute the quantity after applying a movement.
///
/// `quantity` is the absolute target for adjustments and a unit count for
/// every other kind.
///
/// # Examples
/// ```
/// use hera_backend::domain::{MovementKind, quantity_after};
///
/// assert_eq!(quantity_after(MovementKind::Addition, 4, 3), Ok(7));
/// assert_eq!(quantity_after(MovementKind::Adjustment, 4, 0), Ok(0));
/// assert!(quantity_after(MovementKind::Sale, 2, 3).is_err());
/// ```
pub fn quantity_after(kind: MovementKind, current: i32, quantity: i32) -> Result<i32, StockRuleError> {
    match kind {
        MovementKind::Adjustment => {
            if quantity < 0 {
                return Err(StockRuleError::NonPositiveQuantity);
            }
            Ok(quantity)
        }
        MovementKind::Addition | MovementKind::Return => {
            if quantity <= 0 {
                return Err(StockRuleError::NonPositiveQuantity);
            }
            current.checked_add(quantity).ok_or(StockRuleError::Overflow)
        }
        MovementKind::Damage | MovementKind::Sale => {
            if quantity <= 0 {
                return Err(StockRuleError::NonPositiveQuantity);
            }
            if quantity > current {
                return Err(StockRuleError::Insufficient {
                    available: current,
                    requested: quantity,
                });
            }
            Ok(current - quantity)
        }
    }
}

/// Whether a change moved the level from above `threshold` to at or below it.
pub fn crossed_low_threshold(before: i32, after: i32, threshold: i32) -> bool {
    before > threshold && after <= threshold
}

/// Ledger row describing one stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    /// Identifier.
    pub id: Uuid,
    /// Variant affected.
    pub variant_id: Uuid,
    /// Reason for the change.
    pub kind: MovementKind,
    /// Signed change applied.
    pub quantity_change: i32,
    /// Units before the change.
    pub quantity_before: i32,
    /// Units after the change.
    pub quantity_after: i32,
    /// Free-text explanation.
    pub reason: Option<String>,
    /// Order that caused the change.
    pub order_id: Option<Uuid>,
    /// Operator who recorded it.
    pub performed_by: Option<UserId>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Build a ledger row from the before/after figures.
    pub fn record(draft: MovementDraft, before: i32, after: i32, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            variant_id: draft.variant_id,
            kind: draft.kind,
            quantity_change: after - before,
            quantity_before: before,
            quantity_after: after,
            reason: draft.reason,
            order_id: draft.order_id,
            performed_by: draft.performed_by,
            created_at: at,
        }
    }
}

/// Movement request before the current level is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    /// Variant affected.
    pub variant_id: Uuid,
    /// Reason for the change.
    pub kind: MovementKind,
    /// Free-text explanation.
    pub reason: Option<String>,
    /// Order that caused the change.
    pub order_id: Option<Uuid>,
    /// Operator recording it.
    pub performed_by: Option<UserId>,
}

/// Variant that has reached its low stock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    /// Variant.
    pub variant_id: Uuid,
    /// Parent product.
    pub product_id: Uuid,
    /// Parent product name.
    pub product_name: String,
    /// Variant SKU.
    pub sku: String,
    /// Units on hand.
    pub stock_quantity: i32,
    /// Configured threshold.
    pub low_stock_threshold: i32,
}
