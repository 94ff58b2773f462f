//! Discount codes and their evaluation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Money;

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a whole percentage of the subtotal.
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
}

impl DiscountKind {
    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = DiscountRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(DiscountRuleError::UnknownKind(other.to_owned())),
        }
    }
}

/// Validation failures for discount definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountRuleError {
    /// Code length or alphabet was wrong.
    #[error("code must be 3-32 characters of A-Z, 0-9, '_' or '-'")]
    InvalidCode,
    /// Percentage outside 1-100.
    #[error("percentage must be between 1 and 100")]
    PercentageOutOfRange,
    /// Fixed amount not positive.
    #[error("fixed amount must be greater than zero")]
    NonPositiveAmount,
    /// Minimum order amount negative.
    #[error("minimum order amount must not be negative")]
    NegativeMinimum,
    /// Usage limit not positive.
    #[error("usage limit must be greater than zero")]
    NonPositiveLimit,
    /// The window ends before it starts.
    #[error("endsAt must be after startsAt")]
    InvertedWindow,
    /// Kind string not recognised.
    #[error("unknown discount kind: {0}")]
    UnknownKind(String),
}

/// Trim, upper-case and validate a discount code.
///
/// # Examples
/// ```
/// use hera_backend::domain::normalise_discount_code;
///
/// assert_eq!(normalise_discount_code(" save10 ").as_deref(), Ok("SAVE10"));
/// assert!(normalise_discount_code("no").is_err());
/// ```
pub fn normalise_discount_code(raw: &str) -> Result<String, DiscountRuleError> {
    let code = raw.trim().to_ascii_uppercase();
    let valid_len = (3..=32).contains(&code.len());
    let valid_chars = code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid_len && valid_chars {
        Ok(code)
    } else {
        Err(DiscountRuleError::InvalidCode)
    }
}

/// Check a value against its kind.
pub fn validate_discount_value(kind: DiscountKind, value: i64) -> Result<(), DiscountRuleError> {
    match kind {
        DiscountKind::Percentage if !(1..=100).contains(&value) => {
            Err(DiscountRuleError::PercentageOutOfRange)
        }
        DiscountKind::Fixed if value <= 0 => Err(DiscountRuleError::NonPositiveAmount),
        _ => Ok(()),
    }
}

/// Why a code cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRejection {
    /// No such code.
    NotFound,
    /// Switched off by staff.
    Inactive,
    /// Window has not opened yet.
    NotStarted,
    /// Window has closed.
    Expired,
    /// Usage limit reached.
    Exhausted,
    /// Subtotal below the minimum.
    MinimumNotMet {
        /// Required subtotal.
        minimum: Money,
    },
}

impl DiscountRejection {
    /// Machine-readable reason.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "discount_not_found",
            Self::Inactive => "discount_inactive",
            Self::NotStarted => "discount_not_started",
            Self::Expired => "discount_expired",
            Self::Exhausted => "discount_exhausted",
            Self::MinimumNotMet { .. } => "discount_minimum_not_met",
        }
    }

    /// Human-readable explanation.
    pub fn message(self) -> String {
        match self {
            Self::NotFound => "discount code not found".to_owned(),
            Self::Inactive => "discount code is not active".to_owned(),
            Self::NotStarted => "discount code is not yet valid".to_owned(),
            Self::Expired => "discount code has expired".to_owned(),
            Self::Exhausted => "discount code has been fully used".to_owned(),
            Self::MinimumNotMet { minimum } => {
                format!("order subtotal must be at least {minimum} to use this code")
            }
        }
    }
}

/// Stored discount definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    /// Identifier.
    pub id: Uuid,
    /// Unique upper-case code.
    pub code: String,
    /// Optional explanation.
    pub description: Option<String>,
    /// Interpretation of `value`.
    pub kind: DiscountKind,
    /// Percentage or minor units.
    pub value: i64,
    /// Subtotal required to apply the code.
    pub min_order_amount: Money,
    /// Start of validity.
    pub starts_at: DateTime<Utc>,
    /// End of validity, exclusive.
    pub ends_at: Option<DateTime<Utc>>,
    /// Maximum number of uses.
    pub usage_limit: Option<i32>,
    /// Uses so far.
    pub times_used: i32,
    /// Switch controlled by staff.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Discount {
    /// Amount the discount takes off `subtotal`, never more than the subtotal.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        match self.kind {
            DiscountKind::Percentage => subtotal.saturating_mul(self.value) / 100,
            DiscountKind::Fixed => self.value.min(subtotal),
        }
    }

    /// Apply every eligibility rule in order and return the amount off.
    pub fn evaluate(&self, subtotal: Money, now: DateTime<Utc>) -> Result<Money, DiscountRejection> {
        if !self.is_active {
            return Err(DiscountRejection::Inactive);
        }
        if now < self.starts_at {
            return Err(DiscountRejection::NotStarted);
        }
        if self.ends_at.is_some_and(|ends| now >= ends) {
            return Err(DiscountRejection::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) {
            return Err(DiscountRejection::Exhausted);
        }
        if subtotal < self.min_order_amount {
            return Err(DiscountRejection::MinimumNotMet {
                minimum: self.min_order_amount,
            });
        }
        Ok(self.amount_for(subtotal))
    }
}

/// Input for creating or replacing a discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountDraft {
    /// Code before normalisation.
    pub code: String,
    /// Optional explanation.
    pub description: Option<String>,
    /// Interpretation of `value`.
    pub kind: DiscountKind,
    /// Percentage or minor units.
    pub value: i64,
    /// Subtotal required.
    pub min_order_amount: Money,
    /// Start of validity; defaults to now.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of validity.
    pub ends_at: Option<DateTime<Utc>>,
    /// Maximum uses.
    pub usage_limit: Option<i32>,
    /// Switch.
    pub is_active: bool,
}

/// Preview of what a code does to a subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountQuote {
    /// Applied code.
    pub code: String,
    /// Subtotal the quote is for.
    pub subtotal: Money,
    /// Amount taken off.
    pub discount_amount: Money,
    /// Subtotal after the discount.
    pub subtotal_after_discount: Money,
}
