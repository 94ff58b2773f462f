//! Catalogue entities: categories, products and their stock-keeping variants.
//!
//! Prices are integer minor units of KES. A variant sells at its override
//! price when one is set, and at the product's base price otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Money;

/// Validation errors raised by catalogue constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogueValidationError {
    /// A required name was blank.
    #[error("{field} must not be empty")]
    Blank {
        /// Offending field.
        field: &'static str,
    },
    /// A price was negative.
    #[error("{field} must not be negative")]
    NegativePrice {
        /// Offending field.
        field: &'static str,
    },
    /// The SKU contained unsupported characters or had a bad length.
    #[error("sku must be 2-64 characters of A-Z, 0-9, '-' or '_'")]
    InvalidSku,
    /// A stock figure was negative.
    #[error("{field} must not be negative")]
    NegativeQuantity {
        /// Offending field.
        field: &'static str,
    },
    /// The name produced an empty slug.
    #[error("name must contain at least one letter or digit")]
    EmptySlug,
}

/// Derive a URL slug from a display name.
///
/// # Examples
/// ```
/// use hera_backend::domain::slugify;
///
/// assert_eq!(slugify("  Ankara Maxi Dress (Blue) "), "ankara-maxi-dress-blue");
/// assert_eq!(slugify("!!!"), "");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Candidate slug for the `attempt`th collision (`1` is the bare slug).
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_owned()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Trim, upper-case and validate a SKU.
pub fn normalise_sku(raw: &str) -> Result<String, CatalogueValidationError> {
    let sku = raw.trim().to_ascii_uppercase();
    let valid_len = (2..=64).contains(&sku.len());
    let valid_chars = sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid_len && valid_chars {
        Ok(sku)
    } else {
        Err(CatalogueValidationError::InvalidSku)
    }
}

/// Trim a required text field.
pub fn require_text(field: &'static str, raw: &str) -> Result<String, CatalogueValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(CatalogueValidationError::Blank { field })
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Reject negative prices.
pub fn require_price(field: &'static str, value: Money) -> Result<Money, CatalogueValidationError> {
    if value < 0 {
        Err(CatalogueValidationError::NegativePrice { field })
    } else {
        Ok(value)
    }
}

/// Reject negative quantities.
pub fn require_quantity(field: &'static str, value: i32) -> Result<i32, CatalogueValidationError> {
    if value < 0 {
        Err(CatalogueValidationError::NegativeQuantity { field })
    } else {
        Ok(value)
    }
}

/// Product grouping shown in the storefront navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Unique URL slug.
    pub slug: String,
    /// Optional blurb.
    pub description: Option<String>,
}

/// Sellable item; stock lives on its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Identifier.
    pub id: Uuid,
    /// Owning category.
    pub category_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Unique URL slug.
    pub slug: String,
    /// Long description.
    pub description: String,
    /// Default price in minor units.
    pub base_price: Money,
    /// Image locations, managed outside this service.
    pub image_urls: Vec<String>,
    /// Hidden from the storefront when false.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Size/colour combination with its own SKU and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Identifier.
    pub id: Uuid,
    /// Parent product.
    pub product_id: Uuid,
    /// Unique upper-case SKU.
    pub sku: String,
    /// Optional size label.
    pub size: Option<String>,
    /// Optional colour label.
    pub colour: Option<String>,
    /// Price that replaces the product base price.
    pub price_override: Option<Money>,
    /// Units on hand, never negative.
    pub stock_quantity: i32,
    /// Level at or below which the variant counts as low stock.
    pub low_stock_threshold: i32,
}

impl Variant {
    /// Selling price given the parent's base price.
    pub fn effective_price(&self, base_price: Money) -> Money {
        self.price_override.unwrap_or(base_price)
    }

    /// Whether stock is at or below the threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

/// Variant as presented to shoppers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedVariant {
    /// Stored variant.
    #[serde(flatten)]
    pub variant: Variant,
    /// Price the shopper pays.
    pub effective_price: Money,
    /// Whether any units remain.
    pub in_stock: bool,
}

/// Product together with its priced variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    /// Stored product.
    #[serde(flatten)]
    pub product: Product,
    /// Variants with effective prices.
    pub variants: Vec<PricedVariant>,
}

impl ProductDetail {
    /// Attach priced variants to a product.
    pub fn new(product: Product, variants: Vec<Variant>) -> Self {
        let variants = variants
            .into_iter()
            .map(|variant| PricedVariant {
                effective_price: variant.effective_price(product.base_price),
                in_stock: variant.stock_quantity > 0,
                variant,
            })
            .collect();
        Self { product, variants }
    }
}

/// Variant joined with the product fields needed to sell it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellableVariant {
    /// Stored variant.
    pub variant: Variant,
    /// Parent product name.
    pub product_name: String,
    /// Parent product slug.
    pub product_slug: String,
    /// Parent base price.
    pub base_price: Money,
    /// Whether the parent is visible.
    pub product_active: bool,
}

impl SellableVariant {
    /// Price charged for one unit.
    pub fn unit_price(&self) -> Money {
        self.variant.effective_price(self.base_price)
    }
}

/// Storefront product filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Restrict to a category slug.
    pub category_slug: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    /// Inclusive lower price bound.
    pub min_price: Option<Money>,
    /// Inclusive upper price bound.
    pub max_price: Option<Money>,
    /// Include hidden products (back office only).
    pub include_inactive: bool,
}

/// Input for a new category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Optional blurb.
    pub description: Option<String>,
}

/// Input for a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Owning category.
    pub category_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Default price.
    pub base_price: Money,
    /// Image locations.
    pub image_urls: Vec<String>,
    /// Initial visibility.
    pub is_active: bool,
}

/// Partial product update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    /// Owning category; `Some(None)` detaches it.
    pub category_id: Option<Option<Uuid>>,
    /// Display name; changing it re-derives the slug.
    pub name: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Default price.
    pub base_price: Option<Money>,
    /// Image locations.
    pub image_urls: Option<Vec<String>>,
    /// Visibility.
    pub is_active: Option<bool>,
}

/// Input for a new variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    /// SKU before normalisation.
    pub sku: String,
    /// Size label.
    pub size: Option<String>,
    /// Colour label.
    pub colour: Option<String>,
    /// Override price.
    pub price_override: Option<Money>,
    /// Units received with the variant.
    pub initial_stock: i32,
    /// Low stock threshold.
    pub low_stock_threshold: i32,
}

/// Partial variant update. Stock changes go through stock movements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantUpdate {
    /// SKU before normalisation.
    pub sku: Option<String>,
    /// Size label; `Some(None)` clears it.
    pub size: Option<Option<String>>,
    /// Colour label; `Some(None)` clears it.
    pub colour: Option<Option<String>>,
    /// Override price; `Some(None)` reverts to the base price.
    pub price_override: Option<Option<Money>>,
    /// Low stock threshold.
    pub low_stock_threshold: Option<i32>,
}

/// Outcome of a product delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    /// The product and its variants were removed.
    Deleted,
    /// Orders reference the product, so it was hidden instead.
    Deactivated,
}
