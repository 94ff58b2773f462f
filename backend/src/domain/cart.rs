//! Shopping cart held in the shopper's session.
//!
//! The cart stores only `(variant, quantity)` pairs. Prices and availability
//! are resolved against the live catalogue every time the cart is viewed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Money;
use super::catalogue::SellableVariant;

/// Maximum number of distinct lines in a cart.
pub const MAX_CART_LINES: usize = 50;
/// Maximum quantity on a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Cart rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {max}")]
    QuantityOutOfRange {
        /// Upper bound.
        max: u32,
    },
    /// Adding would exceed the line limit.
    #[error("cart cannot hold more than {max} lines")]
    TooManyLines {
        /// Upper bound.
        max: usize,
    },
    /// No line for that variant.
    #[error("variant is not in the cart")]
    LineNotFound,
}

/// One requested variant and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Variant requested.
    pub variant_id: Uuid,
    /// Units requested.
    pub quantity: u32,
}

/// Session cart.
///
/// # Examples
/// ```
/// use hera_backend::domain::Cart;
/// use uuid::Uuid;
///
/// let variant = Uuid::new_v4();
/// let mut cart = Cart::default();
/// cart.add(variant, 2).expect("add");
/// cart.add(variant, 3).expect("merge");
/// assert_eq!(cart.lines()[0].quantity, 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

fn check_quantity(quantity: u32) -> Result<(), CartError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::QuantityOutOfRange {
            max: MAX_LINE_QUANTITY,
        })
    }
}

impl Cart {
    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add units, merging with an existing line for the same variant.
    pub fn add(&mut self, variant_id: Uuid, quantity: u32) -> Result<(), CartError> {
        check_quantity(quantity)?;
        if let Some(line) = self.lines.iter_mut().find(|l| l.variant_id == variant_id) {
            let merged = line.quantity.saturating_add(quantity);
            check_quantity(merged)?;
            line.quantity = merged;
            return Ok(());
        }
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CartError::TooManyLines {
                max: MAX_CART_LINES,
            });
        }
        self.lines.push(CartLine {
            variant_id,
            quantity,
        });
        Ok(())
    }

    /// Replace a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, variant_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(variant_id);
        }
        check_quantity(quantity)?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.variant_id == variant_id)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    /// Drop the line for a variant.
    pub fn remove(&mut self, variant_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.variant_id != variant_id);
        if self.lines.len() == before {
            Err(CartError::LineNotFound)
        } else {
            Ok(())
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Availability of a cart line against live stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Can be bought as requested.
    Available,
    /// Variant removed or product hidden.
    Unavailable,
    /// Fewer units on hand than requested.
    InsufficientStock,
}

/// Cart line priced against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    /// Variant requested.
    pub variant_id: Uuid,
    /// Units requested.
    pub quantity: u32,
    /// Availability flag.
    pub status: LineStatus,
    /// Product name, when the variant still exists.
    pub product_name: Option<String>,
    /// Product slug, when the variant still exists.
    pub product_slug: Option<String>,
    /// Variant SKU.
    pub sku: Option<String>,
    /// Size label.
    pub size: Option<String>,
    /// Colour label.
    pub colour: Option<String>,
    /// Current unit price.
    pub unit_price: Option<Money>,
    /// `unit_price * quantity`.
    pub line_total: Money,
    /// Units on hand.
    pub available_quantity: i32,
}

/// Whole cart priced against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    /// Lines in insertion order.
    pub lines: Vec<CartLineView>,
    /// Total units across available lines.
    pub item_count: u32,
    /// Sum of available line totals.
    pub subtotal: Money,
    /// Whether every line can be bought as requested.
    pub checkout_ready: bool,
}

impl CartView {
    /// Price a cart given a lookup of live variants.
    pub fn build(cart: &Cart, lookup: impl Fn(Uuid) -> Option<SellableVariant>) -> Self {
        let lines: Vec<CartLineView> = cart
            .lines()
            .iter()
            .map(|line| price_line(*line, lookup(line.variant_id)))
            .collect();
        let available = lines.iter().filter(|l| l.status == LineStatus::Available);
        let (item_count, subtotal) = available.fold((0_u32, 0_i64), |(count, sum), line| {
            (count + line.quantity, sum + line.line_total)
        });
        let checkout_ready =
            !lines.is_empty() && lines.iter().all(|l| l.status == LineStatus::Available);
        Self {
            lines,
            item_count,
            subtotal,
            checkout_ready,
        }
    }
}

fn price_line(line: CartLine, sellable: Option<SellableVariant>) -> CartLineView {
    let Some(sellable) = sellable.filter(|s| s.product_active) else {
        return CartLineView {
            variant_id: line.variant_id,
            quantity: line.quantity,
            status: LineStatus::Unavailable,
            product_name: None,
            product_slug: None,
            sku: None,
            size: None,
            colour: None,
            unit_price: None,
            line_total: 0,
            available_quantity: 0,
        };
    };
    let unit_price = sellable.unit_price();
    let available = sellable.variant.stock_quantity;
    let status = if i64::from(available) < i64::from(line.quantity) {
        LineStatus::InsufficientStock
    } else {
        LineStatus::Available
    };
    CartLineView {
        variant_id: line.variant_id,
        quantity: line.quantity,
        status,
        product_name: Some(sellable.product_name),
        product_slug: Some(sellable.product_slug),
        sku: Some(sellable.variant.sku),
        size: sellable.variant.size,
        colour: sellable.variant.colour,
        unit_price: Some(unit_price),
        line_total: unit_price * i64::from(line.quantity),
        available_quantity: available,
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::Variant;
    use rstest::rstest;

    fn sellable(id: Uuid, stock: i32, active: bool) -> SellableVariant {
        SellableVariant {
            variant: Variant {
                id,
                product_id: Uuid::new_v4(),
                sku: "DRESS-M".to_owned(),
                size: Some("M".to_owned()),
                colour: None,
                price_override: None,
                stock_quantity: stock,
                low_stock_threshold: 1,
            },
            product_name: "Dress".to_owned(),
            product_slug: "dress".to_owned(),
            base_price: 2_500,
            product_active: active,
        }
    }

    #[rstest]
    fn merge_respects_line_cap() {
        let id = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(id, 90).expect("add");
        assert_eq!(
            cart.add(id, 10),
            Err(CartError::QuantityOutOfRange { max: 99 })
        );
        assert_eq!(cart.lines()[0].quantity, 90);
    }

    #[rstest]
    fn line_limit_is_enforced() {
        let mut cart = Cart::default();
        for _ in 0..MAX_CART_LINES {
            cart.add(Uuid::new_v4(), 1).expect("add");
        }
        assert_eq!(
            cart.add(Uuid::new_v4(), 1),
            Err(CartError::TooManyLines { max: 50 })
        );
    }

    #[rstest]
    #[case(0)]
    #[case(100)]
    fn add_rejects_bad_quantities(#[case] quantity: u32) {
        let mut cart = Cart::default();
        assert!(cart.add(Uuid::new_v4(), quantity).is_err());
    }

    #[rstest]
    fn zero_quantity_removes_line() {
        let id = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(id, 2).expect("add");
        cart.set_quantity(id, 0).expect("remove");
        assert!(cart.is_empty());
        assert_eq!(cart.remove(id), Err(CartError::LineNotFound));
    }

    #[rstest]
    fn view_flags_unavailable_and_short_lines() {
        let ok = Uuid::new_v4();
        let short = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let hidden = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(ok, 2).expect("add");
        cart.add(short, 5).expect("add");
        cart.add(gone, 1).expect("add");
        cart.add(hidden, 1).expect("add");

        let view = CartView::build(&cart, |id| match id {
            x if x == ok => Some(sellable(ok, 10, true)),
            x if x == short => Some(sellable(short, 3, true)),
            x if x == hidden => Some(sellable(hidden, 3, false)),
            _ => None,
        });

        let statuses: Vec<LineStatus> = view.lines.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            vec![
                LineStatus::Available,
                LineStatus::InsufficientStock,
                LineStatus::Unavailable,
                LineStatus::Unavailable,
            ]
        );
        assert_eq!(view.subtotal, 5_000);
        assert_eq!(view.item_count, 2);
        assert!(!view.checkout_ready);
    }
}
