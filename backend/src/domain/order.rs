//! Orders, their line items and the fulfilment state machine.
//!
//! ```text
//! pending ──► paid ──► processing ──► shipped ──► delivered
//!    │          │
//!    └──────────┴──► cancelled
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Money;
use super::user::UserId;

/// Unknown enum value read from storage or a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Enum name.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),*
        }

        impl $name {
            /// Database and wire representation.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),*
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )*
                    other => Err(UnknownVariant {
                        kind: $label,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Fulfilment stage.
    pub enum OrderStatus: "order status" {
        /// Awaiting payment or confirmation.
        Pending => "pending",
        /// Payment received.
        Paid => "paid",
        /// Being packed.
        Processing => "processing",
        /// Handed to the courier.
        Shipped => "shipped",
        /// Received by the customer.
        Delivered => "delivered",
        /// Abandoned; stock has been returned.
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// How the customer pays.
    pub enum PaymentMethod: "payment method" {
        /// Safaricom M-Pesa STK push.
        Mpesa => "mpesa",
        /// Cash handed to the courier.
        CashOnDelivery => "cash_on_delivery",
        /// Cash at the till.
        Cash => "cash",
    }
}

string_enum! {
    /// Settlement state of an order.
    pub enum PaymentStatus: "payment status" {
        /// Nothing attempted yet.
        Unpaid => "unpaid",
        /// A payment request is outstanding.
        Pending => "pending",
        /// Settled.
        Paid => "paid",
        /// The last attempt failed.
        Failed => "failed",
        /// Money returned after cancellation.
        Refunded => "refunded",
    }
}

string_enum! {
    /// Where the order was placed.
    pub enum Channel: "channel" {
        /// Storefront.
        Online => "online",
        /// In-store till.
        Pos => "pos",
    }
}

impl OrderStatus {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// # Examples
    /// ```
    /// use hera_backend::domain::OrderStatus;
    ///
    /// assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Processing));
    /// assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    /// ```
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether no further transitions exist.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    /// Person receiving the parcel.
    pub recipient: String,
    /// Contact phone.
    pub phone: String,
    /// Street address.
    pub address: String,
    /// Town or city.
    pub city: String,
}

/// Flat shipping fee waived above a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Fee charged below the threshold.
    pub flat_fee: Money,
    /// Discounted subtotal at which shipping is free.
    pub free_threshold: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: 30_000,
            free_threshold: 1_000_000,
        }
    }
}

impl ShippingPolicy {
    /// Fee for a subtotal that already has the discount applied.
    pub const fn fee_for(&self, discounted_subtotal: Money) -> Money {
        if discounted_subtotal >= self.free_threshold {
            0
        } else {
            self.flat_fee
        }
    }
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of line totals.
    pub subtotal: Money,
    /// Amount taken off by a discount code.
    pub discount_amount: Money,
    /// Delivery fee.
    pub shipping_fee: Money,
    /// Amount payable.
    pub total: Money,
}

impl OrderTotals {
    /// Combine the parts into a total.
    pub const fn new(subtotal: Money, discount_amount: Money, shipping_fee: Money) -> Self {
        Self {
            subtotal,
            discount_amount,
            shipping_fee,
            total: subtotal - discount_amount + shipping_fee,
        }
    }
}

const ORDER_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Human-friendly order reference: `HC-YYYYMMDD-XXXXXX`.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use hera_backend::domain::generate_order_number;
///
/// let at = Utc.with_ymd_and_hms(2025, 4, 9, 12, 0, 0).unwrap();
/// let number = generate_order_number(at);
/// assert!(number.starts_with("HC-20250409-"));
/// assert_eq!(number.len(), 18);
/// ```
pub fn generate_order_number(at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len());
            char::from(ORDER_SUFFIX_ALPHABET.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("HC-{}-{suffix}", at.format("%Y%m%d"))
}

/// Stored order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Identifier.
    pub id: Uuid,
    /// Human-friendly reference.
    pub order_number: String,
    /// Customer account; absent for walk-in POS sales.
    pub user_id: Option<UserId>,
    /// Where it was placed.
    pub channel: Channel,
    /// Fulfilment stage.
    pub status: OrderStatus,
    /// How it is paid.
    pub payment_method: PaymentMethod,
    /// Settlement state.
    pub payment_status: PaymentStatus,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Discount taken off.
    pub discount_amount: Money,
    /// Delivery fee.
    pub shipping_fee: Money,
    /// Amount payable.
    pub total: Money,
    /// Code applied, if any.
    pub discount_code: Option<String>,
    /// Delivery address for online orders.
    pub shipping: Option<ShippingDetails>,
    /// Customer phone for POS sales.
    pub customer_phone: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a variant at the time it was sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Identifier.
    pub id: Uuid,
    /// Owning order.
    pub order_id: Uuid,
    /// Variant sold.
    pub variant_id: Uuid,
    /// Product name at sale time.
    pub product_name: String,
    /// SKU at sale time.
    pub sku: String,
    /// Unit price charged.
    pub unit_price: Money,
    /// Units sold.
    pub quantity: i32,
    /// `unit_price * quantity`.
    pub line_total: Money,
}

/// Order header with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    /// Header.
    #[serde(flatten)]
    pub order: Order,
    /// Lines.
    pub items: Vec<OrderItem>,
}

/// Staff order listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Restrict to a status.
    pub status: Option<OrderStatus>,
    /// Restrict to a channel.
    pub channel: Option<Channel>,
}

/// Everything the order repository needs to place an order atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlacement {
    /// Header to insert.
    pub order: Order,
    /// Lines to insert; each decrements stock with a `sale` movement.
    pub items: Vec<OrderItem>,
    /// Discount whose use counter is incremented.
    pub discount_id: Option<Uuid>,
    /// Operator recorded on the stock movements.
    pub performed_by: Option<UserId>,
}
