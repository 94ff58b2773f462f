//! Sales reporting over settled orders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Money;
use super::order::{Channel, OrderDetail, OrderStatus, PaymentMethod, PaymentStatus};

/// Number of products listed in [`SalesReport::top_products`].
pub const TOP_PRODUCT_LIMIT: usize = 5;

/// Orders and revenue for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown<K> {
    /// Group key.
    pub key: K,
    /// Orders in the group.
    pub order_count: u64,
    /// Summed order totals.
    pub total: Money,
}

/// Best seller by units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    /// Product name as sold.
    pub product_name: String,
    /// Units sold.
    pub units: i64,
    /// Summed line totals.
    pub revenue: Money,
}

/// Revenue, costs and best sellers for a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    /// Window start, inclusive.
    pub from: DateTime<Utc>,
    /// Window end, exclusive.
    pub to: DateTime<Utc>,
    /// Settled orders in the window.
    pub order_count: u64,
    /// Sum of subtotals.
    pub gross: Money,
    /// Sum of discounts.
    pub discounts: Money,
    /// Sum of shipping fees.
    pub shipping: Money,
    /// Sum of totals.
    pub net: Money,
    /// Split by channel.
    pub by_channel: Vec<Breakdown<Channel>>,
    /// Split by payment method.
    pub by_payment_method: Vec<Breakdown<PaymentMethod>>,
    /// Best sellers by units.
    pub top_products: Vec<TopProduct>,
    /// Expenses incurred in the window.
    pub expenses: Money,
    /// `net - expenses`.
    pub estimated_profit: Money,
}

/// Whether an order counts towards sales.
pub fn counts_as_sale(detail: &OrderDetail) -> bool {
    detail.order.status != OrderStatus::Cancelled
        && detail.order.payment_status == PaymentStatus::Paid
}

fn breakdown<K: Ord + Copy>(
    orders: &[&OrderDetail],
    key: impl Fn(&OrderDetail) -> K,
) -> Vec<Breakdown<K>> {
    let mut groups: BTreeMap<K, (u64, Money)> = BTreeMap::new();
    for detail in orders.iter().copied() {
        let entry = groups.entry(key(detail)).or_default();
        entry.0 += 1;
        entry.1 += detail.order.total;
    }
    groups
        .into_iter()
        .map(|(key, (order_count, total))| Breakdown {
            key,
            order_count,
            total,
        })
        .collect()
}

fn top_products(orders: &[&OrderDetail]) -> Vec<TopProduct> {
    let mut products: BTreeMap<&str, (i64, Money)> = BTreeMap::new();
    for item in orders.iter().flat_map(|d| d.items.iter()) {
        let entry = products.entry(item.product_name.as_str()).or_default();
        entry.0 += i64::from(item.quantity);
        entry.1 += item.line_total;
    }
    let mut ranked: Vec<TopProduct> = products
        .into_iter()
        .map(|(name, (units, revenue))| TopProduct {
            product_name: name.to_owned(),
            units,
            revenue,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    ranked.truncate(TOP_PRODUCT_LIMIT);
    ranked
}

/// Build the report from orders created in the window and the window's expenses.
///
/// Orders that are cancelled or not paid are skipped here, so callers may pass
/// every order created in `[from, to)`.
pub fn build_sales_report(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    orders: &[OrderDetail],
    expenses: Money,
) -> SalesReport {
    let sales: Vec<&OrderDetail> = orders.iter().filter(|d| counts_as_sale(d)).collect();
    let sum = |f: fn(&OrderDetail) -> Money| sales.iter().map(|d| f(*d)).sum::<Money>();
    let net = sum(|d| d.order.total);
    SalesReport {
        from,
        to,
        order_count: sales.len() as u64,
        gross: sum(|d| d.order.subtotal),
        discounts: sum(|d| d.order.discount_amount),
        shipping: sum(|d| d.order.shipping_fee),
        net,
        by_channel: breakdown(&sales, |d| d.order.channel),
        by_payment_method: breakdown(&sales, |d| d.order.payment_method),
        top_products: top_products(&sales),
        expenses,
        estimated_profit: net - expenses,
    }
}
