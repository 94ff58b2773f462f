//! Internal Diesel row structs and their domain conversions.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions from rows are fallible because
//! enum columns are stored as text; a failure names the offending value.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Category, Discount, EmailAddress, Expense, ExpenseCategory, Notification, Order,
    OrderItem, Payment, Product, ShippingDetails, StockMovement, User, UserId, Variant,
};

use super::schema::{
    auth_sessions, categories, discounts, expense_categories, expenses, notifications,
    order_items, orders, payments, product_variants, products, stock_movements, users,
};

fn parse_column<T>(column: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|err: T::Err| format!("invalid {column} {raw:?}: {err}"))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: *user.id.as_uuid(),
            email: user.email.as_str().to_owned(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.as_str().to_owned(),
            is_verified: user.is_verified,
            verification_token_hash: user.verification_token_hash.clone(),
            verification_expires_at: user.verification_expires_at,
            failed_login_attempts: user.failed_login_attempts,
            locked_until: user.locked_until,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = String;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            email: EmailAddress::parse(&row.email)
                .map_err(|err| format!("invalid email for user {}: {err}", row.id))?,
            full_name: row.full_name,
            phone: row.phone,
            password_hash: row.password_hash,
            role: parse_column("role", &row.role)?,
            is_verified: row.is_verified,
            verification_token_hash: row.verification_token_hash,
            verification_expires_at: row.verification_expires_at,
            failed_login_attempts: row.failed_login_attempts,
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = auth_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&AuthSession> for SessionRow {
    fn from(session: &AuthSession) -> Self {
        Self {
            id: session.id,
            user_id: *session.user_id.as_uuid(),
            access_token_hash: session.access_token_hash.clone(),
            refresh_token_hash: session.refresh_token_hash.clone(),
            access_expires_at: session.access_expires_at,
            refresh_expires_at: session.refresh_expires_at,
            revoked_at: session.revoked_at,
            created_at: session.created_at,
        }
    }
}

impl From<SessionRow> for AuthSession {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            access_expires_at: row.access_expires_at,
            refresh_expires_at: row.refresh_expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl From<&Category> for CategoryRow {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
        }
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ProductRow {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub base_price: i64,
    pub image_urls: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            category_id: product.category_id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            base_price: product.base_price,
            image_urls: product.image_urls.clone(),
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            base_price: row.base_price,
            image_urls: row.image_urls,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = product_variants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VariantRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub size: Option<String>,
    pub colour: Option<String>,
    pub price_override: Option<i64>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
}

/// Descriptive fields of a variant; stock only moves through the ledger.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = product_variants)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct VariantChanges {
    pub sku: String,
    pub size: Option<String>,
    pub colour: Option<String>,
    pub price_override: Option<i64>,
    pub low_stock_threshold: i32,
}

impl From<&Variant> for VariantRow {
    fn from(variant: &Variant) -> Self {
        Self {
            id: variant.id,
            product_id: variant.product_id,
            sku: variant.sku.clone(),
            size: variant.size.clone(),
            colour: variant.colour.clone(),
            price_override: variant.price_override,
            stock_quantity: variant.stock_quantity,
            low_stock_threshold: variant.low_stock_threshold,
        }
    }
}

impl From<&Variant> for VariantChanges {
    fn from(variant: &Variant) -> Self {
        Self {
            sku: variant.sku.clone(),
            size: variant.size.clone(),
            colour: variant.colour.clone(),
            price_override: variant.price_override,
            low_stock_threshold: variant.low_stock_threshold,
        }
    }
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            size: row.size,
            colour: row.colour,
            price_override: row.price_override,
            stock_quantity: row.stock_quantity,
            low_stock_threshold: row.low_stock_threshold,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = stock_movements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StockMovementRow {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub kind: String,
    pub quantity_change: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub reason: Option<String>,
    pub order_id: Option<Uuid>,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&StockMovement> for StockMovementRow {
    fn from(movement: &StockMovement) -> Self {
        Self {
            id: movement.id,
            variant_id: movement.variant_id,
            kind: movement.kind.as_str().to_owned(),
            quantity_change: movement.quantity_change,
            quantity_before: movement.quantity_before,
            quantity_after: movement.quantity_after,
            reason: movement.reason.clone(),
            order_id: movement.order_id,
            performed_by: movement.performed_by.map(|id| *id.as_uuid()),
            created_at: movement.created_at,
        }
    }
}

impl TryFrom<StockMovementRow> for StockMovement {
    type Error = String;

    fn try_from(row: StockMovementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            variant_id: row.variant_id,
            kind: parse_column("movement kind", &row.kind)?,
            quantity_change: row.quantity_change,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            reason: row.reason,
            order_id: row.order_id,
            performed_by: row.performed_by.map(UserId::from_uuid),
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Discounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = discounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DiscountRow {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub kind: String,
    pub value: i64,
    pub min_order_amount: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Discount> for DiscountRow {
    fn from(discount: &Discount) -> Self {
        Self {
            id: discount.id,
            code: discount.code.clone(),
            description: discount.description.clone(),
            kind: discount.kind.as_str().to_owned(),
            value: discount.value,
            min_order_amount: discount.min_order_amount,
            starts_at: discount.starts_at,
            ends_at: discount.ends_at,
            usage_limit: discount.usage_limit,
            times_used: discount.times_used,
            is_active: discount.is_active,
            created_at: discount.created_at,
        }
    }
}

/// Definition columns of a discount; the use counter is only bumped by
/// order placement.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = discounts)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct DiscountChanges {
    pub code: String,
    pub description: Option<String>,
    pub kind: String,
    pub value: i64,
    pub min_order_amount: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub is_active: bool,
}

impl From<&Discount> for DiscountChanges {
    fn from(discount: &Discount) -> Self {
        Self {
            code: discount.code.clone(),
            description: discount.description.clone(),
            kind: discount.kind.as_str().to_owned(),
            value: discount.value,
            min_order_amount: discount.min_order_amount,
            starts_at: discount.starts_at,
            ends_at: discount.ends_at,
            usage_limit: discount.usage_limit,
            is_active: discount.is_active,
        }
    }
}

impl TryFrom<DiscountRow> for Discount {
    type Error = String;

    fn try_from(row: DiscountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            code: row.code,
            description: row.description,
            kind: parse_column("discount kind", &row.kind)?,
            value: row.value,
            min_order_amount: row.min_order_amount,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            usage_limit: row.usage_limit,
            times_used: row.times_used,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub channel: String,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub discount_code: Option<String>,
    pub shipping_recipient: Option<String>,
    pub shipping_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        let shipping = order.shipping.as_ref();
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id.map(|id| *id.as_uuid()),
            channel: order.channel.as_str().to_owned(),
            status: order.status.as_str().to_owned(),
            payment_method: order.payment_method.as_str().to_owned(),
            payment_status: order.payment_status.as_str().to_owned(),
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            shipping_fee: order.shipping_fee,
            total: order.total,
            discount_code: order.discount_code.clone(),
            shipping_recipient: shipping.map(|s| s.recipient.clone()),
            shipping_phone: shipping.map(|s| s.phone.clone()),
            shipping_address: shipping.map(|s| s.address.clone()),
            shipping_city: shipping.map(|s| s.city.clone()),
            customer_phone: order.customer_phone.clone(),
            notes: order.notes.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let shipping = match (
            row.shipping_recipient,
            row.shipping_phone,
            row.shipping_address,
            row.shipping_city,
        ) {
            (Some(recipient), Some(phone), Some(address), Some(city)) => Some(ShippingDetails {
                recipient,
                phone,
                address,
                city,
            }),
            _ => None,
        };
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id.map(UserId::from_uuid),
            channel: parse_column("channel", &row.channel)?,
            status: parse_column("order status", &row.status)?,
            payment_method: parse_column("payment method", &row.payment_method)?,
            payment_status: parse_column("payment status", &row.payment_status)?,
            subtotal: row.subtotal,
            discount_amount: row.discount_amount,
            shipping_fee: row.shipping_fee,
            total: row.total,
            discount_code: row.discount_code,
            shipping,
            customer_phone: row.customer_phone,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

impl From<&OrderItem> for OrderItemRow {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            variant_id: item.variant_id,
            product_name: item.product_name.clone(),
            sku: item.sku.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total,
        }
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            variant_id: row.variant_id,
            product_name: row.product_name,
            sku: row.sku,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

// ---------------------------------------------------------------------------
// Payments and notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PaymentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub phone: String,
    pub amount: i64,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub status: String,
    pub result_code: Option<i32>,
    pub result_description: Option<String>,
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentRow {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            phone: payment.phone.clone(),
            amount: payment.amount,
            merchant_request_id: payment.merchant_request_id.clone(),
            checkout_request_id: payment.checkout_request_id.clone(),
            status: payment.status.as_str().to_owned(),
            result_code: payment.result_code,
            result_description: payment.result_description.clone(),
            receipt_number: payment.receipt_number.clone(),
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = String;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            phone: row.phone,
            amount: row.amount,
            merchant_request_id: row.merchant_request_id,
            checkout_request_id: row.checkout_request_id,
            status: parse_column("payment state", &row.status)?,
            result_code: row.result_code,
            result_description: row.result_description,
            receipt_number: row.receipt_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub order_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationRow {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            recipient_id: *notification.recipient_id.as_uuid(),
            kind: notification.kind.as_str().to_owned(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            order_id: notification.order_id,
            is_read: notification.is_read,
            created_at: notification.created_at,
        }
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = String;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            recipient_id: UserId::from_uuid(row.recipient_id),
            kind: parse_column("notification kind", &row.kind)?,
            title: row.title,
            message: row.message,
            order_id: row.order_id,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = expense_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ExpenseCategoryRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<&ExpenseCategory> for ExpenseCategoryRow {
    fn from(category: &ExpenseCategory) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
        }
    }
}

impl From<ExpenseCategoryRow> for ExpenseCategory {
    fn from(row: ExpenseCategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = expenses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ExpenseRow {
    pub id: Uuid,
    pub category_id: Uuid,
    pub amount: i64,
    pub description: String,
    pub incurred_on: NaiveDate,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Expense> for ExpenseRow {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id,
            category_id: expense.category_id,
            amount: expense.amount,
            description: expense.description.clone(),
            incurred_on: expense.incurred_on,
            recorded_by: *expense.recorded_by.as_uuid(),
            created_at: expense.created_at,
        }
    }
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            amount: row.amount,
            description: row.description,
            incurred_on: row.incurred_on,
            recorded_by: UserId::from_uuid(row.recorded_by),
            created_at: row.created_at,
        }
    }
}
