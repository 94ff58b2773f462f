//! Domain primitives, aggregates and services.
//!
//! Purpose: define the strongly typed entities used by the API and
//! persistence layers, and the services that orchestrate them through the
//! ports in [`ports`]. Nothing here knows about HTTP, WebSockets or SQL.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Entities: users, sessions, catalogue, stock ledger, discounts, carts,
//!   orders, payments, notifications and expenses.
//! - Services: one per back-office or storefront capability.

pub mod auth;
pub mod cart;
pub mod catalogue;
pub mod discount;
pub mod error;
pub mod expense;
pub mod notification;
pub mod order;
pub mod payment;
pub mod ports;
pub mod presence;
pub mod report;
pub mod stock;
pub mod trace_id;
pub mod user;

mod auth_service;
mod cart_service;
mod catalogue_service;
mod cleanup_service;
mod discount_service;
mod expense_service;
mod notification_service;
mod order_service;
mod payment_service;
mod report_service;
mod stock_service;
mod user_service;

pub use self::auth::{
    AuthPolicy, AuthSession, Principal, TokenPair, generate_token, hash_token,
};
pub use self::auth_service::{AuthService, LoginOutcome, Registration};
pub use self::cart::{
    Cart, CartError, CartLine, CartLineView, CartView, LineStatus, MAX_CART_LINES,
    MAX_LINE_QUANTITY,
};
pub use self::cart_service::CartService;
pub use self::catalogue::{
    Category, CatalogueValidationError, NewCategory, NewProduct, NewVariant, PricedVariant,
    Product, ProductDetail, ProductFilter, ProductRemoval, ProductUpdate, SellableVariant,
    Variant, VariantUpdate, normalise_sku, slug_candidate, slugify,
};
pub use self::catalogue_service::CatalogueService;
pub use self::cleanup_service::{CleanupReport, CleanupService};
pub use self::discount::{
    Discount, DiscountDraft, DiscountKind, DiscountQuote, DiscountRejection, DiscountRuleError,
    normalise_discount_code, validate_discount_value,
};
pub use self::discount_service::DiscountService;
pub use self::error::{Error, ErrorCode};
pub use self::expense::{
    CategoryTotal, Expense, ExpenseCategory, ExpenseDraft, ExpenseFilter, ExpenseSummary,
    ExpenseValidationError,
};
pub use self::expense_service::{ExpenseInput, ExpenseService};
pub use self::notification::{LiveEvent, Notification, NotificationDraft, NotificationKind};
pub use self::notification_service::NotificationService;
pub use self::order::{
    Channel, Order, OrderDetail, OrderFilter, OrderItem, OrderPlacement, OrderStatus,
    OrderTotals, PaymentMethod, PaymentStatus, ShippingDetails, ShippingPolicy, UnknownVariant,
    generate_order_number,
};
pub use self::order_service::{
    CheckoutReceipt, CheckoutRequest, OrderService, PosPayment, PosSale, PosSaleRequest,
};
pub use self::payment::{
    CallbackToken, InvalidPhone, MpesaPhone, Payment, PaymentState, StkCallback, StkPushAccepted,
    StkPushRequest, amount_in_shillings, stk_password, stk_timestamp,
};
pub use self::payment_service::{PaymentInitiation, PaymentService};
pub use self::presence::PresenceRegistry;
pub use self::report::{Breakdown, SalesReport, TopProduct, build_sales_report};
pub use self::report_service::ReportService;
pub use self::stock::{
    LowStockItem, MovementDraft, MovementKind, StockMovement, StockRuleError,
    crossed_low_threshold, quantity_after,
};
pub use self::stock_service::StockService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{
    EmailAddress, Role, User, UserId, UserProfile, UserValidationError, validate_password,
};
pub use self::user_service::{ProfileUpdate, UserService};

/// Amount of money in minor units (cents of KES).
pub type Money = i64;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use hera_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
