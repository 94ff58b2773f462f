//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Customer, staff and admin accounts.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        full_name -> Varchar,
        phone -> Nullable<Varchar>,
        password_hash -> Text,
        role -> Varchar,
        is_verified -> Bool,
        verification_token_hash -> Nullable<Varchar>,
        verification_expires_at -> Nullable<Timestamptz>,
        failed_login_attempts -> Int4,
        locked_until -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Login sessions keyed by token fingerprints.
    auth_sessions (id) {
        id -> Uuid,
        user_id -> Uuid,
        access_token_hash -> Varchar,
        refresh_token_hash -> Varchar,
        access_expires_at -> Timestamptz,
        refresh_expires_at -> Timestamptz,
        revoked_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    categories (id) {
        id -> Uuid,
        name -> Varchar,
        slug -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        category_id -> Nullable<Uuid>,
        name -> Varchar,
        slug -> Varchar,
        description -> Text,
        base_price -> Int8,
        image_urls -> Array<Text>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Sellable size and colour combinations with their stock level.
    product_variants (id) {
        id -> Uuid,
        product_id -> Uuid,
        sku -> Varchar,
        size -> Nullable<Varchar>,
        colour -> Nullable<Varchar>,
        price_override -> Nullable<Int8>,
        stock_quantity -> Int4,
        low_stock_threshold -> Int4,
    }
}

diesel::table! {
    discounts (id) {
        id -> Uuid,
        code -> Varchar,
        description -> Nullable<Text>,
        kind -> Varchar,
        value -> Int8,
        min_order_amount -> Int8,
        starts_at -> Timestamptz,
        ends_at -> Nullable<Timestamptz>,
        usage_limit -> Nullable<Int4>,
        times_used -> Int4,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        order_number -> Varchar,
        user_id -> Nullable<Uuid>,
        channel -> Varchar,
        status -> Varchar,
        payment_method -> Varchar,
        payment_status -> Varchar,
        subtotal -> Int8,
        discount_amount -> Int8,
        shipping_fee -> Int8,
        total -> Int8,
        discount_code -> Nullable<Varchar>,
        shipping_recipient -> Nullable<Varchar>,
        shipping_phone -> Nullable<Varchar>,
        shipping_address -> Nullable<Text>,
        shipping_city -> Nullable<Varchar>,
        customer_phone -> Nullable<Varchar>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Price snapshots of the variants sold on an order.
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        variant_id -> Uuid,
        product_name -> Varchar,
        sku -> Varchar,
        unit_price -> Int8,
        quantity -> Int4,
        line_total -> Int8,
    }
}

diesel::table! {
    /// Append-only stock ledger.
    stock_movements (id) {
        id -> Uuid,
        variant_id -> Uuid,
        kind -> Varchar,
        quantity_change -> Int4,
        quantity_before -> Int4,
        quantity_after -> Int4,
        reason -> Nullable<Text>,
        order_id -> Nullable<Uuid>,
        performed_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// M-Pesa STK push attempts.
    payments (id) {
        id -> Uuid,
        order_id -> Uuid,
        phone -> Varchar,
        amount -> Int8,
        merchant_request_id -> Varchar,
        checkout_request_id -> Varchar,
        status -> Varchar,
        result_code -> Nullable<Int4>,
        result_description -> Nullable<Text>,
        receipt_number -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        recipient_id -> Uuid,
        kind -> Varchar,
        title -> Varchar,
        message -> Text,
        order_id -> Nullable<Uuid>,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    expense_categories (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    expenses (id) {
        id -> Uuid,
        category_id -> Uuid,
        amount -> Int8,
        description -> Text,
        incurred_on -> Date,
        recorded_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(auth_sessions -> users (user_id));
diesel::joinable!(products -> categories (category_id));
diesel::joinable!(product_variants -> products (product_id));
diesel::joinable!(orders -> users (user_id));
diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_items -> product_variants (variant_id));
diesel::joinable!(stock_movements -> product_variants (variant_id));
diesel::joinable!(payments -> orders (order_id));
diesel::joinable!(notifications -> users (recipient_id));
diesel::joinable!(expenses -> expense_categories (category_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    auth_sessions,
    categories,
    products,
    product_variants,
    discounts,
    orders,
    order_items,
    stock_movements,
    payments,
    notifications,
    expense_categories,
    expenses,
);
