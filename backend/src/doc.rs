//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! document for the REST API. It registers:
//!
//! - **Paths**: every storefront, account, back-office and health endpoint
//! - **Schemas**: domain type wrappers from `inbound::http::schemas` that
//!   provide OpenAPI definitions without coupling domain types to utoipa
//! - **Security**: bearer access tokens
//!
//! The generated document is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use crate::inbound::http::schemas::{
    CategorySchema, ErrorCodeSchema, ErrorSchema, NotificationSchema, TokenPairSchema,
    UserProfileSchema,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "BearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some(
                        "Access token issued by POST /api/v1/auth/login or /auth/refresh.",
                    ))
                    .build(),
            ),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Hera Collection API",
        description = "Storefront, back office and point of sale for Hera Collection.",
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("BearerAuth" = [])),
    paths(
        crate::inbound::http::accounts::register,
        crate::inbound::http::accounts::verify,
        crate::inbound::http::accounts::login,
        crate::inbound::http::accounts::refresh,
        crate::inbound::http::accounts::logout,
        crate::inbound::http::accounts::change_password,
        crate::inbound::http::accounts::me,
        crate::inbound::http::accounts::update_me,
        crate::inbound::http::catalogue::list_categories,
        crate::inbound::http::catalogue::list_products,
        crate::inbound::http::catalogue::get_product,
        crate::inbound::http::cart::view_cart,
        crate::inbound::http::cart::add_item,
        crate::inbound::http::cart::set_quantity,
        crate::inbound::http::cart::remove_item,
        crate::inbound::http::cart::clear_cart,
        crate::inbound::http::orders::validate_discount,
        crate::inbound::http::orders::checkout,
        crate::inbound::http::orders::my_orders,
        crate::inbound::http::orders::track_order,
        crate::inbound::http::orders::get_order,
        crate::inbound::http::orders::cancel_order,
        crate::inbound::http::orders::retry_payment,
        crate::inbound::http::orders::payment_status,
        crate::inbound::http::payments::mpesa_callback,
        crate::inbound::http::notifications::list_notifications,
        crate::inbound::http::notifications::unread_count,
        crate::inbound::http::notifications::mark_read,
        crate::inbound::http::notifications::mark_all_read,
        crate::inbound::http::admin::catalogue::list_categories,
        crate::inbound::http::admin::catalogue::create_category,
        crate::inbound::http::admin::catalogue::update_category,
        crate::inbound::http::admin::catalogue::delete_category,
        crate::inbound::http::admin::catalogue::list_products,
        crate::inbound::http::admin::catalogue::create_product,
        crate::inbound::http::admin::catalogue::get_product,
        crate::inbound::http::admin::catalogue::update_product,
        crate::inbound::http::admin::catalogue::remove_product,
        crate::inbound::http::admin::catalogue::create_variant,
        crate::inbound::http::admin::catalogue::update_variant,
        crate::inbound::http::admin::catalogue::delete_variant,
        crate::inbound::http::admin::stock::record_movement,
        crate::inbound::http::admin::stock::list_movements,
        crate::inbound::http::admin::stock::low_stock,
        crate::inbound::http::admin::discounts::list_discounts,
        crate::inbound::http::admin::discounts::create_discount,
        crate::inbound::http::admin::discounts::get_discount,
        crate::inbound::http::admin::discounts::update_discount,
        crate::inbound::http::admin::discounts::delete_discount,
        crate::inbound::http::admin::orders::list_orders,
        crate::inbound::http::admin::orders::get_order,
        crate::inbound::http::admin::orders::update_status,
        crate::inbound::http::admin::orders::cancel_order,
        crate::inbound::http::admin::orders::pos_sale,
        crate::inbound::http::admin::users::online_users,
        crate::inbound::http::admin::users::list_users,
        crate::inbound::http::admin::users::change_role,
        crate::inbound::http::admin::users::lock_user,
        crate::inbound::http::admin::users::unlock_user,
        crate::inbound::http::admin::users::delete_user,
        crate::inbound::http::admin::expenses::list_categories,
        crate::inbound::http::admin::expenses::create_category,
        crate::inbound::http::admin::expenses::update_category,
        crate::inbound::http::admin::expenses::delete_category,
        crate::inbound::http::admin::expenses::list_expenses,
        crate::inbound::http::admin::expenses::create_expense,
        crate::inbound::http::admin::expenses::expense_summary,
        crate::inbound::http::admin::expenses::get_expense,
        crate::inbound::http::admin::expenses::update_expense,
        crate::inbound::http::admin::expenses::delete_expense,
        crate::inbound::http::admin::reports::sales_report,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        UserProfileSchema,
        TokenPairSchema,
        CategorySchema,
        NotificationSchema,
    )),
    tags(
        (name = "auth", description = "Registration, sign-in and token rotation"),
        (name = "users", description = "The signed-in account"),
        (name = "catalogue", description = "Public product browsing"),
        (name = "cart", description = "Cookie-backed guest cart"),
        (name = "orders", description = "Checkout, tracking and payment retries"),
        (name = "payments", description = "M-Pesa callbacks"),
        (name = "notifications", description = "In-app notifications"),
        (name = "admin", description = "Back office and point of sale"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI document structure.

    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    // Note: utoipa replaces :: with . in schema names
    const ERROR_SCHEMA_NAME: &str = "crate.domain.Error";
    const PROFILE_SCHEMA_NAME: &str = "crate.domain.UserProfile";

    /// Assert that an Object schema contains a field with the given name.
    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[test]
    fn openapi_error_schema_has_required_fields() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let error_schema = schemas.get(ERROR_SCHEMA_NAME).expect("Error schema");

        assert_object_schema_has_field(error_schema, "code");
        assert_object_schema_has_field(error_schema, "message");
    }

    #[test]
    fn openapi_profile_schema_uses_camel_case() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let profile = schemas.get(PROFILE_SCHEMA_NAME).expect("UserProfile schema");

        assert_object_schema_has_field(profile, "fullName");
        assert_object_schema_has_field(profile, "isVerified");
    }

    #[rstest]
    #[case("/api/v1/auth/login")]
    #[case("/api/v1/checkout")]
    #[case("/api/v1/admin/pos/sales")]
    #[case("/api/v1/admin/reports/sales")]
    #[case("/health/ready")]
    fn documents_key_endpoints(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(
            doc.paths.paths.contains_key(path),
            "missing path {path}; have {:?}",
            doc.paths.paths.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("BearerAuth"));
    }
}
