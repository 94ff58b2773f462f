//! OpenAPI schema definitions for domain types.
//!
//! Domain types remain framework-agnostic by not deriving `ToSchema`. This
//! module provides the schema definitions required for OpenAPI documentation
//! using utoipa's external schema registration. Larger aggregates (orders,
//! products, reports) are documented as free-form objects on their handlers.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
///
/// Stable machine-readable error codes returned in API error responses.
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// Authentication failed or is missing.
    #[schema(rename = "unauthorized")]
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    #[schema(rename = "forbidden")]
    Forbidden,
    /// The requested resource does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// The request clashes with current state.
    #[schema(rename = "conflict")]
    Conflict,
    /// The account is temporarily locked.
    #[schema(rename = "locked")]
    Locked,
    /// A dependency such as the payment gateway is unavailable.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
///
/// API error response payload with machine-readable code and human-readable
/// message.
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "invalid_request")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "Something went wrong")]
    message: String,
    /// Correlation identifier for tracing this error across systems.
    #[schema(example = "0b6c1f64-3f7e-4c1e-9a55-0d4f3c2b1a90")]
    trace_id: Option<String>,
    /// Supplementary error details, such as `{"field":"email","code":"invalid_email"}`.
    details: Option<serde_json::Value>,
}

/// OpenAPI schema for [`crate::domain::UserProfile`].
#[derive(ToSchema)]
#[schema(as = crate::domain::UserProfile)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct UserProfileSchema {
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    id: String,
    #[schema(example = "wanjiru@example.co.ke")]
    email: String,
    #[schema(example = "Wanjiru Kamau")]
    full_name: String,
    phone: Option<String>,
    /// `customer`, `staff` or `admin`.
    #[schema(example = "customer")]
    role: String,
    is_verified: bool,
    locked_until: Option<String>,
    created_at: String,
}

/// OpenAPI schema for [`crate::domain::TokenPair`].
#[derive(ToSchema)]
#[schema(as = crate::domain::TokenPair)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct TokenPairSchema {
    access_token: String,
    #[schema(example = "2026-03-02T06:15:00Z")]
    access_expires_at: String,
    refresh_token: String,
    #[schema(example = "2026-03-09T06:00:00Z")]
    refresh_expires_at: String,
}

/// OpenAPI schema for [`crate::domain::Category`].
#[derive(ToSchema)]
#[schema(as = crate::domain::Category)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct CategorySchema {
    id: String,
    #[schema(example = "Dresses")]
    name: String,
    #[schema(example = "dresses")]
    slug: String,
    description: Option<String>,
}

/// OpenAPI schema for [`crate::domain::Notification`].
#[derive(ToSchema)]
#[schema(as = crate::domain::Notification)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct NotificationSchema {
    id: String,
    recipient_id: String,
    /// `new_order`, `payment_received`, `payment_failed`, `low_stock` or `order_status`.
    #[schema(example = "new_order")]
    kind: String,
    title: String,
    message: String,
    order_id: Option<String>,
    is_read: bool,
    created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use utoipa::PartialSchema;

    fn schema_to_json<T: PartialSchema>() -> String {
        serde_json::to_string(&T::schema()).expect("schema serialises to JSON")
    }

    #[test]
    fn error_code_schema_has_expected_name() {
        // utoipa replaces :: with . in schema names
        assert_eq!(ErrorCodeSchema::name(), "crate.domain.ErrorCode");
    }

    #[rstest]
    #[case("invalid_request")]
    #[case("unauthorized")]
    #[case("forbidden")]
    #[case("not_found")]
    #[case("conflict")]
    #[case("locked")]
    #[case("service_unavailable")]
    #[case("internal_error")]
    fn error_code_schema_lists_every_code(#[case] code: &str) {
        assert!(
            schema_to_json::<ErrorCodeSchema>().contains(code),
            "missing {code}"
        );
    }

    #[test]
    fn error_schema_uses_camel_case_trace_id() {
        let json = schema_to_json::<ErrorSchema>();
        assert_eq!(ErrorSchema::name(), "crate.domain.Error");
        assert!(json.contains("traceId"));
        assert!(!json.contains("trace_id"));
    }

    #[test]
    fn profile_schema_matches_wire_names() {
        let json = schema_to_json::<UserProfileSchema>();
        assert_eq!(UserProfileSchema::name(), "crate.domain.UserProfile");
        assert!(json.contains("fullName"));
        assert!(json.contains("isVerified"));
    }

    #[test]
    fn token_pair_schema_matches_wire_names() {
        let json = schema_to_json::<TokenPairSchema>();
        assert!(json.contains("accessToken"));
        assert!(json.contains("refreshExpiresAt"));
    }
}
