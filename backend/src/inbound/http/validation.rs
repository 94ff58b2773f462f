//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every helper produces an `invalid_request` error whose `details` name the
//! offending field and a stable code, so clients can highlight form inputs.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pagination::{PageParams, PageRequest, PageRequestError};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::domain::Error;

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidDate,
    InvalidValue,
    InvalidPage,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidDate => "invalid_date",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::InvalidPage => "invalid_page",
        }
    }
}

/// Newtype wrapper for HTTP field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

fn field_error(field: FieldName, code: ErrorCode, message: String, value: Option<&str>) -> Error {
    let mut details = json!({ "field": field.as_str(), "code": code.as_str() });
    if let (Some(value), Some(map)) = (value, details.as_object_mut()) {
        map.insert("value".to_owned(), json!(value));
    }
    Error::invalid_request(message).with_details(details)
}

/// Distinguish an absent field from an explicit `null` in patch bodies.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query-string pagination shared by list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size, 1 to 100 (default 20).
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub(crate) fn into_request(self) -> Result<PageRequest, Error> {
        page_request(self.page, self.per_page)
    }
}

pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> Result<PageRequest, Error> {
    PageRequest::from_params(PageParams { page, per_page }).map_err(|error| {
        let field = match error {
            PageRequestError::ZeroPage => FieldName::new("page"),
            PageRequestError::PerPageOutOfRange { .. } => FieldName::new("perPage"),
        };
        field_error(field, ErrorCode::InvalidPage, error.to_string(), None)
    })
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    field_error(
        field,
        ErrorCode::MissingField,
        format!("missing required field: {}", field.as_str()),
        None,
    )
}

/// Trimmed text, rejecting blank input.
pub(crate) fn required_text(value: &str, field: FieldName) -> Result<String, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(missing_field_error(field))
    } else {
        Ok(trimmed.to_owned())
    }
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        field_error(
            field,
            ErrorCode::InvalidUuid,
            format!("{} must be a valid UUID", field.as_str()),
            Some(value),
        )
    })
}

/// Parse a `snake_case` enumeration value.
pub(crate) fn parse_choice<T: FromStr>(value: &str, field: FieldName) -> Result<T, Error> {
    value.parse::<T>().map_err(|_| {
        field_error(
            field,
            ErrorCode::InvalidValue,
            format!("{} has an unsupported value", field.as_str()),
            Some(value),
        )
    })
}

pub(crate) fn parse_optional_choice<T: FromStr>(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<T>, Error> {
    value.map(|raw| parse_choice(raw, field)).transpose()
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub(crate) fn parse_date(value: &str, field: FieldName) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        field_error(
            field,
            ErrorCode::InvalidDate,
            format!("{} must be a YYYY-MM-DD date", field.as_str()),
            Some(value),
        )
    })
}

pub(crate) fn parse_optional_date(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<NaiveDate>, Error> {
    value.map(|raw| parse_date(raw, field)).transpose()
}

/// Parse an instant given either as RFC 3339 or as a date (midnight UTC).
pub(crate) fn parse_instant(value: &str, field: FieldName) -> Result<DateTime<Utc>, Error> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    parse_date(value, field)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| {
            field_error(
                field,
                ErrorCode::InvalidDate,
                format!("{} must be an RFC 3339 timestamp or a date", field.as_str()),
                Some(value),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::domain::OrderStatus;

    const FIELD: FieldName = FieldName::new("from");

    #[rstest]
    #[case(None, None, 1, 20)]
    #[case(Some(3), Some(50), 3, 50)]
    fn builds_page_requests(
        #[case] page: Option<u32>,
        #[case] per_page: Option<u32>,
        #[case] expected_page: u32,
        #[case] expected_per_page: u32,
    ) {
        let request = page_request(page, per_page).expect("valid page");
        assert_eq!(request.page(), expected_page);
        assert_eq!(request.per_page(), expected_per_page);
    }

    #[rstest]
    #[case(Some(0), None, "page")]
    #[case(None, Some(0), "perPage")]
    #[case(None, Some(101), "perPage")]
    fn rejects_bad_pages(
        #[case] page: Option<u32>,
        #[case] per_page: Option<u32>,
        #[case] field: &str,
    ) {
        let error = page_request(page, per_page).expect_err("invalid page");
        let details = error.details().expect("details");
        assert_eq!(details["field"], field);
        assert_eq!(details["code"], "invalid_page");
    }

    #[rstest]
    fn blank_text_is_missing() {
        let error = required_text("   ", FieldName::new("name")).expect_err("blank");
        assert_eq!(error.details().expect("details")["code"], "missing_field");
        assert_eq!(
            required_text("  Kitenge  ", FieldName::new("name")).expect("text"),
            "Kitenge"
        );
    }

    #[rstest]
    fn invalid_uuid_reports_value() {
        let error = parse_uuid("nope", FieldName::new("id")).expect_err("invalid");
        let details = error.details().expect("details");
        assert_eq!(details["value"], "nope");
        assert_eq!(details["code"], "invalid_uuid");
    }

    #[rstest]
    #[case("2026-03-01T10:00:00+03:00", "2026-03-01T07:00:00+00:00")]
    #[case("2026-03-01", "2026-03-01T00:00:00+00:00")]
    fn parses_instants(#[case] raw: &str, #[case] expected: &str) {
        let parsed = parse_instant(raw, FIELD).expect("instant");
        assert_eq!(parsed.to_rfc3339(), expected);
    }

    #[rstest]
    #[case("01/03/2026")]
    #[case("yesterday")]
    fn rejects_unparseable_instants(#[case] raw: &str) {
        let error = parse_instant(raw, FIELD).expect_err("invalid");
        assert_eq!(error.details().expect("details")["code"], "invalid_date");
    }

    #[rstest]
    fn parses_choices() {
        let status: OrderStatus = parse_choice("shipped", FieldName::new("status")).expect("status");
        assert_eq!(status, OrderStatus::Shipped);
        assert!(parse_choice::<OrderStatus>("lost", FieldName::new("status")).is_err());
    }
}
