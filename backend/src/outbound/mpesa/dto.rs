//! Wire types for the Daraja REST API.
//!
//! Daraja speaks PascalCase JSON and reports several numeric fields as
//! strings, so decoding is lenient about both.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::StkPushAccepted;

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponseDto {
    pub(super) access_token: String,
    #[serde(deserialize_with = "number_or_string")]
    pub(super) expires_in: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct StkPushRequestDto<'a> {
    pub(super) business_short_code: &'a str,
    pub(super) password: String,
    pub(super) timestamp: String,
    pub(super) transaction_type: &'static str,
    pub(super) amount: i64,
    pub(super) party_a: &'a str,
    pub(super) party_b: &'a str,
    pub(super) phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    pub(super) callback_url: &'a str,
    pub(super) account_reference: String,
    pub(super) transaction_desc: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StkPushResponseDto {
    #[serde(rename = "MerchantRequestID")]
    pub(super) merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub(super) checkout_request_id: String,
    #[serde(rename = "ResponseCode", deserialize_with = "number_or_string")]
    pub(super) response_code: i64,
    #[serde(rename = "ResponseDescription", default)]
    pub(super) response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub(super) customer_message: String,
}

/// Error body Daraja returns alongside 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
pub(super) struct DarajaErrorDto {
    #[serde(rename = "errorCode", default)]
    pub(super) error_code: String,
    #[serde(rename = "errorMessage", default)]
    pub(super) error_message: String,
}

impl StkPushResponseDto {
    pub(super) fn into_accepted(self) -> Result<StkPushAccepted, String> {
        if self.response_code != 0 {
            return Err(format!(
                "response code {}: {}",
                self.response_code, self.response_description
            ));
        }
        Ok(StkPushAccepted {
            merchant_request_id: self.merchant_request_id,
            checkout_request_id: self.checkout_request_id,
            customer_message: self.customer_message,
        })
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
