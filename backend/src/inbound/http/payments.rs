//! Daraja STK push result callback.
//!
//! ```text
//! POST /api/v1/payments/mpesa/callback?token=<secret>
//! {"Body":{"stkCallback":{"MerchantRequestID":"…","CheckoutRequestID":"ws_CO_…","ResultCode":0,…}}}
//! ```
//!
//! The `token` is the secret embedded in the callback URL registered with
//! Daraja; requests without it are refused before the body is looked at.
//! Safaricom retries callbacks that are not acknowledged, so once the body
//! parses the endpoint answers `{"ResultCode":0,"ResultDesc":"Accepted"}`;
//! repeated deliveries are absorbed by the payment service.

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::domain::StkCallback;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

const RECEIPT_ITEM: &str = "MpesaReceiptNumber";
const AMOUNT_ITEM: &str = "Amount";

/// Query string of the registered callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    token: Option<String>,
}

/// Outer Daraja callback body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackEnvelope {
    body: CallbackBody,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallbackDto,
}

#[derive(Debug, Deserialize)]
struct StkCallbackDto {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    result_code: i32,
    #[serde(rename = "ResultDesc", default)]
    result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: Option<Value>,
}

fn metadata_value<'a>(items: &'a [MetadataItem], name: &str) -> Option<&'a Value> {
    items
        .iter()
        .find(|item| item.name == name)
        .and_then(|item| item.value.as_ref())
}

/// Daraja reports whole shillings, sometimes as `1.0` or `"1"`.
fn whole_shillings(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let whole = match raw.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => raw,
    };
    whole.parse().ok()
}

impl From<CallbackEnvelope> for StkCallback {
    fn from(envelope: CallbackEnvelope) -> Self {
        let dto = envelope.body.stk_callback;
        let items = dto.metadata.map(|meta| meta.items).unwrap_or_default();
        let receipt_number = match metadata_value(&items, RECEIPT_ITEM) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        let amount = match metadata_value(&items, AMOUNT_ITEM) {
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| whole_shillings(&number.to_string())),
            Some(Value::String(text)) => whole_shillings(text),
            _ => None,
        };
        Self {
            merchant_request_id: dto.merchant_request_id,
            checkout_request_id: dto.checkout_request_id,
            result_code: dto.result_code,
            result_description: dto.result_desc,
            receipt_number,
            amount,
        }
    }
}

/// Acknowledgement Daraja expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CallbackAck {
    result_code: i32,
    result_desc: &'static str,
}

/// Apply an STK push result.
#[utoipa::path(
    post,
    path = "/api/v1/payments/mpesa/callback",
    params(("token" = String, Query, description = "Secret from the registered callback URL")),
    request_body = Object,
    responses(
        (status = 200, description = "Callback accepted", body = Object),
        (status = 400, description = "Body is not a Daraja callback, or the amount differs", body = ErrorSchema),
        (status = 401, description = "Missing or wrong callback token", body = ErrorSchema),
        (status = 404, description = "Unknown CheckoutRequestID", body = ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "mpesaCallback",
    security([])
)]
#[post("/payments/mpesa/callback")]
pub async fn mpesa_callback(
    state: web::Data<HttpState>,
    query: web::Query<CallbackQuery>,
    payload: web::Json<CallbackEnvelope>,
) -> ApiResult<HttpResponse> {
    state
        .payments
        .authorize_callback(query.token.as_deref())?;
    let callback = StkCallback::from(payload.into_inner());
    info!(
        checkout_request_id = %callback.checkout_request_id,
        result_code = callback.result_code,
        "M-Pesa callback received"
    );
    state.payments.handle_callback(callback).await?;
    Ok(HttpResponse::Ok().json(CallbackAck {
        result_code: 0,
        result_desc: "Accepted",
    }))
}
