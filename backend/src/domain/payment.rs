//! M-Pesa payment records and the rules shared by the gateway adapter.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::Money;
use super::order::UnknownVariant;

/// Phone number in the `2547XXXXXXXX`/`2541XXXXXXXX` form Daraja expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MpesaPhone(String);

/// The phone number cannot be billed through M-Pesa.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("phone must be a Kenyan mobile number such as 0712345678")]
pub struct InvalidPhone;

impl MpesaPhone {
    /// Normalise common Kenyan formats.
    ///
    /// # Examples
    /// ```
    /// use hera_backend::domain::MpesaPhone;
    ///
    /// for raw in ["0712345678", "+254712345678", "254712345678", "712345678", "0112 345 678"] {
    ///     assert!(MpesaPhone::parse(raw).is_ok(), "{raw}");
    /// }
    /// assert_eq!(MpesaPhone::parse("0712345678").unwrap().as_str(), "254712345678");
    /// assert!(MpesaPhone::parse("0212345678").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, InvalidPhone> {
        let digits: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = digits.strip_prefix('+').unwrap_or(&digits);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidPhone);
        }
        let local = if let Some(rest) = digits.strip_prefix("254") {
            rest
        } else if let Some(rest) = digits.strip_prefix('0') {
            rest
        } else {
            digits
        };
        let valid = local.len() == 9 && (local.starts_with('7') || local.starts_with('1'));
        if valid {
            Ok(Self(format!("254{local}")))
        } else {
            Err(InvalidPhone)
        }
    }

    /// Normalised digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MpesaPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement state of one payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Waiting for the customer to confirm on the handset.
    Pending,
    /// Money received.
    Succeeded,
    /// Declined, cancelled or timed out.
    Failed,
}

impl PaymentState {
    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant {
                kind: "payment state",
                value: other.to_owned(),
            }),
        }
    }
}

/// One STK push request and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Identifier.
    pub id: Uuid,
    /// Order being paid.
    pub order_id: Uuid,
    /// Phone billed.
    pub phone: String,
    /// Amount requested, in minor units.
    pub amount: Money,
    /// Daraja merchant request id. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub merchant_request_id: String,
    /// Daraja checkout request id, unique. Never sent to clients, since it
    /// is the only key a callback is matched on.
    #[serde(skip_serializing, default)]
    pub checkout_request_id: String,
    /// Outcome.
    pub status: PaymentState,
    /// Daraja result code.
    pub result_code: Option<i32>,
    /// Daraja result description.
    pub result_description: Option<String>,
    /// M-Pesa receipt number on success.
    pub receipt_number: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for an STK push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushRequest {
    /// Phone to bill.
    pub phone: MpesaPhone,
    /// Amount in minor units.
    pub amount: Money,
    /// Reference shown to the customer (the order number).
    pub account_reference: String,
    /// Short description.
    pub description: String,
}

/// Daraja acknowledgement of an STK push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushAccepted {
    /// Merchant request id.
    pub merchant_request_id: String,
    /// Checkout request id used to match the callback.
    pub checkout_request_id: String,
    /// Message suitable for display.
    pub customer_message: String,
}

/// Parsed `Body.stkCallback` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkCallback {
    /// Merchant request id.
    pub merchant_request_id: String,
    /// Checkout request id.
    pub checkout_request_id: String,
    /// Zero on success.
    pub result_code: i32,
    /// Human-readable outcome.
    pub result_description: String,
    /// Receipt number on success.
    pub receipt_number: Option<String>,
    /// `Amount` metadata item in whole shillings, present on success.
    pub amount: Option<i64>,
}

impl StkCallback {
    /// Whether the customer completed the payment.
    pub const fn succeeded(&self) -> bool {
        self.result_code == 0
    }
}

/// Shared secret carried in the callback URL registered with Daraja.
///
/// Callbacks are unauthenticated HTTP posts, so only requests presenting
/// this value are applied.
#[derive(Clone)]
pub struct CallbackToken(Zeroizing<String>);

impl CallbackToken {
    /// Wrap a configured secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Raw value, for building the callback URL.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Compare digests so the check does not short-circuit on a prefix.
    pub fn matches(&self, presented: &str) -> bool {
        Sha256::digest(self.0.as_bytes()) == Sha256::digest(presented.as_bytes())
    }
}

impl std::fmt::Debug for CallbackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallbackToken(..)")
    }
}

const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Daraja timestamp (`YYYYMMDDHHmmss`) in East Africa Time.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use hera_backend::domain::stk_timestamp;
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 31, 22, 15, 5).unwrap();
/// assert_eq!(stk_timestamp(at), "20250201011505");
/// ```
pub fn stk_timestamp(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => at.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => at.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// Daraja password: `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Whole shillings to request, rounding any cents up.
pub const fn amount_in_shillings(amount: Money) -> i64 {
    (amount + 99) / 100
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0712345678", Some("254712345678"))]
    #[case("0112345678", Some("254112345678"))]
    #[case("+254 712 345 678", Some("254712345678"))]
    #[case("254712345678", Some("254712345678"))]
    #[case("712345678", Some("254712345678"))]
    #[case("071234567", None)]
    #[case("0812345678", None)]
    #[case("07123456789", None)]
    #[case("07123x5678", None)]
    fn phone_normalisation(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            MpesaPhone::parse(raw).ok().as_ref().map(MpesaPhone::as_str),
            expected
        );
    }

    #[rstest]
    #[case(100, 1)]
    #[case(101, 2)]
    #[case(250_050, 2_501)]
    #[case(0, 0)]
    fn amounts_round_up(#[case] cents: Money, #[case] shillings: i64) {
        assert_eq!(amount_in_shillings(cents), shillings);
    }

    #[rstest]
    fn password_matches_daraja_sandbox_recipe() {
        let password = stk_password("174379", "passkey", "20250101000000");
        let decoded = STANDARD.decode(password).expect("base64");
        assert_eq!(decoded, b"174379passkey20250101000000");
    }

    #[rstest]
    #[case("s3cret-callback", true)]
    #[case("s3cret", false)]
    #[case("", false)]
    fn callback_tokens_match_only_the_whole_secret(#[case] presented: &str, #[case] ok: bool) {
        let token = CallbackToken::new("s3cret-callback");
        assert_eq!(token.matches(presented), ok);
        assert_eq!(format!("{token:?}"), "CallbackToken(..)");
    }

    #[rstest]
    fn daraja_identifiers_stay_out_of_client_json() {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        let payment = Payment {
            id: Uuid::nil(),
            order_id: Uuid::nil(),
            phone: "254712345678".into(),
            amount: 480_000,
            merchant_request_id: "29115-34620561-1".into(),
            checkout_request_id: "ws_CO_191220191020363925".into(),
            status: PaymentState::Pending,
            result_code: None,
            result_description: None,
            receipt_number: None,
            created_at: at,
            updated_at: at,
        };

        let json = serde_json::to_value(&payment).expect("serialise");
        assert!(json.get("checkoutRequestId").is_none());
        assert!(json.get("merchantRequestId").is_none());
        assert_eq!(json["amount"], 480_000);
    }
}
