//! Reqwest-backed Daraja gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::dto::{DarajaErrorDto, StkPushRequestDto, StkPushResponseDto, TokenResponseDto};
use crate::domain::ports::{MpesaGateway, MpesaGatewayError};
use crate::domain::{
    CallbackToken, StkPushAccepted, StkPushRequest, amount_in_shillings, stk_password,
    stk_timestamp,
};

const TOKEN_PATH: &str = "oauth/v1/generate";
const STK_PUSH_PATH: &str = "mpesa/stkpush/v1/processrequest";
const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const ACCOUNT_REFERENCE_MAX: usize = 12;
const TRANSACTION_DESC_MAX: usize = 13;

/// Which Daraja deployment to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DarajaEnvironment {
    /// `sandbox.safaricom.co.ke`.
    #[default]
    Sandbox,
    /// `api.safaricom.co.ke`.
    Production,
}

impl DarajaEnvironment {
    /// Base URL of the deployment.
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke/",
            Self::Production => "https://api.safaricom.co.ke/",
        }
    }
}

/// Credentials and endpoints for one paybill/till.
#[derive(Clone)]
pub struct DarajaConfig {
    /// Root of the Daraja API; paths are joined onto it.
    pub base_url: Url,
    /// App consumer key.
    pub consumer_key: String,
    /// App consumer secret.
    pub consumer_secret: Zeroizing<String>,
    /// Business short code (paybill or till number).
    pub shortcode: String,
    /// Lipa na M-Pesa Online passkey.
    pub passkey: Zeroizing<String>,
    /// Public URL Daraja posts the result to, without the token.
    pub callback_url: Url,
    /// Secret appended to `callback_url` as the `token` query parameter.
    pub callback_token: CallbackToken,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("base_url", &self.base_url.as_str())
            .field("shortcode", &self.shortcode)
            .field("callback_url", &self.callback_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct CachedToken {
    value: Zeroizing<String>,
    refresh_at: DateTime<Utc>,
}

/// Daraja gateway that caches its OAuth token between pushes.
pub struct DarajaGateway {
    client: Client,
    config: DarajaConfig,
    callback_url: Url,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<CachedToken>>,
}

impl DarajaGateway {
    /// Build a gateway with its own reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: DarajaConfig, clock: Arc<dyn Clock>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            callback_url: registered_callback_url(&config),
            config,
            clock,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, MpesaGatewayError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| MpesaGatewayError::unavailable(format!("invalid Daraja URL: {err}")))
    }

    async fn access_token(&self) -> Result<Zeroizing<String>, MpesaGatewayError> {
        let mut cached = self.token.lock().await;
        let now = self.clock.utc();
        if let Some(token) = cached.as_ref().filter(|token| token.refresh_at > now) {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .get(self.endpoint(TOKEN_PATH)?)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(
                self.config.consumer_key.as_str(),
                Some(self.config.consumer_secret.as_str()),
            )
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let decoded: TokenResponseDto = serde_json::from_slice(&body).map_err(|err| {
            MpesaGatewayError::unavailable(format!("invalid Daraja token payload: {err}"))
        })?;
        let token = CachedToken {
            value: Zeroizing::new(decoded.access_token),
            refresh_at: refresh_deadline(now, decoded.expires_in),
        };
        debug!(refresh_at = %token.refresh_at, "fetched Daraja access token");
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl MpesaGateway for DarajaGateway {
    async fn stk_push(
        &self,
        request: &StkPushRequest,
    ) -> Result<StkPushAccepted, MpesaGatewayError> {
        let token = self.access_token().await?;
        let timestamp = stk_timestamp(self.clock.utc());
        let body = StkPushRequestDto {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount: amount_in_shillings(request.amount),
            party_a: request.phone.as_str(),
            party_b: &self.config.shortcode,
            phone_number: request.phone.as_str(),
            callback_url: self.callback_url.as_str(),
            account_reference: truncate(&request.account_reference, ACCOUNT_REFERENCE_MAX),
            transaction_desc: truncate(&request.description, TRANSACTION_DESC_MAX),
        };

        let response = self
            .client
            .post(self.endpoint(STK_PUSH_PATH)?)
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Force a fresh token on the next push.
                self.token.lock().await.take();
            }
            return Err(map_status_error(status, bytes.as_ref()));
        }

        let decoded: StkPushResponseDto = serde_json::from_slice(&bytes).map_err(|err| {
            MpesaGatewayError::unavailable(format!("invalid STK push payload: {err}"))
        })?;
        decoded.into_accepted().map_err(|message| {
            warn!(%message, "Daraja refused STK push");
            MpesaGatewayError::rejected(message)
        })
    }
}

/// The callback URL sent with each push, token included.
fn registered_callback_url(config: &DarajaConfig) -> Url {
    let mut url = config.callback_url.clone();
    url.query_pairs_mut()
        .append_pair("token", config.callback_token.expose());
    url
}

fn refresh_deadline(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    let lifetime = (expires_in_secs - TOKEN_REFRESH_MARGIN_SECS).max(0);
    now + TimeDelta::seconds(lifetime)
}

fn truncate(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

fn map_transport_error(error: reqwest::Error) -> MpesaGatewayError {
    MpesaGatewayError::unavailable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> MpesaGatewayError {
    let detail = serde_json::from_slice::<DarajaErrorDto>(body)
        .ok()
        .filter(|dto| !dto.error_message.is_empty())
        .map(|dto| format!("{} {}", dto.error_code, dto.error_message).trim().to_owned());
    let message = match detail {
        Some(detail) => format!("status {}: {detail}", status.as_u16()),
        None => format!("status {}", status.as_u16()),
    };
    MpesaGatewayError::unavailable(message)
}
