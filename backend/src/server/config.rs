//! Application settings and the HTTP server configuration object.
//!
//! [`AppSettings`] is loaded by OrthoConfig from CLI flags, `HERA_*`
//! environment variables and config files. Cookie settings are read
//! separately (see `session_config`) because their validation depends on the
//! build mode.

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::cookie::{Key, SameSite};
use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Deserializer};
use url::Url;
use zeroize::Zeroizing;

use hera_backend::domain::{AuthPolicy, CallbackToken, Money, ShippingPolicy};
use hera_backend::inbound::ws::state::WsSettings;
use hera_backend::outbound::mpesa::{DarajaConfig, DarajaEnvironment};
use hera_backend::outbound::persistence::{DbPool, PoolConfig};

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";
const DEFAULT_PRESENCE_GRACE_SECS: u64 = 5;
const DEFAULT_WS_HEARTBEAT_SECS: u64 = 5;
const DEFAULT_WS_CLIENT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;
const DEFAULT_MPESA_TIMEOUT_SECS: u64 = 30;
const MIN_CALLBACK_TOKEN_CHARS: usize = 16;

/// Errors raised while interpreting [`AppSettings`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No database URL was supplied.
    #[error("HERA_DATABASE_URL is required")]
    MissingDatabaseUrl,
    /// A value could not be parsed.
    #[error("invalid value for {name}='{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    /// Some, but not all, M-Pesa credentials were supplied.
    #[error("incomplete M-Pesa configuration: {name} is missing")]
    IncompleteMpesa { name: &'static str },
}

impl SettingsError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Environment values that look numeric (`HERA_MPESA_SHORTCODE=174379`)
/// arrive as integers; keep them as text.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Signed(number) => number.to_string(),
        Raw::Unsigned(number) => number.to_string(),
    }))
}

/// A comma-separated string or a list; comma lists in the environment are
/// split into sequences before they reach us.
fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::One(text) => text.split(',').map(str::to_owned).collect(),
        Raw::Many(list) => list,
    }))
}

fn positive_span(
    name: &'static str,
    value: Option<i64>,
    default: TimeDelta,
    unit: fn(i64) -> TimeDelta,
) -> Result<TimeDelta, SettingsError> {
    match value {
        None => Ok(default),
        Some(amount) if amount > 0 => Ok(unit(amount)),
        Some(amount) => Err(SettingsError::invalid(
            name,
            &amount.to_string(),
            "must be greater than zero",
        )),
    }
}

/// Runtime settings for the store backend.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HERA")]
pub struct AppSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub pool_max_size: Option<u32>,
    /// Skip embedded migrations at startup.
    #[ortho_config(default = false)]
    pub skip_migrations: bool,
    /// Access token lifetime in minutes.
    pub access_ttl_minutes: Option<i64>,
    /// Refresh token lifetime in days.
    pub refresh_ttl_days: Option<i64>,
    /// Failed logins before an account is locked.
    pub max_failed_logins: Option<i32>,
    /// Length of an automatic lock in minutes.
    pub lockout_minutes: Option<i64>,
    /// Flat shipping fee in cents.
    pub shipping_fee: Option<Money>,
    /// Discounted subtotal in cents at which shipping becomes free.
    pub free_shipping_threshold: Option<Money>,
    /// Origins allowed to open WebSockets, as a list or comma-separated.
    #[serde(default, deserialize_with = "string_list")]
    pub ws_allowed_origins: Option<Vec<String>>,
    /// Seconds before a disconnected user is reported offline.
    pub presence_grace_secs: Option<u64>,
    /// Seconds between server pings on a socket.
    pub ws_heartbeat_secs: Option<u64>,
    /// Seconds of client silence before a socket is closed.
    pub ws_client_timeout_secs: Option<u64>,
    /// Hours between cleanup runs.
    pub cleanup_interval_hours: Option<u64>,
    /// `sandbox` or `production`.
    pub mpesa_environment: Option<String>,
    /// Daraja consumer key. Payments are disabled when unset.
    pub mpesa_consumer_key: Option<String>,
    /// Daraja consumer secret.
    pub mpesa_consumer_secret: Option<String>,
    /// Paybill or till number.
    #[serde(default, deserialize_with = "text_or_number")]
    pub mpesa_shortcode: Option<String>,
    /// Lipa na M-Pesa Online passkey.
    pub mpesa_passkey: Option<String>,
    /// Public URL Daraja posts results to.
    pub mpesa_callback_url: Option<String>,
    /// Secret added to the callback URL; callbacks without it are refused.
    #[serde(default, deserialize_with = "text_or_number")]
    pub mpesa_callback_token: Option<String>,
}

impl AppSettings {
    /// Address to bind, defaulting to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse()
            .map_err(|err| SettingsError::invalid("HERA_BIND_ADDR", raw, err))
    }

    /// Pool configuration for the required database URL.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let url = self
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)?;
        let config = PoolConfig::new(url);
        Ok(match self.pool_max_size {
            Some(size) => config.with_max_size(size),
            None => config,
        })
    }

    /// Token lifetimes and lockout rules.
    ///
    /// Zero or negative values would lock every account on its first
    /// mistake or mint tokens that are already expired, so they are refused.
    pub fn auth_policy(&self) -> Result<AuthPolicy, SettingsError> {
        let defaults = AuthPolicy::default();
        let max_failed_logins = match self.max_failed_logins {
            None => defaults.max_failed_logins,
            Some(limit) if limit > 0 => limit,
            Some(limit) => {
                return Err(SettingsError::invalid(
                    "HERA_MAX_FAILED_LOGINS",
                    &limit.to_string(),
                    "must be greater than zero",
                ));
            }
        };
        Ok(AuthPolicy {
            access_ttl: positive_span(
                "HERA_ACCESS_TTL_MINUTES",
                self.access_ttl_minutes,
                defaults.access_ttl,
                TimeDelta::minutes,
            )?,
            refresh_ttl: positive_span(
                "HERA_REFRESH_TTL_DAYS",
                self.refresh_ttl_days,
                defaults.refresh_ttl,
                TimeDelta::days,
            )?,
            max_failed_logins,
            lockout: positive_span(
                "HERA_LOCKOUT_MINUTES",
                self.lockout_minutes,
                defaults.lockout,
                TimeDelta::minutes,
            )?,
            ..defaults
        })
    }

    /// Flat fee and free-shipping threshold, neither of which may be
    /// negative.
    pub fn shipping_policy(&self) -> Result<ShippingPolicy, SettingsError> {
        let defaults = ShippingPolicy::default();
        let non_negative = |name: &'static str, value: Option<Money>, default: Money| match value {
            None => Ok(default),
            Some(cents) if cents >= 0 => Ok(cents),
            Some(cents) => Err(SettingsError::invalid(
                name,
                &cents.to_string(),
                "must not be negative",
            )),
        };
        Ok(ShippingPolicy {
            flat_fee: non_negative("HERA_SHIPPING_FEE", self.shipping_fee, defaults.flat_fee)?,
            free_threshold: non_negative(
                "HERA_FREE_SHIPPING_THRESHOLD",
                self.free_shipping_threshold,
                defaults.free_threshold,
            )?,
        })
    }

    /// Origin allow-list, presence grace and keepalive timings for the
    /// socket layer.
    pub fn ws_settings(&self) -> Result<WsSettings, SettingsError> {
        let defaults = [DEFAULT_ALLOWED_ORIGINS.to_owned()];
        let entries = self.ws_allowed_origins.as_deref().unwrap_or(&defaults);
        let allowed_origins = entries
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                Url::parse(entry)
                    .map_err(|err| SettingsError::invalid("HERA_WS_ALLOWED_ORIGINS", entry, err))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let heartbeat = self.ws_heartbeat_secs.unwrap_or(DEFAULT_WS_HEARTBEAT_SECS);
        if heartbeat == 0 {
            return Err(SettingsError::invalid(
                "HERA_WS_HEARTBEAT_SECS",
                "0",
                "must be greater than zero",
            ));
        }
        let timeout = self
            .ws_client_timeout_secs
            .unwrap_or(DEFAULT_WS_CLIENT_TIMEOUT_SECS);
        if timeout <= heartbeat {
            return Err(SettingsError::invalid(
                "HERA_WS_CLIENT_TIMEOUT_SECS",
                &timeout.to_string(),
                format!("must exceed the heartbeat interval of {heartbeat}s"),
            ));
        }

        Ok(WsSettings {
            allowed_origins,
            presence_grace: Duration::from_secs(
                self.presence_grace_secs
                    .unwrap_or(DEFAULT_PRESENCE_GRACE_SECS),
            ),
            heartbeat_interval: Duration::from_secs(heartbeat),
            client_timeout: Duration::from_secs(timeout),
        })
    }

    /// Time between cleanup runs.
    pub fn cleanup_interval(&self) -> Duration {
        let hours = self
            .cleanup_interval_hours
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_HOURS);
        Duration::from_secs(hours * 60 * 60)
    }

    /// Daraja credentials, or `None` when payments are not configured.
    ///
    /// Setting the consumer key switches payments on; every other credential
    /// is then required.
    pub fn daraja_config(&self) -> Result<Option<DarajaConfig>, SettingsError> {
        let Some(consumer_key) = self
            .mpesa_consumer_key
            .clone()
            .filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };
        let required = |value: &Option<String>, name: &'static str| {
            value
                .clone()
                .filter(|value| !value.trim().is_empty())
                .ok_or(SettingsError::IncompleteMpesa { name })
        };
        let consumer_secret = required(&self.mpesa_consumer_secret, "HERA_MPESA_CONSUMER_SECRET")?;
        let shortcode = required(&self.mpesa_shortcode, "HERA_MPESA_SHORTCODE")?;
        let passkey = required(&self.mpesa_passkey, "HERA_MPESA_PASSKEY")?;
        let callback = required(&self.mpesa_callback_url, "HERA_MPESA_CALLBACK_URL")?;
        let callback_url = Url::parse(&callback)
            .map_err(|err| SettingsError::invalid("HERA_MPESA_CALLBACK_URL", &callback, err))?;
        let token = Zeroizing::new(required(
            &self.mpesa_callback_token,
            "HERA_MPESA_CALLBACK_TOKEN",
        )?);
        if token.trim().chars().count() < MIN_CALLBACK_TOKEN_CHARS {
            return Err(SettingsError::invalid(
                "HERA_MPESA_CALLBACK_TOKEN",
                "<redacted>",
                format!("must be at least {MIN_CALLBACK_TOKEN_CHARS} characters"),
            ));
        }

        let environment = match self.mpesa_environment.as_deref().map(str::trim) {
            None | Some("") | Some("sandbox") => DarajaEnvironment::Sandbox,
            Some("production") => DarajaEnvironment::Production,
            Some(other) => {
                return Err(SettingsError::invalid(
                    "HERA_MPESA_ENVIRONMENT",
                    other,
                    "expected sandbox or production",
                ));
            }
        };
        let base_url = Url::parse(environment.base_url())
            .map_err(|err| SettingsError::invalid("HERA_MPESA_ENVIRONMENT", "", err))?;

        Ok(Some(DarajaConfig {
            base_url,
            consumer_key,
            consumer_secret: Zeroizing::new(consumer_secret),
            shortcode,
            passkey: Zeroizing::new(passkey),
            callback_url,
            callback_token: CallbackToken::new(token.trim()),
            timeout: Duration::from_secs(DEFAULT_MPESA_TIMEOUT_SECS),
        }))
    }
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) session_ttl: Duration,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: DbPool,
    pub(crate) settings: AppSettings,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Construct a server configuration from validated parts.
    #[must_use]
    pub fn new(
        session: hera_backend::inbound::http::session_config::SessionSettings,
        bind_addr: SocketAddr,
        db_pool: DbPool,
        settings: AppSettings,
    ) -> Self {
        Self {
            key: session.key,
            cookie_secure: session.cookie_secure,
            same_site: session.same_site,
            session_ttl: session.ttl,
            bind_addr,
            db_pool,
            settings,
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}

#[cfg(test)]
mod tests {
    //! Settings parsing under controlled environments.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;
    use serde_json::json;

    const VARS: [&str; 20] = [
        "HERA_BIND_ADDR",
        "HERA_DATABASE_URL",
        "HERA_SKIP_MIGRATIONS",
        "HERA_ACCESS_TTL_MINUTES",
        "HERA_REFRESH_TTL_DAYS",
        "HERA_MAX_FAILED_LOGINS",
        "HERA_LOCKOUT_MINUTES",
        "HERA_SHIPPING_FEE",
        "HERA_FREE_SHIPPING_THRESHOLD",
        "HERA_WS_ALLOWED_ORIGINS",
        "HERA_WS_HEARTBEAT_SECS",
        "HERA_WS_CLIENT_TIMEOUT_SECS",
        "HERA_MPESA_CONSUMER_KEY",
        "HERA_MPESA_CONSUMER_SECRET",
        "HERA_MPESA_SHORTCODE",
        "HERA_MPESA_PASSKEY",
        "HERA_MPESA_CALLBACK_URL",
        "HERA_MPESA_CALLBACK_TOKEN",
        "HERA_MPESA_ENVIRONMENT",
        "HERA_PRESENCE_GRACE_SECS",
    ];

    const CALLBACK_TOKEN: &str = "b7f3e1c09a4d4e2f";

    fn load_with(overrides: &[(&str, &str)]) -> AppSettings {
        let vars = VARS
            .iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect::<Vec<_>>();
        let _guard = lock_env(vars);
        AppSettings::load_from_iter([OsString::from("hera-backend")]).expect("config should load")
    }

    fn mpesa(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut vars = vec![
            ("HERA_MPESA_CONSUMER_KEY", "key"),
            ("HERA_MPESA_CONSUMER_SECRET", "secret"),
            ("HERA_MPESA_SHORTCODE", "174379"),
            ("HERA_MPESA_PASSKEY", "passkey"),
            (
                "HERA_MPESA_CALLBACK_URL",
                "https://api.hera.co.ke/api/v1/payments/mpesa/callback",
            ),
            ("HERA_MPESA_CALLBACK_TOKEN", CALLBACK_TOKEN),
        ];
        for &(name, value) in extra {
            vars.retain(|(key, _)| *key != name);
            vars.push((name, value));
        }
        vars
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let settings = load_with(&[]);

        assert_eq!(
            settings.bind_addr().expect("default bind"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("addr")
        );
        assert!(!settings.skip_migrations);
        assert_eq!(settings.auth_policy(), Ok(AuthPolicy::default()));
        assert_eq!(settings.shipping_policy(), Ok(ShippingPolicy::default()));
        assert_eq!(settings.cleanup_interval(), Duration::from_secs(86_400));
        assert_eq!(
            settings.pool_config().expect_err("url required"),
            SettingsError::MissingDatabaseUrl
        );
        assert!(settings.daraja_config().expect("no mpesa").is_none());
        let ws = settings.ws_settings().expect("default origins");
        assert_eq!(ws.allowed_origins.len(), 1);
        assert_eq!(ws.presence_grace, Duration::from_secs(5));
        assert_eq!(ws.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(ws.client_timeout, Duration::from_secs(10));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let settings = load_with(&[
            ("HERA_BIND_ADDR", "127.0.0.1:9000"),
            ("HERA_DATABASE_URL", "postgres://hera@localhost/hera"),
            ("HERA_SKIP_MIGRATIONS", "true"),
            ("HERA_ACCESS_TTL_MINUTES", "5"),
            ("HERA_SHIPPING_FEE", "25000"),
            (
                "HERA_WS_ALLOWED_ORIGINS",
                "https://hera.co.ke, https://admin.hera.co.ke",
            ),
            ("HERA_WS_HEARTBEAT_SECS", "15"),
            ("HERA_WS_CLIENT_TIMEOUT_SECS", "45"),
        ]);

        assert_eq!(settings.bind_addr().expect("bind").port(), 9000);
        assert!(settings.skip_migrations);
        assert_eq!(
            settings.pool_config().expect("pool").database_url(),
            "postgres://hera@localhost/hera"
        );
        assert_eq!(
            settings.auth_policy().expect("auth").access_ttl,
            TimeDelta::minutes(5)
        );
        assert_eq!(settings.shipping_policy().expect("shipping").flat_fee, 25_000);
        let ws = settings.ws_settings().expect("socket settings");
        assert_eq!(ws.allowed_origins.len(), 2);
        assert_eq!(ws.allowed_origins[1].host_str(), Some("admin.hera.co.ke"));
        assert_eq!(ws.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(ws.client_timeout, Duration::from_secs(45));
    }

    #[rstest]
    fn single_origin_is_accepted_from_the_environment() {
        let settings = load_with(&[("HERA_WS_ALLOWED_ORIGINS", "https://hera.co.ke")]);

        let origins = settings.ws_settings().expect("origins").allowed_origins;
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].host_str(), Some("hera.co.ke"));
    }

    #[rstest]
    #[case(json!("https://hera.co.ke,https://admin.hera.co.ke"))]
    #[case(json!(["https://hera.co.ke", " https://admin.hera.co.ke "]))]
    fn origins_deserialise_from_text_or_list(#[case] origins: serde_json::Value) {
        let settings: AppSettings = serde_json::from_value(json!({
            "skip_migrations": false,
            "ws_allowed_origins": origins,
        }))
        .expect("settings");

        let parsed = settings.ws_settings().expect("origins").allowed_origins;
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].host_str(), Some("admin.hera.co.ke"));
    }

    #[rstest]
    #[case(json!(174379), "174379")]
    #[case(json!("600000"), "600000")]
    fn shortcodes_deserialise_from_numbers_and_text(
        #[case] raw: serde_json::Value,
        #[case] expected: &str,
    ) {
        let settings: AppSettings = serde_json::from_value(json!({
            "skip_migrations": false,
            "mpesa_shortcode": raw,
        }))
        .expect("settings");

        assert_eq!(settings.mpesa_shortcode.as_deref(), Some(expected));
    }

    #[rstest]
    fn partial_mpesa_credentials_are_rejected() {
        let settings = load_with(&[
            ("HERA_MPESA_CONSUMER_KEY", "key"),
            ("HERA_MPESA_CONSUMER_SECRET", "secret"),
        ]);

        assert_eq!(
            settings.daraja_config().expect_err("incomplete"),
            SettingsError::IncompleteMpesa {
                name: "HERA_MPESA_SHORTCODE"
            }
        );
    }

    #[rstest]
    fn complete_mpesa_credentials_build_a_gateway_config() {
        let settings = load_with(&mpesa(&[("HERA_MPESA_ENVIRONMENT", "production")]));

        let config = settings
            .daraja_config()
            .expect("valid")
            .expect("configured");
        assert_eq!(config.shortcode, "174379");
        assert_eq!(config.base_url.host_str(), Some("api.safaricom.co.ke"));
        assert!(config.callback_token.matches(CALLBACK_TOKEN));
        assert_eq!(config.callback_url.query(), None);
    }

    #[rstest]
    fn payments_require_a_callback_token() {
        let mut vars = mpesa(&[]);
        vars.retain(|(name, _)| *name != "HERA_MPESA_CALLBACK_TOKEN");
        let settings = load_with(&vars);

        assert_eq!(
            settings.daraja_config().expect_err("token required"),
            SettingsError::IncompleteMpesa {
                name: "HERA_MPESA_CALLBACK_TOKEN"
            }
        );
    }

    #[rstest]
    fn guessable_callback_tokens_are_rejected() {
        let settings = load_with(&mpesa(&[("HERA_MPESA_CALLBACK_TOKEN", "1234")]));

        let error = settings.daraja_config().expect_err("short token");
        assert!(matches!(
            error,
            SettingsError::Invalid {
                name: "HERA_MPESA_CALLBACK_TOKEN",
                ..
            }
        ));
        assert!(!error.to_string().contains("1234"));
    }

    #[rstest]
    #[case("HERA_MAX_FAILED_LOGINS", "0")]
    #[case("HERA_MAX_FAILED_LOGINS", "-3")]
    #[case("HERA_ACCESS_TTL_MINUTES", "0")]
    #[case("HERA_REFRESH_TTL_DAYS", "-1")]
    #[case("HERA_LOCKOUT_MINUTES", "0")]
    fn non_positive_auth_settings_are_rejected(#[case] name: &'static str, #[case] value: &str) {
        let settings = load_with(&[(name, value)]);

        let error = settings.auth_policy().expect_err("refused");
        assert_eq!(
            error,
            SettingsError::Invalid {
                name,
                value: value.to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
        );
    }

    #[rstest]
    #[case("HERA_SHIPPING_FEE", "-100")]
    #[case("HERA_FREE_SHIPPING_THRESHOLD", "-1")]
    fn negative_shipping_amounts_are_rejected(#[case] name: &'static str, #[case] value: &str) {
        let settings = load_with(&[(name, value)]);

        let error = settings.shipping_policy().expect_err("refused");
        assert!(matches!(error, SettingsError::Invalid { name: reported, .. } if reported == name));
    }

    #[rstest]
    fn free_shipping_for_everything_is_allowed() {
        let settings = load_with(&[
            ("HERA_SHIPPING_FEE", "0"),
            ("HERA_FREE_SHIPPING_THRESHOLD", "0"),
        ]);

        let policy = settings.shipping_policy().expect("zero is valid");
        assert_eq!((policy.flat_fee, policy.free_threshold), (0, 0));
    }

    #[rstest]
    #[case(&[("HERA_WS_HEARTBEAT_SECS", "0")], "HERA_WS_HEARTBEAT_SECS")]
    #[case(&[("HERA_WS_CLIENT_TIMEOUT_SECS", "5")], "HERA_WS_CLIENT_TIMEOUT_SECS")]
    #[case(
        &[("HERA_WS_HEARTBEAT_SECS", "30"), ("HERA_WS_CLIENT_TIMEOUT_SECS", "20")],
        "HERA_WS_CLIENT_TIMEOUT_SECS"
    )]
    fn socket_timings_must_leave_room_for_a_ping(
        #[case] vars: &[(&str, &str)],
        #[case] reported: &str,
    ) {
        let settings = load_with(vars);

        let error = settings.ws_settings().expect_err("refused");
        assert!(matches!(error, SettingsError::Invalid { name, .. } if name == reported));
    }

    #[rstest]
    #[case("HERA_BIND_ADDR", "not-an-address")]
    #[case("HERA_WS_ALLOWED_ORIGINS", "localhost without scheme")]
    fn malformed_values_are_reported(#[case] name: &str, #[case] value: &str) {
        let settings = load_with(&[(name, value)]);

        let error = match name {
            "HERA_BIND_ADDR" => settings.bind_addr().map(|_| ()),
            _ => settings.ws_settings().map(|_| ()),
        }
        .expect_err("malformed value");
        assert!(matches!(error, SettingsError::Invalid { .. }));
    }
}
