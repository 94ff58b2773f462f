//! WebSocket inbound adapter for live notifications and presence.
//!
//! Responsibilities:
//! - validate upgrade requests (origin allow-list, access token)
//! - run the per-connection session loop
//! - fan domain live events out to open connections through [`hub::LiveHub`]

use actix_web::http::header::{HeaderValue, ORIGIN};
use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use serde::Deserialize;
use tracing::{error, warn};
use url::Url;

use crate::domain::Error;
use crate::inbound::http::auth::bearer_token;

mod session;

pub mod hub;
pub mod messages;
pub mod state;

/// Upgrade query string.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Access token; browsers cannot set headers on a WebSocket handshake.
    pub token: Option<String>,
}

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    req: HttpRequest,
    query: web::Query<WsQuery>,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let mut origin_iter = req.headers().get_all(ORIGIN);
    let origin_header = origin_iter.next().ok_or_else(|| {
        error!("Missing Origin header on WebSocket upgrade");
        actix_web::error::ErrorForbidden("Origin not allowed")
    })?;
    if origin_iter.next().is_some() {
        error!("Multiple Origin headers on WebSocket upgrade");
        return Err(actix_web::error::ErrorBadRequest("Invalid Origin header"));
    }
    validate_origin(origin_header, &state.settings.allowed_origins)?;

    let token = query
        .into_inner()
        .token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| bearer_token(req.headers()))
        .ok_or_else(|| Error::unauthorized("missing access token"))?;
    let principal = state.auth.authenticate(token.trim()).await?;

    let (response, session, messages) = actix_ws::handle(&req, stream).map_err(|error| {
        error!(error = %error, "WebSocket upgrade failed");
        error
    })?;
    let state = state.get_ref().clone();
    actix_web::rt::spawn(session::run_connection(state, principal, session, messages));
    Ok(response)
}

fn validate_origin(origin_header: &HeaderValue, allowed: &[Url]) -> actix_web::Result<()> {
    let origin_value = match origin_header.to_str() {
        Ok(value) => value,
        Err(error) => {
            error!(error = %error, "Failed to parse Origin header as string");
            return Err(actix_web::error::ErrorBadRequest("Invalid Origin header"));
        }
    };

    let origin = Url::parse(origin_value).map_err(|error| {
        error!(error = %error, "Failed to parse Origin header as URL");
        actix_web::error::ErrorBadRequest("Invalid Origin header")
    })?;

    if is_allowed_origin(&origin, allowed) {
        Ok(())
    } else {
        warn!(
            origin = origin_value,
            "Rejected WS upgrade due to disallowed Origin"
        );
        Err(actix_web::error::ErrorForbidden("Origin not allowed"))
    }
}

/// Whether `origin` matches an allow-list entry on scheme, host and
/// effective port.
fn is_allowed_origin(origin: &Url, allowed: &[Url]) -> bool {
    if origin.host_str().is_none() {
        return false;
    }
    allowed
        .iter()
        .any(|entry| entry.origin() == origin.origin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use rstest::{fixture, rstest};

    #[fixture]
    fn allowed() -> Vec<Url> {
        ["http://localhost:5173", "https://hera.co.ke", "https://admin.hera.co.ke"]
            .into_iter()
            .map(|raw| Url::parse(raw).expect("static origin"))
            .collect()
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).expect("valid header value")
    }

    #[rstest]
    #[case("http://localhost:5173")]
    #[case("https://hera.co.ke")]
    #[case("https://hera.co.ke:443")]
    #[case("https://admin.hera.co.ke")]
    fn accepts_configured_origins(allowed: Vec<Url>, #[case] origin: &str) {
        assert!(validate_origin(&header(origin), &allowed).is_ok());
    }

    #[rstest]
    #[case("http://localhost:3000")]
    #[case("http://hera.co.ke")]
    #[case("https://shop.hera.co.ke")]
    #[case("https://hera.co.ke.evil.com")]
    fn rejects_disallowed_origins(allowed: Vec<Url>, #[case] origin: &str) {
        let error = validate_origin(&header(origin), &allowed).expect_err("origin rejected");
        assert_eq!(
            error.as_response_error().status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[rstest]
    fn rejects_non_utf8_origin_header(allowed: Vec<Url>) {
        let header = HeaderValue::from_bytes(&[0x80]).expect("opaque header value");
        let error = validate_origin(&header, &allowed).expect_err("origin rejected");
        assert_eq!(
            error.as_response_error().status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[rstest]
    fn rejects_unparsable_origin_header(allowed: Vec<Url>) {
        let error = validate_origin(&HeaderValue::from_static("not a url"), &allowed)
            .expect_err("origin rejected");
        assert_eq!(
            error.as_response_error().status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[rstest]
    fn empty_allow_list_rejects_everything() {
        let origin = Url::parse("http://localhost:5173").expect("url");
        assert!(!is_allowed_origin(&origin, &[]));
    }
}
