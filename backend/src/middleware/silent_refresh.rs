//! Transparent access-token renewal.
//!
//! A request that carries `X-Refresh-Token` while its bearer token is missing
//! or no longer valid has the pair rotated before the handler runs. The
//! handler sees the fresh access token in `Authorization`, and the response
//! hands the new pair back in `X-Access-Token`, `X-Access-Expires-At` and
//! `X-Refresh-Token`. A refresh that fails leaves the request untouched so the
//! handler answers 401 as usual.

use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use actix_web::web;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{debug, warn};

use crate::domain::TokenPair;
use crate::inbound::http::auth::bearer_token;
use crate::inbound::http::state::HttpState;

/// Request header carrying the refresh token.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
/// Response header carrying the rotated access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
/// Response header carrying the rotated access token's expiry.
pub const ACCESS_EXPIRES_HEADER: &str = "x-access-expires-at";

/// Middleware rotating stale access tokens.
///
/// Reads [`HttpState`] from app data, so it must wrap services that can see
/// it.
#[derive(Clone, Copy, Default)]
pub struct SilentRefresh;

impl<S, B> Transform<S, ServiceRequest> for SilentRefresh
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SilentRefreshMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SilentRefreshMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Service wrapper produced by [`SilentRefresh`].
pub struct SilentRefreshMiddleware<S> {
    service: Rc<S>,
}

fn refresh_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(REFRESH_TOKEN_HEADER)?.to_str().ok()?.trim();
    (!raw.is_empty()).then(|| raw.to_owned())
}

async fn rotate_if_stale(req: &mut ServiceRequest) -> Option<TokenPair> {
    let refresh = refresh_token(req.headers())?;
    let state = req.app_data::<web::Data<HttpState>>()?.clone();
    if let Some(access) = bearer_token(req.headers()) {
        if state.auth.authenticate(&access).await.is_ok() {
            return None;
        }
    }
    match state.auth.refresh(&refresh).await {
        Ok(tokens) => {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", tokens.access_token)).ok()?;
            req.headers_mut().insert(AUTHORIZATION, bearer);
            debug!("access token silently refreshed");
            Some(tokens)
        }
        Err(error) => {
            debug!(%error, "silent refresh declined");
            None
        }
    }
}

fn expose(headers: &mut HeaderMap, tokens: &TokenPair) {
    let pairs = [
        (ACCESS_TOKEN_HEADER, tokens.access_token.clone()),
        (ACCESS_EXPIRES_HEADER, tokens.access_expires_at.to_rfc3339()),
        (REFRESH_TOKEN_HEADER, tokens.refresh_token.clone()),
    ];
    for (name, value) in pairs {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(error) => warn!(%error, header = name, "failed to encode refreshed token header"),
        }
    }
}

impl<S, B> Service<ServiceRequest> for SilentRefreshMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let rotated = rotate_if_stale(&mut req).await;
            let mut res = service.call(req).await?;
            if let Some(tokens) = rotated {
                expose(res.response_mut().headers_mut(), &tokens);
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};

    use crate::domain::Role;
    use crate::inbound::http::routes;
    use crate::inbound::http::test_utils::{TestApi, bearer, json_body, test_session_middleware};
    use crate::test_support::SEED_PASSWORD;

    const EMAIL: &str = "zawadi@example.co.ke";

    async fn stale_pair(api: &TestApi) -> TokenPair {
        api.backend.seed_user(EMAIL, Role::Customer).await;
        let outcome = api
            .state
            .auth
            .login(EMAIL, SEED_PASSWORD)
            .await
            .expect("login");
        api.backend.clock.advance(Duration::from_secs(16 * 60));
        outcome.tokens
    }

    macro_rules! refreshing_app {
        ($api:expr) => {
            actix_test::init_service(
                App::new().app_data($api.state.clone()).service(
                    web::scope("/api/v1")
                        .wrap(SilentRefresh)
                        .wrap(test_session_middleware())
                        .configure(routes::configure),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn stale_access_tokens_are_rotated() {
        let api = TestApi::new();
        let tokens = stale_pair(&api).await;
        let app = refreshing_app!(api);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/me")
                .insert_header(bearer(&tokens.access_token))
                .insert_header((REFRESH_TOKEN_HEADER, tokens.refresh_token.clone()))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        let fresh = headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("rotated access token")
            .to_owned();
        assert_ne!(fresh, tokens.access_token);
        assert!(headers.contains_key(ACCESS_EXPIRES_HEADER));
        assert_ne!(
            headers.get(REFRESH_TOKEN_HEADER).and_then(|v| v.to_str().ok()),
            Some(tokens.refresh_token.as_str())
        );
        assert_eq!(json_body(response).await["email"], EMAIL);

        let follow_up = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/me")
                .insert_header(bearer(&fresh))
                .to_request(),
        )
        .await;
        assert_eq!(follow_up.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn live_access_tokens_are_left_alone() {
        let api = TestApi::new();
        let (_, access) = api.signed_in(EMAIL, Role::Customer).await;
        let app = refreshing_app!(api);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/me")
                .insert_header(bearer(&access))
                .insert_header((REFRESH_TOKEN_HEADER, "unused"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(ACCESS_TOKEN_HEADER));
    }

    #[actix_web::test]
    async fn unknown_refresh_tokens_fall_through_to_401() {
        let api = TestApi::new();
        let tokens = stale_pair(&api).await;
        let app = refreshing_app!(api);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/me")
                .insert_header(bearer(&tokens.access_token))
                .insert_header((REFRESH_TOKEN_HEADER, "not-a-token"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(ACCESS_TOKEN_HEADER));
    }
}
