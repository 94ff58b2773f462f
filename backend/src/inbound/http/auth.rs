//! Bearer-token extractors used by HTTP handlers.
//!
//! Handlers declare the access level they need by type: [`Authenticated`]
//! for any signed-in caller, [`Staff`] for back-office operators and
//! [`Admin`] for account management.

use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;

use crate::domain::{Error, Principal};

use super::state::HttpState;

/// Extract the raw token from an `Authorization: Bearer …` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

async fn resolve(req: HttpRequest) -> Result<Principal, Error> {
    let state = req
        .app_data::<web::Data<HttpState>>()
        .cloned()
        .ok_or_else(|| Error::internal("HTTP state is not configured"))?;
    let token = bearer_token(req.headers())
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
    state.auth.authenticate(&token).await
}

/// Any authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { resolve(req).await.map(Self) })
    }
}

/// Staff or admin caller.
#[derive(Debug, Clone, Copy)]
pub struct Staff(pub Principal);

impl FromRequest for Staff {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let principal = resolve(req).await?;
            if principal.is_staff() {
                Ok(Self(principal))
            } else {
                Err(Error::forbidden("staff access required"))
            }
        })
    }
}

/// Admin caller.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Principal);

impl FromRequest for Admin {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let principal = resolve(req).await?;
            if principal.is_admin() {
                Ok(Self(principal))
            } else {
                Err(Error::forbidden("admin access required"))
            }
        })
    }
}
