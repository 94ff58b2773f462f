//! Cookie-session access for the guest cart.
//!
//! The cart lives in the encrypted session cookie so shoppers can fill it
//! before signing in. Handlers load it through [`CartSession`], mutate it
//! via the cart service and write it back with [`CartSession::store`].

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Cart, Error};

pub(crate) const CART_KEY: &str = "cart";

/// Session wrapper exposing the cart stored in the cookie.
#[derive(Clone)]
pub struct CartSession(Session);

impl CartSession {
    /// Wrap an Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Current cart; an unreadable cookie yields an empty cart.
    pub fn cart(&self) -> Cart {
        match self.0.get::<Cart>(CART_KEY) {
            Ok(Some(cart)) => cart,
            Ok(None) => Cart::default(),
            Err(error) => {
                warn!(error = %error, "discarding unreadable cart cookie");
                self.0.remove(CART_KEY);
                Cart::default()
            }
        }
    }

    /// Persist `cart`, dropping the key entirely once it is empty.
    pub fn store(&self, cart: &Cart) -> Result<(), Error> {
        if cart.is_empty() {
            self.0.remove(CART_KEY);
            return Ok(());
        }
        self.0
            .insert(CART_KEY, cart)
            .map_err(|error| Error::internal(format!("failed to persist cart: {error}")))
    }
}

impl FromRequest for CartSession {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(CartSession::new) })
    }
}
