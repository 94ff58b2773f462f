//! Cart operations priced against the live catalogue.
//!
//! The cart itself travels with the caller's session; this service only
//! mutates the value it is handed and re-prices it.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::ports::CatalogueRepository;
use crate::domain::{Cart, CartError, CartView, Error, SellableVariant};

fn cart_error(err: CartError) -> Error {
    match err {
        CartError::QuantityOutOfRange { .. } => {
            Error::invalid_field("quantity", "quantity_out_of_range", err.to_string())
        }
        CartError::TooManyLines { .. } => {
            Error::invalid_request(err.to_string()).with_reason("cart_full")
        }
        CartError::LineNotFound => Error::not_found(err.to_string()),
    }
}

/// Cart service.
#[derive(Clone)]
pub struct CartService {
    catalogue: Arc<dyn CatalogueRepository>,
}

impl CartService {
    /// Create the service.
    pub fn new(catalogue: Arc<dyn CatalogueRepository>) -> Self {
        Self { catalogue }
    }

    async fn sellable(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SellableVariant>, Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let found = self.catalogue.find_sellable(ids).await?;
        Ok(found.into_iter().map(|s| (s.variant.id, s)).collect())
    }

    /// Price every line and flag the ones that cannot be bought.
    pub async fn view(&self, cart: &Cart) -> Result<CartView, Error> {
        let ids: Vec<Uuid> = cart.lines().iter().map(|l| l.variant_id).collect();
        let live = self.sellable(&ids).await?;
        Ok(CartView::build(cart, |id| live.get(&id).cloned()))
    }

    /// Add units of a variant that is currently on sale.
    pub async fn add(
        &self,
        cart: &mut Cart,
        variant_id: Uuid,
        quantity: u32,
    ) -> Result<CartView, Error> {
        let on_sale = self
            .sellable(&[variant_id])
            .await?
            .remove(&variant_id)
            .is_some_and(|s| s.product_active);
        if !on_sale {
            return Err(Error::not_found(format!("variant {variant_id} is not for sale")));
        }
        cart.add(variant_id, quantity).map_err(cart_error)?;
        self.view(cart).await
    }

    /// Replace a line's quantity; zero removes it.
    pub async fn set_quantity(
        &self,
        cart: &mut Cart,
        variant_id: Uuid,
        quantity: u32,
    ) -> Result<CartView, Error> {
        cart.set_quantity(variant_id, quantity).map_err(cart_error)?;
        self.view(cart).await
    }

    /// Drop a line.
    pub async fn remove(&self, cart: &mut Cart, variant_id: Uuid) -> Result<CartView, Error> {
        cart.remove(variant_id).map_err(cart_error)?;
        self.view(cart).await
    }

    /// Empty the cart.
    pub fn clear(&self, cart: &mut Cart) -> CartView {
        cart.clear();
        CartView::build(cart, |_| None)
    }
}
