//! Categories, products and variants.

use std::future::Future;
use std::sync::Arc;

use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use crate::domain::catalogue::{require_price, require_quantity, require_text};
use crate::domain::ports::{CatalogueRepository, CatalogueRepositoryError};
use crate::domain::{
    CatalogueValidationError, Category, Error, MovementDraft, MovementKind, NewCategory,
    NewProduct, NewVariant, Product, ProductDetail, ProductFilter, ProductRemoval, ProductUpdate,
    StockMovement, UserId, Variant, VariantUpdate, normalise_sku, slug_candidate, slugify,
};

const MAX_SLUG_ATTEMPTS: u32 = 100;

pub(crate) fn catalogue_validation_error(err: CatalogueValidationError) -> Error {
    let (field, code) = match &err {
        CatalogueValidationError::Blank { field } => (*field, "blank"),
        CatalogueValidationError::NegativePrice { field } => (*field, "negative_price"),
        CatalogueValidationError::InvalidSku => ("sku", "invalid_sku"),
        CatalogueValidationError::NegativeQuantity { field } => (*field, "negative_quantity"),
        CatalogueValidationError::EmptySlug => ("name", "empty_slug"),
    };
    Error::invalid_field(field, code, err.to_string())
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Find the first free slug for `name`, numbering collisions.
async fn unique_slug<F, Fut>(name: &str, taken: F) -> Result<String, Error>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool, CatalogueRepositoryError>>,
{
    let base = slugify(name);
    if base.is_empty() {
        return Err(catalogue_validation_error(CatalogueValidationError::EmptySlug));
    }
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = slug_candidate(&base, attempt);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(Error::conflict(format!("no free slug for {base}")).with_reason("slug_taken"))
}

/// Catalogue service for the storefront and back office.
#[derive(Clone)]
pub struct CatalogueService {
    catalogue: Arc<dyn CatalogueRepository>,
    clock: Arc<dyn Clock>,
}

impl CatalogueService {
    /// Create the service.
    pub fn new(catalogue: Arc<dyn CatalogueRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { catalogue, clock }
    }

    async fn category_slug(&self, name: &str, except: Option<Uuid>) -> Result<String, Error> {
        let repo = Arc::clone(&self.catalogue);
        unique_slug(name, move |slug| {
            let repo = Arc::clone(&repo);
            async move { repo.category_slug_taken(&slug, except).await }
        })
        .await
    }

    async fn product_slug(&self, name: &str, except: Option<Uuid>) -> Result<String, Error> {
        let repo = Arc::clone(&self.catalogue);
        unique_slug(name, move |slug| {
            let repo = Arc::clone(&repo);
            async move { repo.product_slug_taken(&slug, except).await }
        })
        .await
    }

    async fn ensure_category(&self, id: Option<Uuid>) -> Result<(), Error> {
        let Some(id) = id else {
            return Ok(());
        };
        if self.catalogue.find_category(id).await?.is_none() {
            return Err(Error::invalid_field(
                "categoryId",
                "unknown_category",
                format!("category {id} does not exist"),
            ));
        }
        Ok(())
    }

    // Categories

    /// Every category, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        Ok(self.catalogue.list_categories().await?)
    }

    /// Create a category with a unique slug.
    pub async fn create_category(&self, input: NewCategory) -> Result<Category, Error> {
        let name = require_text("name", &input.name).map_err(catalogue_validation_error)?;
        let category = Category {
            id: Uuid::new_v4(),
            slug: self.category_slug(&name, None).await?,
            name,
            description: optional_text(input.description),
        };
        self.catalogue.insert_category(&category).await?;
        info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    /// Rename or re-describe a category. Renaming re-derives the slug.
    pub async fn update_category(&self, id: Uuid, input: NewCategory) -> Result<Category, Error> {
        let mut category = self
            .catalogue
            .find_category(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("category {id} not found")))?;
        let name = require_text("name", &input.name).map_err(catalogue_validation_error)?;
        if name != category.name {
            category.slug = self.category_slug(&name, Some(id)).await?;
            category.name = name;
        }
        category.description = optional_text(input.description);
        if !self.catalogue.update_category(&category).await? {
            return Err(Error::not_found(format!("category {id} not found")));
        }
        Ok(category)
    }

    /// Delete an empty category.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), Error> {
        if !self.catalogue.delete_category(id).await? {
            return Err(Error::not_found(format!("category {id} not found")));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    // Products

    /// Storefront listing. Hidden products are never returned.
    pub async fn list_products(
        &self,
        mut filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<ProductDetail>, Error> {
        filter.include_inactive = false;
        self.list_all_products(filter, page).await
    }

    /// Back-office listing honouring `include_inactive`.
    pub async fn list_all_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<ProductDetail>, Error> {
        if filter.min_price.zip(filter.max_price).is_some_and(|(min, max)| min > max) {
            return Err(Error::invalid_field(
                "minPrice",
                "inverted_range",
                "minPrice must not exceed maxPrice",
            ));
        }
        let (items, total) = self.catalogue.list_products(&filter, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Storefront product page.
    pub async fn get_product(&self, slug: &str) -> Result<ProductDetail, Error> {
        self.catalogue
            .find_product_by_slug(slug)
            .await?
            .filter(|detail| detail.product.is_active)
            .ok_or_else(|| Error::not_found(format!("product {slug} not found")))
    }

    /// Back-office product lookup, hidden products included.
    pub async fn get_product_by_id(&self, id: Uuid) -> Result<ProductDetail, Error> {
        self.catalogue
            .find_product(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("product {id} not found")))
    }

    /// Create a product without variants.
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductDetail, Error> {
        let name = require_text("name", &input.name).map_err(catalogue_validation_error)?;
        let base_price =
            require_price("basePrice", input.base_price).map_err(catalogue_validation_error)?;
        self.ensure_category(input.category_id).await?;
        let now = self.clock.utc();
        let product = Product {
            id: Uuid::new_v4(),
            category_id: input.category_id,
            slug: self.product_slug(&name, None).await?,
            name,
            description: input.description.trim().to_owned(),
            base_price,
            image_urls: input.image_urls,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        self.catalogue.insert_product(&product).await?;
        info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(ProductDetail::new(product, Vec::new()))
    }

    /// Apply a partial update to a product.
    pub async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<ProductDetail, Error> {
        let detail = self.get_product_by_id(id).await?;
        let mut product = detail.product;
        if let Some(name) = update.name.as_deref() {
            let name = require_text("name", name).map_err(catalogue_validation_error)?;
            if name != product.name {
                product.slug = self.product_slug(&name, Some(id)).await?;
                product.name = name;
            }
        }
        if let Some(category_id) = update.category_id {
            self.ensure_category(category_id).await?;
            product.category_id = category_id;
        }
        if let Some(description) = update.description {
            product.description = description.trim().to_owned();
        }
        if let Some(price) = update.base_price {
            product.base_price =
                require_price("basePrice", price).map_err(catalogue_validation_error)?;
        }
        if let Some(urls) = update.image_urls {
            product.image_urls = urls;
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }
        product.updated_at = self.clock.utc();
        if !self.catalogue.update_product(&product).await? {
            return Err(Error::not_found(format!("product {id} not found")));
        }
        let variants = detail.variants.into_iter().map(|v| v.variant).collect();
        Ok(ProductDetail::new(product, variants))
    }

    /// Delete a product, or hide it when orders reference its variants.
    pub async fn remove_product(&self, id: Uuid) -> Result<ProductRemoval, Error> {
        let outcome = self
            .catalogue
            .remove_product(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("product {id} not found")))?;
        info!(product_id = %id, ?outcome, "product removed");
        Ok(outcome)
    }

    // Variants

    /// Add a variant; opening stock is recorded as an addition.
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        input: NewVariant,
        actor: UserId,
    ) -> Result<Variant, Error> {
        let sku = normalise_sku(&input.sku).map_err(catalogue_validation_error)?;
        let price_override = input
            .price_override
            .map(|p| require_price("priceOverride", p))
            .transpose()
            .map_err(catalogue_validation_error)?;
        let initial = require_quantity("initialStock", input.initial_stock)
            .map_err(catalogue_validation_error)?;
        let threshold = require_quantity("lowStockThreshold", input.low_stock_threshold)
            .map_err(catalogue_validation_error)?;
        if self.catalogue.find_product(product_id).await?.is_none() {
            return Err(Error::not_found(format!("product {product_id} not found")));
        }

        let variant = Variant {
            id: Uuid::new_v4(),
            product_id,
            sku,
            size: optional_text(input.size),
            colour: optional_text(input.colour),
            price_override,
            stock_quantity: initial,
            low_stock_threshold: threshold,
        };
        let opening = (initial > 0).then(|| {
            StockMovement::record(
                MovementDraft {
                    variant_id: variant.id,
                    kind: MovementKind::Addition,
                    reason: Some("opening stock".to_owned()),
                    order_id: None,
                    performed_by: Some(actor),
                },
                0,
                initial,
                self.clock.utc(),
            )
        });
        self.catalogue.insert_variant(&variant, opening).await?;
        info!(variant_id = %variant.id, sku = %variant.sku, initial, "variant created");
        Ok(variant)
    }

    /// Apply a partial update to a variant. Stock is left untouched.
    pub async fn update_variant(&self, id: Uuid, update: VariantUpdate) -> Result<Variant, Error> {
        let mut variant = self
            .catalogue
            .find_variant(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("variant {id} not found")))?;
        if let Some(sku) = update.sku.as_deref() {
            variant.sku = normalise_sku(sku).map_err(catalogue_validation_error)?;
        }
        if let Some(size) = update.size {
            variant.size = optional_text(size);
        }
        if let Some(colour) = update.colour {
            variant.colour = optional_text(colour);
        }
        if let Some(price) = update.price_override {
            variant.price_override = price
                .map(|p| require_price("priceOverride", p))
                .transpose()
                .map_err(catalogue_validation_error)?;
        }
        if let Some(threshold) = update.low_stock_threshold {
            variant.low_stock_threshold = require_quantity("lowStockThreshold", threshold)
                .map_err(catalogue_validation_error)?;
        }
        if !self.catalogue.update_variant(&variant).await? {
            return Err(Error::not_found(format!("variant {id} not found")));
        }
        Ok(variant)
    }

    /// Delete a variant that no order references.
    pub async fn delete_variant(&self, id: Uuid) -> Result<(), Error> {
        if !self.catalogue.delete_variant(id).await? {
            return Err(Error::not_found(format!("variant {id} not found")));
        }
        info!(variant_id = %id, "variant deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockCatalogueRepository;
    use chrono::Utc;
    use mockable::DefaultClock;
    use rstest::rstest;

    fn service(repo: MockCatalogueRepository) -> CatalogueService {
        CatalogueService::new(Arc::new(repo), Arc::new(DefaultClock))
    }

    fn product(active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            category_id: None,
            name: "Kitenge Shirt".into(),
            slug: "kitenge-shirt".into(),
            description: String::new(),
            base_price: 250_000,
            image_urls: Vec::new(),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn colliding_slugs_are_numbered() {
        let mut repo = MockCatalogueRepository::new();
        repo.expect_category_slug_taken()
            .returning(|slug, _| Ok(slug == "dresses" || slug == "dresses-2"));
        repo.expect_insert_category()
            .withf(|c| c.slug == "dresses-3" && c.name == "Dresses")
            .times(1)
            .return_once(|_| Ok(()));

        let category = service(repo)
            .create_category(NewCategory {
                name: " Dresses ".into(),
                description: Some("  ".into()),
            })
            .await
            .expect("created");
        assert_eq!(category.slug, "dresses-3");
        assert_eq!(category.description, None);
    }

    #[rstest]
    #[tokio::test]
    async fn names_without_letters_are_rejected() {
        let mut repo = MockCatalogueRepository::new();
        repo.expect_insert_category().times(0);
        let error = service(repo)
            .create_category(NewCategory {
                name: "!!!".into(),
                description: None,
            })
            .await
            .expect_err("no slug");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn hidden_products_are_not_found_on_the_storefront() {
        let mut repo = MockCatalogueRepository::new();
        repo.expect_find_product_by_slug()
            .return_once(|_| Ok(Some(ProductDetail::new(product(false), Vec::new()))));
        let error = service(repo)
            .get_product("kitenge-shirt")
            .await
            .expect_err("hidden");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn storefront_listing_forces_active_only() {
        let mut repo = MockCatalogueRepository::new();
        repo.expect_list_products()
            .withf(|filter, _| !filter.include_inactive)
            .return_once(|_, _| Ok((Vec::new(), 0)));
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let page = service(repo)
            .list_products(filter, PageRequest::default())
            .await
            .expect("listed");
        assert_eq!(page.total, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn opening_stock_is_recorded_as_an_addition() {
        let parent = product(true);
        let product_id = parent.id;
        let actor = UserId::random();
        let mut repo = MockCatalogueRepository::new();
        repo.expect_find_product()
            .return_once(move |_| Ok(Some(ProductDetail::new(parent, Vec::new()))));
        repo.expect_insert_variant()
            .withf(move |variant, movement| {
                variant.sku == "KS-RED-M"
                    && variant.stock_quantity == 12
                    && movement.as_ref().is_some_and(|m| {
                        m.kind == MovementKind::Addition
                            && m.quantity_before == 0
                            && m.quantity_after == 12
                            && m.performed_by == Some(actor)
                    })
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        service(repo)
            .create_variant(
                product_id,
                NewVariant {
                    sku: " ks-red-m ".into(),
                    size: Some("M".into()),
                    colour: Some("Red".into()),
                    price_override: None,
                    initial_stock: 12,
                    low_stock_threshold: 3,
                },
                actor,
            )
            .await
            .expect("variant");
    }

    #[rstest]
    #[tokio::test]
    async fn negative_prices_are_rejected() {
        let error = service(MockCatalogueRepository::new())
            .create_product(NewProduct {
                category_id: None,
                name: "Wrap".into(),
                description: String::new(),
                base_price: -1,
                image_urls: Vec::new(),
                is_active: true,
            })
            .await
            .expect_err("negative");
        assert_eq!(
            error.details().and_then(|d| d.get("field")),
            Some(&serde_json::json!("basePrice"))
        );
    }
}
