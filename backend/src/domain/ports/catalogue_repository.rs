//! Port for categories, products and variants.

use async_trait::async_trait;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::{
    Category, Error, Product, ProductDetail, ProductFilter, ProductRemoval, SellableVariant,
    StockMovement, Variant,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by catalogue repository adapters.
    pub enum CatalogueRepositoryError: persistence {
        /// A slug collided with an existing row.
        DuplicateSlug { slug: String } => "slug {slug} is already in use",
        /// A SKU collided with an existing variant.
        DuplicateSku { sku: String } => "sku {sku} is already in use",
        /// The category still owns products.
        CategoryInUse => "category still has products",
        /// The variant appears on orders.
        VariantInUse => "variant is referenced by orders",
        /// A referenced category or product does not exist.
        MissingParent { id: Uuid } => "parent record {id} does not exist",
    }
}

impl From<CatalogueRepositoryError> for Error {
    fn from(err: CatalogueRepositoryError) -> Self {
        match err {
            CatalogueRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("catalogue repository unavailable: {message}"))
            }
            CatalogueRepositoryError::Query { message } => {
                Error::internal(format!("catalogue repository error: {message}"))
            }
            CatalogueRepositoryError::DuplicateSlug { slug } => {
                Error::conflict(format!("slug {slug} is already in use")).with_reason("slug_taken")
            }
            CatalogueRepositoryError::DuplicateSku { sku } => {
                Error::conflict(format!("sku {sku} is already in use")).with_reason("sku_taken")
            }
            CatalogueRepositoryError::CategoryInUse => {
                Error::conflict("category still has products").with_reason("category_in_use")
            }
            CatalogueRepositoryError::VariantInUse => {
                Error::conflict("variant is referenced by orders").with_reason("variant_in_use")
            }
            CatalogueRepositoryError::MissingParent { id } => {
                Error::not_found(format!("record {id} does not exist"))
            }
        }
    }
}

/// Storage for the product catalogue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogueRepository: Send + Sync {
    /// Every category, ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogueRepositoryError>;

    /// Fetch a category.
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, CatalogueRepositoryError>;

    /// Whether a category other than `except` already uses `slug`.
    async fn category_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError>;

    /// Insert a category.
    async fn insert_category(&self, category: &Category) -> Result<(), CatalogueRepositoryError>;

    /// Overwrite a category. Returns `false` when it does not exist.
    async fn update_category(&self, category: &Category)
    -> Result<bool, CatalogueRepositoryError>;

    /// Delete a category that owns no products.
    async fn delete_category(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError>;

    /// Page through products matching a filter, newest first.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductDetail>, u64), CatalogueRepositoryError>;

    /// Fetch a product with its variants.
    async fn find_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError>;

    /// Fetch a product with its variants by slug.
    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError>;

    /// Whether a product other than `except` already uses `slug`.
    async fn product_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError>;

    /// Insert a product without variants.
    async fn insert_product(&self, product: &Product) -> Result<(), CatalogueRepositoryError>;

    /// Overwrite a product. Returns `false` when it does not exist.
    async fn update_product(&self, product: &Product) -> Result<bool, CatalogueRepositoryError>;

    /// Delete a product, or hide it when orders reference its variants.
    /// Returns `None` when the product does not exist.
    async fn remove_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductRemoval>, CatalogueRepositoryError>;

    /// Fetch a variant.
    async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, CatalogueRepositoryError>;

    /// Fetch variants joined with their products. Unknown ids are skipped.
    async fn find_sellable(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<SellableVariant>, CatalogueRepositoryError>;

    /// Insert a variant together with the ledger row for its opening stock.
    async fn insert_variant(
        &self,
        variant: &Variant,
        opening_stock: Option<StockMovement>,
    ) -> Result<(), CatalogueRepositoryError>;

    /// Overwrite a variant's descriptive fields; stock is left untouched.
    async fn update_variant(&self, variant: &Variant) -> Result<bool, CatalogueRepositoryError>;

    /// Delete a variant that no order references.
    async fn delete_variant(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError>;
}
