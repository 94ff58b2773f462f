//! PostgreSQL-backed `CatalogueRepository`.
//!
//! Products are read together with their variants: one query for the page of
//! products, one for every variant on that page.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::AsyncConnection as _;
use diesel_async::AsyncPgConnection;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{CatalogueRepository, CatalogueRepositoryError};
use crate::domain::{
    Category, Product, ProductDetail, ProductFilter, ProductRemoval, SellableVariant,
    StockMovement, Variant,
};

use super::diesel_basic_error_mapping::{
    foreign_key_violation, map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::diesel_helpers::{contains_pattern, count_to_total};
use super::models::{
    CategoryRow, ProductRow, StockMovementRow, VariantChanges, VariantRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{categories, order_items, product_variants, products, stock_movements};

/// Diesel implementation of the product catalogue.
#[derive(Clone)]
pub struct DieselCatalogueRepository {
    pool: DbPool,
}

impl DieselCatalogueRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> CatalogueRepositoryError {
    map_basic_pool_error(error, CatalogueRepositoryError::connection)
}

fn map_diesel_error(error: DieselError) -> CatalogueRepositoryError {
    map_basic_diesel_error(
        error,
        CatalogueRepositoryError::query,
        CatalogueRepositoryError::connection,
    )
}

fn map_category_write_error(error: DieselError, category: &Category) -> CatalogueRepositoryError {
    match unique_violation(&error) {
        Some("categories_slug_key") => CatalogueRepositoryError::duplicate_slug(&*category.slug),
        _ => map_diesel_error(error),
    }
}

fn map_product_write_error(error: DieselError, product: &Product) -> CatalogueRepositoryError {
    if unique_violation(&error) == Some("products_slug_key") {
        return CatalogueRepositoryError::duplicate_slug(&*product.slug);
    }
    if let (Some("products_category_id_fkey"), Some(category_id)) =
        (foreign_key_violation(&error), product.category_id)
    {
        return CatalogueRepositoryError::missing_parent(category_id);
    }
    map_diesel_error(error)
}

fn map_variant_write_error(error: DieselError, variant: &Variant) -> CatalogueRepositoryError {
    if unique_violation(&error) == Some("product_variants_sku_key") {
        return CatalogueRepositoryError::duplicate_sku(&*variant.sku);
    }
    if foreign_key_violation(&error) == Some("product_variants_product_id_fkey") {
        return CatalogueRepositoryError::missing_parent(variant.product_id);
    }
    map_diesel_error(error)
}

/// Products matching the filter, before ordering and paging.
fn filtered_products(filter: &ProductFilter) -> products::BoxedQuery<'_, Pg> {
    let mut query = products::table.into_boxed();
    if !filter.include_inactive {
        query = query.filter(products::is_active.eq(true));
    }
    if let Some(slug) = filter.category_slug.as_deref() {
        let category_ids = categories::table
            .filter(categories::slug.eq(slug))
            .select(categories::id.nullable());
        query = query.filter(products::category_id.eq_any(category_ids));
    }
    if let Some(term) = filter.search.as_deref() {
        let pattern = contains_pattern(term);
        query = query.filter(
            products::name
                .ilike(pattern.clone())
                .or(products::description.ilike(pattern)),
        );
    }
    if let Some(min) = filter.min_price {
        query = query.filter(products::base_price.ge(min));
    }
    if let Some(max) = filter.max_price {
        query = query.filter(products::base_price.le(max));
    }
    query
}

async fn load_variants(
    conn: &mut AsyncPgConnection,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Variant>>, DieselError> {
    let rows: Vec<VariantRow> = product_variants::table
        .filter(product_variants::product_id.eq_any(product_ids))
        .order((product_variants::product_id, product_variants::sku))
        .select(VariantRow::as_select())
        .load(conn)
        .await?;
    let mut grouped: HashMap<Uuid, Vec<Variant>> = HashMap::new();
    for row in rows {
        grouped.entry(row.product_id).or_default().push(row.into());
    }
    Ok(grouped)
}

async fn with_variants(
    conn: &mut AsyncPgConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<ProductDetail>, DieselError> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut variants = load_variants(conn, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let own = variants.remove(&row.id).unwrap_or_default();
            ProductDetail::new(row.into(), own)
        })
        .collect())
}

impl DieselCatalogueRepository {
    async fn find_product_where(
        &self,
        query: products::BoxedQuery<'_, Pg>,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let Some(row) = query
            .select(ProductRow::as_select())
            .first::<ProductRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
        else {
            return Ok(None);
        };
        let mut details = with_variants(&mut conn, vec![row])
            .await
            .map_err(map_diesel_error)?;
        Ok(details.pop())
    }
}

#[async_trait]
impl CatalogueRepository for DieselCatalogueRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CategoryRow> = categories::table
            .order(categories::name)
            .select(CategoryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = categories::table
            .find(id)
            .select(CategoryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Category::from))
    }

    async fn category_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = categories::table
            .filter(categories::slug.eq(slug))
            .into_boxed();
        if let Some(id) = except {
            query = query.filter(categories::id.ne(id));
        }
        diesel::select(exists(query.select(categories::id)))
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(categories::table)
            .values(CategoryRow::from(category))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_category_write_error(err, category))
    }

    async fn update_category(
        &self,
        category: &Category,
    ) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(categories::table.find(category.id))
            .set(&CategoryRow::from(category))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_category_write_error(err, category))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(categories::table.find(id))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| {
                if foreign_key_violation(&err) == Some("products_category_id_fkey") {
                    CatalogueRepositoryError::category_in_use()
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductDetail>, u64), CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = filtered_products(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<ProductRow> = filtered_products(filter)
            .order((products::created_at.desc(), products::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(ProductRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let details = with_variants(&mut conn, rows)
            .await
            .map_err(map_diesel_error)?;
        Ok((details, count_to_total(total)))
    }

    async fn find_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError> {
        self.find_product_where(products::table.filter(products::id.eq(id)).into_boxed())
            .await
    }

    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError> {
        self.find_product_where(products::table.filter(products::slug.eq(slug)).into_boxed())
            .await
    }

    async fn product_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = products::table.filter(products::slug.eq(slug)).into_boxed();
        if let Some(id) = except {
            query = query.filter(products::id.ne(id));
        }
        diesel::select(exists(query.select(products::id)))
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(products::table)
            .values(ProductRow::from(product))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_product_write_error(err, product))
    }

    async fn update_product(&self, product: &Product) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(products::table.find(product.id))
            .set(&ProductRow::from(product))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_product_write_error(err, product))
    }

    async fn remove_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductRemoval>, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let found: Option<Uuid> = products::table
                    .find(id)
                    .select(products::id)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                if found.is_none() {
                    return Ok(None);
                }

                let sold = order_items::table
                    .inner_join(product_variants::table)
                    .filter(product_variants::product_id.eq(id))
                    .select(order_items::id);
                let has_orders: bool = diesel::select(exists(sold)).get_result(conn).await?;

                if has_orders {
                    diesel::update(products::table.find(id))
                        .set(products::is_active.eq(false))
                        .execute(conn)
                        .await?;
                    Ok(Some(ProductRemoval::Deactivated))
                } else {
                    diesel::delete(products::table.find(id)).execute(conn).await?;
                    Ok(Some(ProductRemoval::Deleted))
                }
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = product_variants::table
            .find(id)
            .select(VariantRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Variant::from))
    }

    async fn find_sellable(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<SellableVariant>, CatalogueRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(VariantRow, String, String, i64, bool)> = product_variants::table
            .inner_join(products::table)
            .filter(product_variants::id.eq_any(ids))
            .select((
                VariantRow::as_select(),
                products::name,
                products::slug,
                products::base_price,
                products::is_active,
            ))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(
                |(variant, product_name, product_slug, base_price, product_active)| {
                    SellableVariant {
                        variant: variant.into(),
                        product_name,
                        product_slug,
                        base_price,
                        product_active,
                    }
                },
            )
            .collect())
    }

    async fn insert_variant(
        &self,
        variant: &Variant,
        opening_stock: Option<StockMovement>,
    ) -> Result<(), CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = VariantRow::from(variant);
        let movement = opening_stock.as_ref().map(StockMovementRow::from);
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                diesel::insert_into(product_variants::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                if let Some(movement) = movement {
                    diesel::insert_into(stock_movements::table)
                        .values(&movement)
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| map_variant_write_error(err, variant))
    }

    async fn update_variant(&self, variant: &Variant) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(product_variants::table.find(variant.id))
            .set(&VariantChanges::from(variant))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| map_variant_write_error(err, variant))
    }

    async fn delete_variant(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(product_variants::table.find(id))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| {
                if foreign_key_violation(&err) == Some("order_items_variant_id_fkey") {
                    CatalogueRepositoryError::variant_in_use()
                } else {
                    map_diesel_error(err)
                }
            })
    }
}
