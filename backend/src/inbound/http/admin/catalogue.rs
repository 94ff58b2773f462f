//! Category, product and variant management.
//!
//! ```text
//! POST /api/v1/admin/categories {"name":"Dresses"}
//! GET /api/v1/admin/products?search=kitenge
//! POST /api/v1/admin/products/{id}/variants {"sku":"KMD-RED-M","initialStock":12}
//! PATCH /api/v1/admin/variants/{id} {"priceOverride":null}
//! ```

use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Category, Money, NewCategory, NewProduct, NewVariant, ProductDetail, ProductRemoval,
    ProductUpdate, Variant, VariantUpdate,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Staff;
use crate::inbound::http::catalogue::ProductQuery;
use crate::inbound::http::schemas::{CategorySchema, ErrorSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{double_option, page_request};

/// Category form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryForm {
    #[schema(example = "Dresses")]
    pub name: String,
    pub description: Option<String>,
}

impl From<CategoryForm> for NewCategory {
    fn from(form: CategoryForm) -> Self {
        Self {
            name: form.name,
            description: form.description,
        }
    }
}

/// New product.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    pub category_id: Option<Uuid>,
    #[schema(example = "Kitenge Maxi Dress")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in cents.
    #[schema(example = 450000)]
    pub base_price: Money,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

/// Product patch; absent fields are left alone and `categoryId: null`
/// uncategorises the product.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub category_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<Money>,
    pub image_urls: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl From<ProductPatch> for ProductUpdate {
    fn from(patch: ProductPatch) -> Self {
        Self {
            category_id: patch.category_id,
            name: patch.name,
            description: patch.description,
            base_price: patch.base_price,
            image_urls: patch.image_urls,
            is_active: patch.is_active,
        }
    }
}

/// New variant with its opening stock.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantForm {
    #[schema(example = "KMD-RED-M")]
    pub sku: String,
    pub size: Option<String>,
    pub colour: Option<String>,
    pub price_override: Option<Money>,
    #[serde(default)]
    pub initial_stock: i32,
    #[serde(default = "default_threshold")]
    pub low_stock_threshold: i32,
}

const fn default_threshold() -> i32 {
    5
}

impl From<VariantForm> for NewVariant {
    fn from(form: VariantForm) -> Self {
        Self {
            sku: form.sku,
            size: form.size,
            colour: form.colour,
            price_override: form.price_override,
            initial_stock: form.initial_stock,
            low_stock_threshold: form.low_stock_threshold,
        }
    }
}

/// Variant patch. Stock is changed through stock movements, not here.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantPatch {
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub size: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub colour: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub price_override: Option<Option<Money>>,
    pub low_stock_threshold: Option<i32>,
}

impl From<VariantPatch> for VariantUpdate {
    fn from(patch: VariantPatch) -> Self {
        Self {
            sku: patch.sku,
            size: patch.size,
            colour: patch.colour,
            price_override: patch.price_override,
            low_stock_threshold: patch.low_stock_threshold,
        }
    }
}

/// What removing a product did.
#[derive(Debug, Serialize, ToSchema)]
pub struct RemovalOutcome {
    /// `deleted`, or `deactivated` when orders still reference the product.
    #[schema(value_type = String, example = "deactivated")]
    pub outcome: ProductRemoval,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/categories",
    responses(
        (status = 200, description = "Categories", body = [CategorySchema]),
        (status = 403, description = "Staff only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListCategories"
)]
#[get("/admin/categories")]
pub async fn list_categories(
    state: web::Data<HttpState>,
    _staff: Staff,
) -> ApiResult<web::Json<Vec<Category>>> {
    Ok(web::Json(state.catalogue.list_categories().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    request_body = CategoryForm,
    responses(
        (status = 201, description = "Category created", body = CategorySchema),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Name already used", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createCategory"
)]
#[post("/admin/categories")]
pub async fn create_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    payload: web::Json<CategoryForm>,
) -> ApiResult<HttpResponse> {
    let category = state
        .catalogue
        .create_category(payload.into_inner().into())
        .await?;
    Ok(HttpResponse::Created().json(category))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryForm,
    responses(
        (status = 200, description = "Category updated", body = CategorySchema),
        (status = 404, description = "Unknown category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateCategory"
)]
#[put("/admin/categories/{id}")]
pub async fn update_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<CategoryForm>,
) -> ApiResult<web::Json<Category>> {
    let category = state
        .catalogue
        .update_category(id.into_inner(), payload.into_inner().into())
        .await?;
    Ok(web::Json(category))
}

/// Products in the category become uncategorised.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Unknown category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteCategory"
)]
#[delete("/admin/categories/{id}")]
pub async fn delete_category(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.catalogue.delete_category(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Every product, hidden ones included.
#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Page of products", body = Object),
        (status = 400, description = "Invalid filter or page", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListProducts"
)]
#[get("/admin/products")]
pub async fn list_products(
    state: web::Data<HttpState>,
    _staff: Staff,
    query: web::Query<ProductQuery>,
) -> ApiResult<HttpResponse> {
    let page = page_request(query.page, query.per_page)?;
    let products = state
        .catalogue
        .list_all_products(query.filter(true), page)
        .await?;
    Ok(HttpResponse::Ok().json(products))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = ProductForm,
    responses(
        (status = 201, description = "Product created", body = Object),
        (status = 400, description = "Invalid request", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createProduct"
)]
#[post("/admin/products")]
pub async fn create_product(
    state: web::Data<HttpState>,
    _staff: Staff,
    payload: web::Json<ProductForm>,
) -> ApiResult<HttpResponse> {
    let ProductForm {
        category_id,
        name,
        description,
        base_price,
        image_urls,
        is_active,
    } = payload.into_inner();
    let product = state
        .catalogue
        .create_product(NewProduct {
            category_id,
            name,
            description,
            base_price,
            image_urls,
            is_active,
        })
        .await?;
    Ok(HttpResponse::Created().json(product))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with variants", body = Object),
        (status = 404, description = "Unknown product", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminGetProduct"
)]
#[get("/admin/products/{id}")]
pub async fn get_product(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<ProductDetail>> {
    Ok(web::Json(
        state.catalogue.get_product_by_id(id.into_inner()).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductPatch,
    responses(
        (status = 200, description = "Product updated", body = Object),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Unknown product or category", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateProduct"
)]
#[patch("/admin/products/{id}")]
pub async fn update_product(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<ProductPatch>,
) -> ApiResult<web::Json<ProductDetail>> {
    let product = state
        .catalogue
        .update_product(id.into_inner(), payload.into_inner().into())
        .await?;
    Ok(web::Json(product))
}

/// Delete a product, or hide it when orders still reference it.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Removal outcome", body = RemovalOutcome),
        (status = 404, description = "Unknown product", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "removeProduct"
)]
#[delete("/admin/products/{id}")]
pub async fn remove_product(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<RemovalOutcome>> {
    let outcome = state.catalogue.remove_product(id.into_inner()).await?;
    Ok(web::Json(RemovalOutcome { outcome }))
}

/// Add a variant; opening stock is recorded as an addition movement.
#[utoipa::path(
    post,
    path = "/api/v1/admin/products/{id}/variants",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = VariantForm,
    responses(
        (status = 201, description = "Variant created", body = Object),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "SKU already used", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createVariant"
)]
#[post("/admin/products/{id}/variants")]
pub async fn create_variant(
    state: web::Data<HttpState>,
    Staff(staff): Staff,
    id: web::Path<Uuid>,
    payload: web::Json<VariantForm>,
) -> ApiResult<HttpResponse> {
    let variant = state
        .catalogue
        .create_variant(id.into_inner(), payload.into_inner().into(), staff.user_id)
        .await?;
    Ok(HttpResponse::Created().json(variant))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant id")),
    request_body = VariantPatch,
    responses(
        (status = 200, description = "Variant updated", body = Object),
        (status = 404, description = "Unknown variant", body = ErrorSchema),
        (status = 409, description = "SKU already used", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateVariant"
)]
#[patch("/admin/variants/{id}")]
pub async fn update_variant(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
    payload: web::Json<VariantPatch>,
) -> ApiResult<web::Json<Variant>> {
    let variant = state
        .catalogue
        .update_variant(id.into_inner(), payload.into_inner().into())
        .await?;
    Ok(web::Json(variant))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant id")),
    responses(
        (status = 204, description = "Variant deleted"),
        (status = 404, description = "Unknown variant", body = ErrorSchema),
        (status = 409, description = "Variant has been ordered", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteVariant"
)]
#[delete("/admin/variants/{id}")]
pub async fn delete_variant(
    state: web::Data<HttpState>,
    _staff: Staff,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.catalogue.delete_variant(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
