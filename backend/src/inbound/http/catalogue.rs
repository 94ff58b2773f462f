//! Public storefront catalogue.
//!
//! ```text
//! GET /api/v1/categories
//! GET /api/v1/products?category=dresses&search=kitenge&minPrice=100000&page=1
//! GET /api/v1/products/{slug}
//! ```

use actix_web::{HttpResponse, get, web};
use pagination::Page;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::{Category, Money, ProductDetail, ProductFilter};
use crate::inbound::http::ApiResult;
use crate::inbound::http::cache_control::private_no_cache_header;
use crate::inbound::http::schemas::{CategorySchema, ErrorSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::page_request;

/// Product listing filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    /// Lowest base price, in cents.
    pub min_price: Option<Money>,
    /// Highest base price, in cents.
    pub max_price: Option<Money>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub(crate) fn filter(&self, include_inactive: bool) -> ProductFilter {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        ProductFilter {
            category_slug: text(&self.category),
            search: text(&self.search),
            min_price: self.min_price,
            max_price: self.max_price,
            include_inactive,
        }
    }
}

/// Every category, by name.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Categories", body = [CategorySchema]),
        (status = 500, description = "Internal server error", body = ErrorSchema)
    ),
    tags = ["catalogue"],
    operation_id = "listCategories",
    security([])
)]
#[get("/categories")]
pub async fn list_categories(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<Category>>> {
    Ok(web::Json(state.catalogue.list_categories().await?))
}

/// Active products with their variants, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Page of products", body = Object),
        (status = 400, description = "Invalid filter or page", body = ErrorSchema)
    ),
    tags = ["catalogue"],
    operation_id = "listProducts",
    security([])
)]
#[get("/products")]
pub async fn list_products(
    state: web::Data<HttpState>,
    query: web::Query<ProductQuery>,
) -> ApiResult<HttpResponse> {
    let page = page_request(query.page, query.per_page)?;
    let products: Page<ProductDetail> = state
        .catalogue
        .list_products(query.filter(false), page)
        .await?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(products))
}

/// One active product by slug.
#[utoipa::path(
    get,
    path = "/api/v1/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product with variants", body = Object),
        (status = 404, description = "Unknown or hidden product", body = ErrorSchema)
    ),
    tags = ["catalogue"],
    operation_id = "getProduct",
    security([])
)]
#[get("/products/{slug}")]
pub async fn get_product(
    state: web::Data<HttpState>,
    slug: web::Path<String>,
) -> ApiResult<web::Json<ProductDetail>> {
    Ok(web::Json(state.catalogue.get_product(&slug).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use uuid::Uuid;

    use crate::domain::{NewCategory, NewProduct, NewVariant, Role};
    use crate::inbound::http::test_utils::{TestApi, json_body};

    async fn stocked(api: &TestApi) {
        let admin = api.backend.seed_user("admin@hera.co.ke", Role::Admin).await;
        let dresses = api
            .state
            .catalogue
            .create_category(NewCategory {
                name: "Dresses".into(),
                description: None,
            })
            .await
            .expect("category");
        for (name, price, active) in [
            ("Kitenge Maxi Dress", 450_000, true),
            ("Ankara Wrap Dress", 380_000, true),
            ("Retired Shift Dress", 200_000, false),
        ] {
            let product = api
                .state
                .catalogue
                .create_product(NewProduct {
                    category_id: Some(dresses.id),
                    name: name.into(),
                    description: "Handmade in Nairobi".into(),
                    base_price: price,
                    image_urls: Vec::new(),
                    is_active: active,
                })
                .await
                .expect("product");
            api.state
                .catalogue
                .create_variant(
                    product.product.id,
                    NewVariant {
                        sku: format!("sku-{}", Uuid::new_v4().simple()),
                        size: Some("M".into()),
                        colour: None,
                        price_override: None,
                        initial_stock: 4,
                        low_stock_threshold: 1,
                    },
                    admin.id,
                )
                .await
                .expect("variant");
        }
    }

    #[actix_web::test]
    async fn listing_hides_inactive_products() {
        let api = TestApi::new();
        stocked(&api).await;
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/api/v1/products").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["totalPages"], 1);
        let names: Vec<&str> = body["items"]
            .as_array()
            .expect("items")
            .iter()
            .filter_map(|item| item["name"].as_str())
            .collect();
        assert!(!names.contains(&"Retired Shift Dress"));
        assert_eq!(body["items"][0]["variants"][0]["inStock"], true);
    }

    #[actix_web::test]
    async fn listing_filters_by_search_and_price() {
        let api = TestApi::new();
        stocked(&api).await;
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/products?category=dresses&search=KITENGE&minPrice=400000")
                .to_request(),
        )
        .await;
        let body = json_body(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["slug"], "kitenge-maxi-dress");
    }

    #[actix_web::test]
    async fn inverted_price_range_is_rejected() {
        let api = TestApi::new();
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/products?minPrice=500&maxPrice=100")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn oversized_pages_are_rejected() {
        let api = TestApi::new();
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/products?perPage=500")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["details"]["field"], "perPage");
    }

    #[actix_web::test]
    async fn hidden_products_are_not_found_by_slug() {
        let api = TestApi::new();
        stocked(&api).await;
        let app = actix_test::init_service(api.app()).await;

        let visible = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/products/ankara-wrap-dress")
                .to_request(),
        )
        .await;
        assert_eq!(visible.status(), StatusCode::OK);

        let hidden = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/products/retired-shift-dress")
                .to_request(),
        )
        .await;
        assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn categories_are_public() {
        let api = TestApi::new();
        stocked(&api).await;
        let app = actix_test::init_service(api.app()).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/api/v1/categories").to_request(),
        )
        .await;
        let body = json_body(response).await;
        assert_eq!(body[0]["slug"], "dresses");
    }
}
