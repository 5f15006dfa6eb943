use crate::{
    auth::AuthUser,
    entities::ProductModel,
    errors::ServiceError,
    services::catalog::{CreateProductInput, ProductFilter, UpdateProductInput},
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Storefront view of a product
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub category: Option<String>,
    pub sizes: Vec<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        let sizes = model
            .sizes
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            currency: model.currency,
            category: model.category,
            sizes,
            image_url: model.image_url,
            is_featured: model.is_featured,
            created_at: model.created_at,
        }
    }
}

/// Product routes (public storefront reads)
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Product admin routes
pub fn products_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
}

/// List products with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Product listing", body = crate::ApiResponse<crate::PaginatedResponse<ProductResponse>>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductResponse>>>, ServiceError> {
    // Mirror the clamping the catalog service applies
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter.per_page.unwrap_or(20).clamp(1, 100);

    let (products, total) = state.services.catalog.list_products(filter).await?;

    let response = PaginatedResponse {
        items: products.into_iter().map(ProductResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product details", body = crate::ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.get_active_product(id).await?;
    Ok(Json(ApiResponse::success(product.into())))
}

/// Create a product (admin)
async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }
    payload.validate()?;

    let product = state.services.catalog.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product.into()))))
}

/// Update a product (admin)
async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }
    payload.validate()?;

    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(product.into())))
}

/// Deactivate a product (admin)
async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }

    state.services.catalog.delete_product(id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Product removed from storefront"
    }))))
}
