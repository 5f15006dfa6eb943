use crate::{
    auth::AuthUser, services::wishlist::WishlistWithItems, ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Wishlist routes for the authenticated customer
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist))
        .route("/items", post(add_item))
        .route("/items/:product_id", delete(remove_item))
}

#[derive(Debug, Deserialize)]
pub struct AddWishlistItemRequest {
    pub product_id: Uuid,
}

/// Get the customer's wishlist
async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<WishlistWithItems> {
    let wishlist = state.services.wishlist.get_wishlist(user.id).await?;
    Ok(Json(ApiResponse::success(wishlist)))
}

/// Save a product to the wishlist
async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddWishlistItemRequest>,
) -> ApiResult<WishlistWithItems> {
    let wishlist = state
        .services
        .wishlist
        .add(user.id, payload.product_id)
        .await?;
    Ok(Json(ApiResponse::success(wishlist)))
}

/// Remove a product from the wishlist
async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> ApiResult<WishlistWithItems> {
    let wishlist = state.services.wishlist.remove(user.id, product_id).await?;
    Ok(Json(ApiResponse::success(wishlist)))
}
