use crate::{auth::AuthUser, services::cart::CartWithItems, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Cart routes; every endpoint operates on the authenticated customer's cart
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", put(set_item_quantity))
        .route("/clear", post(clear_cart))
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub product_id: Uuid,
    /// Desired quantity; zero or negative removes the line
    pub quantity: i32,
}

/// Get the customer's cart with items
async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartWithItems> {
    let cart = state.services.cart.get_cart(user.id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Set the quantity for one product in the cart
async fn set_item_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SetQuantityRequest>,
) -> ApiResult<CartWithItems> {
    let cart = state
        .services
        .cart
        .set_quantity(user.id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Empty the cart
async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<serde_json::Value> {
    state.services.cart.clear(user.id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Cart cleared"
    }))))
}
