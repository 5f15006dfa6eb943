use super::common::PaginationParams;
use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    gateways::CallbackPayload,
    services::orders::OrderResponse,
    services::reconciliation::{ConfirmOutcome, PlaceOrderInput, PlaceOrderOutcome},
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Customer-facing order routes
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/", get(list_my_orders))
        .route("/confirm", post(confirm_payment))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

/// Admin fulfillment routes
pub fn orders_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders))
        .route("/:id/status", put(update_order_status))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct OrderStatusFilter {
    /// Filter by order status
    pub status: Option<OrderStatus>,
}

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderInput,
    responses(
        (status = 201, description = "Order placed (COD) or awaiting payment (gateway)", body = crate::ApiResponse<PlaceOrderOutcome>),
        (status = 400, description = "Invalid order", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<PlaceOrderOutcome>>), ServiceError> {
    payload.validate()?;

    let outcome = state
        .services
        .reconciliation
        .place_order(user.id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

/// Confirm a payment from a provider callback.
///
/// Unauthenticated on purpose: redirects and server-to-server callbacks do
/// not carry the customer's session. The provider-side verification inside
/// the reconciliation service is what authorizes the transition.
#[utoipa::path(
    post,
    path = "/api/v1/orders/confirm",
    request_body = CallbackPayload,
    responses(
        (status = 200, description = "Payment confirmed", body = crate::ApiResponse<ConfirmOutcome>),
        (status = 402, description = "Payment failed; cart unchanged", body = crate::ApiResponse<ConfirmOutcome>),
        (status = 400, description = "Invalid or mis-signed callback", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> Result<Response, ServiceError> {
    match state.services.reconciliation.confirm_payment(payload).await {
        Ok(outcome) => Ok(Json(ApiResponse::success(outcome)).into_response()),
        Err(ServiceError::PaymentFailed(message)) => Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(ApiResponse::<ConfirmOutcome>::error(message)),
        )
            .into_response()),
        Err(other) => Err(other),
    }
}

/// List the customer's orders
async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let (page, per_page) = params.sanitized();
    let (orders, total) = state
        .services
        .orders
        .list_orders_for_customer(user.id, page, per_page)
        .await?;

    let mut items = Vec::with_capacity(orders.len());
    for order in orders {
        items.push(state.services.orders.to_response(order).await?);
    }

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    })))
}

/// Get one of the customer's orders
async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = if user.is_admin() {
        state.services.orders.get_order(id).await?
    } else {
        state
            .services
            .orders
            .get_order_for_customer(id, user.id)
            .await?
    };

    Ok(Json(ApiResponse::success(
        state.services.orders.to_response(order).await?,
    )))
}

/// Cancel an order before it reaches a terminal state
async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    if !user.is_admin() {
        state
            .services
            .orders
            .get_order_for_customer(id, user.id)
            .await?;
    }

    let cancelled = state.services.orders.cancel_order(id).await?;
    Ok(Json(ApiResponse::success(
        state.services.orders.to_response(cancelled).await?,
    )))
}

/// List all orders (admin)
async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<OrderStatusFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }

    let (page, per_page) = params.sanitized();
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter.status, page, per_page)
        .await?;

    let mut items = Vec::with_capacity(orders.len());
    for order in orders {
        items.push(state.services.orders.to_response(order).await?);
    }

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    })))
}

/// Progress an order through fulfillment (admin)
async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }

    let updated = state
        .services
        .orders
        .update_status(id, payload.status)
        .await?;

    Ok(Json(ApiResponse::success(
        state.services.orders.to_response(updated).await?,
    )))
}
