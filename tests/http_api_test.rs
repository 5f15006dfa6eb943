//! Router-level tests: response envelopes, status codes and bearer auth.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{order_input, TestApp, TestGateway};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use storefront_api::{
    api_v1_routes,
    auth::{AuthVerifier, Claims},
    config::AppConfig,
    entities::PaymentMethod,
    handlers::AppServices,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "integration_test_secret_key_that_is_long_enough";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "development".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        currency: "USD".to_string(),
        delivery_charge: 10.0,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 10,
        redirect_gateway: None,
        signed_gateway: None,
    }
}

fn bearer_token(user_id: Uuid, role: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: None,
        role: role.to_string(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn router_for(app: &TestApp) -> Router {
    let services = AppServices {
        catalog: app.catalog.clone(),
        cart: app.cart.clone(),
        wishlist: app.wishlist.clone(),
        orders: app.orders.clone(),
        reconciliation: app.reconciliation.clone(),
    };

    let state = AppState {
        db: app.db.clone(),
        config: test_config(),
        event_sender: (*app.event_sender).clone(),
        auth: AuthVerifier::new(JWT_SECRET),
        services,
    };

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn product_listing_is_public_and_enveloped() {
    let app = TestApp::new().await;
    app.seed_product("Shirt", dec!(100)).await;
    let router = router_for(&app);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Shirt");
}

#[tokio::test]
async fn cart_requires_a_bearer_token() {
    let app = TestApp::new().await;
    let router = router_for(&app);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/carts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let customer = Uuid::new_v4();
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/carts")
                .header("authorization", format!("Bearer {}", bearer_token(customer, "customer")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["cart"]["customer_id"], customer.to_string());
}

#[tokio::test]
async fn admin_routes_reject_customers() {
    let app = TestApp::new().await;
    let router = router_for(&app);

    let payload = json!({
        "name": "Shirt",
        "price": "100",
        "currency": "USD"
    });

    let request = |role: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/admin/products")
            .header("content-type", "application/json")
            .header(
                "authorization",
                format!("Bearer {}", bearer_token(Uuid::new_v4(), role)),
            )
            .body(Body::from(payload.to_string()))
            .unwrap()
    };

    let response = router.clone().oneshot(request("customer")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router.oneshot(request("admin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn failed_confirmation_returns_payment_required_envelope() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 1)], PaymentMethod::Redirect),
        )
        .await
        .unwrap();

    app.gateway.verify_result.store(false, Ordering::SeqCst);
    let router = router_for(&app);

    let payload = json!({
        "provider": "redirect",
        "session_id": TestGateway::reference_for(outcome.order.id),
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/orders/confirm")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cart is unchanged"));
}

#[tokio::test]
async fn successful_confirmation_returns_success_envelope() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 1)], PaymentMethod::Redirect),
        )
        .await
        .unwrap();
    let router = router_for(&app);

    let payload = json!({
        "provider": "redirect",
        "session_id": TestGateway::reference_for(outcome.order.id),
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/orders/confirm")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["newly_confirmed"], true);
    assert_eq!(body["data"]["order"]["payment_state"], "paid");
    assert_eq!(body["data"]["order"]["status"], "placed");
}
