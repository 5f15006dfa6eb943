//! Integration tests for the cart store invariants: positive-quantity lines
//! only, single line per product, idempotent clearing.

mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn cart_is_created_lazily_and_starts_empty() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let cart = app.cart.get_cart(customer).await.unwrap();
    assert_eq!(cart.cart.customer_id, customer);
    assert!(cart.items.is_empty());

    // A second read reuses the same cart row
    let again = app.cart.get_cart(customer).await.unwrap();
    assert_eq!(cart.cart.id, again.cart.id);
}

#[tokio::test]
async fn set_quantity_upserts_a_single_line_per_product() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;

    let cart = app.cart.set_quantity(customer, shirt.id, 2).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);

    let cart = app.cart.set_quantity(customer, shirt.id, 5).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
}

#[tokio::test]
async fn zero_or_negative_quantity_removes_the_line() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;
    let cap = app.seed_product("Cap", dec!(49.50)).await;

    app.cart.set_quantity(customer, shirt.id, 2).await.unwrap();
    app.cart.set_quantity(customer, cap.id, 1).await.unwrap();

    let cart = app.cart.set_quantity(customer, shirt.id, 0).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, cap.id);

    let cart = app.cart.set_quantity(customer, cap.id, -3).await.unwrap();
    assert!(cart.items.is_empty());

    // No zero-quantity row is ever stored
    let cart = app.cart.get_cart(customer).await.unwrap();
    assert!(cart.items.iter().all(|item| item.quantity > 0));
}

#[tokio::test]
async fn removing_an_absent_line_succeeds_silently() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let cart = app
        .cart
        .set_quantity(customer, Uuid::new_v4(), 0)
        .await
        .unwrap();
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn carting_an_unknown_or_inactive_product_fails() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let err = app
        .cart
        .set_quantity(customer, Uuid::new_v4(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    app.catalog.delete_product(shirt.id).await.unwrap();

    let err = app
        .cart
        .set_quantity(customer, shirt.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn clear_is_idempotent() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;

    // Clearing a cart that was never created succeeds
    app.cart.clear(customer).await.unwrap();

    app.cart.set_quantity(customer, shirt.id, 3).await.unwrap();
    app.cart.clear(customer).await.unwrap();
    assert!(app.cart.get_cart(customer).await.unwrap().items.is_empty());

    // Clearing an already-empty cart succeeds silently
    app.cart.clear(customer).await.unwrap();
}

#[tokio::test]
async fn carts_are_isolated_per_customer() {
    let app = TestApp::new().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let shirt = app.seed_product("Shirt", dec!(100)).await;

    app.cart.set_quantity(first, shirt.id, 2).await.unwrap();
    app.cart.set_quantity(second, shirt.id, 7).await.unwrap();

    app.cart.clear(first).await.unwrap();

    assert!(app.cart.get_cart(first).await.unwrap().items.is_empty());
    let second_cart = app.cart.get_cart(second).await.unwrap();
    assert_eq!(second_cart.items.len(), 1);
    assert_eq!(second_cart.items[0].quantity, 7);
}
