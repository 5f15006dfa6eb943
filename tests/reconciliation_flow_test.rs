//! Integration tests for the order placement / payment confirmation flow:
//! COD immediacy, server-side amount computation, failed provider
//! transactions, idempotent confirmation, failed verification, and
//! concurrent duplicate callbacks.

mod common;

use common::{order_input, TestApp, TestGateway, DELIVERY_CHARGE};
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use storefront_api::{
    entities::{OrderStatus, PaymentMethod, PaymentState},
    errors::ServiceError,
    gateways::{CallbackPayload, GatewayRegistry, PaymentGateway, SignedGateway},
};
use uuid::Uuid;

#[tokio::test]
async fn cod_order_is_placed_immediately_with_no_gateway_interaction() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    let cap = app.seed_product("Cap", dec!(49.50)).await;

    app.cart.set_quantity(customer, shirt.id, 2).await.unwrap();
    app.cart.set_quantity(customer, cap.id, 1).await.unwrap();

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 2), (cap.id, 1)], PaymentMethod::Cod),
        )
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Placed);
    assert_eq!(outcome.order.payment_state, PaymentState::Unpaid);
    assert!(outcome.client_payload.is_none());
    assert_eq!(outcome.order.total_amount, dec!(249.50) + DELIVERY_CHARGE);

    // Cart is emptied in the same call
    let cart = app.cart.get_cart(customer).await.unwrap();
    assert!(cart.items.is_empty());

    // No gateway was touched
    assert_eq!(app.gateway.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.gateway.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn total_amount_is_computed_from_catalog_prices() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let a = app.seed_product("A", dec!(25.25)).await;
    let b = app.seed_product("B", dec!(3.50)).await;

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(a.id, 3), (b.id, 4)], PaymentMethod::Cod),
        )
        .await
        .unwrap();

    // 3 * 25.25 + 4 * 3.50 + delivery
    assert_eq!(
        outcome.order.total_amount,
        dec!(75.75) + dec!(14.00) + DELIVERY_CHARGE
    );
    assert_eq!(outcome.order.delivery_charge, DELIVERY_CHARGE);

    let line_sum: rust_decimal::Decimal = outcome
        .order
        .items
        .iter()
        .map(|item| item.line_total)
        .sum();
    assert_eq!(outcome.order.total_amount, line_sum + DELIVERY_CHARGE);
}

#[tokio::test]
async fn empty_or_unknown_items_are_rejected() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let err = app
        .reconciliation
        .place_order(customer, order_input(vec![], PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrder(_)));

    let err = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(Uuid::new_v4(), 1)], PaymentMethod::Cod),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrder(_)));

    // Nothing was persisted
    let (orders, total) = app.orders.list_orders(None, 1, 20).await.unwrap();
    assert_eq!(total, 0);
    assert!(orders.is_empty());
}

#[tokio::test]
async fn failed_transaction_creation_leaves_no_created_order() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    app.gateway.fail_create.store(true, Ordering::SeqCst);

    let err = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 1)], PaymentMethod::Redirect),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayUnavailable(_)));

    // No `created` row survives that a later callback could pay
    let (_, created_count) = app
        .orders
        .list_orders(Some(OrderStatus::Created), 1, 20)
        .await
        .unwrap();
    assert_eq!(created_count, 0);

    let (orders, total) = app.orders.list_orders(None, 1, 20).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].status, OrderStatus::Cancelled);
    assert!(orders[0].provider_reference.is_none());
}

#[tokio::test]
async fn gateway_order_confirms_once_and_clears_cart_once() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    app.cart.set_quantity(customer, shirt.id, 2).await.unwrap();

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 2)], PaymentMethod::Redirect),
        )
        .await
        .unwrap();

    let order_id = outcome.order.id;
    assert_eq!(outcome.order.status, OrderStatus::Created);
    assert_eq!(
        outcome.order.provider_reference.as_deref(),
        Some(TestGateway::reference_for(order_id).as_str())
    );
    assert!(outcome.client_payload.is_some());

    // Cart is untouched until the payment is confirmed
    assert_eq!(app.cart.get_cart(customer).await.unwrap().items.len(), 1);
    app.drain_events().await;

    // First confirmation performs the transition and the side effects
    let confirmed = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(order_id))
        .await
        .unwrap();
    assert!(confirmed.newly_confirmed);
    assert_eq!(confirmed.order.status, OrderStatus::Placed);
    assert_eq!(confirmed.order.payment_state, PaymentState::Paid);
    assert!(app.cart.get_cart(customer).await.unwrap().items.is_empty());

    // Duplicate delivery (customer refreshing the success page) is a no-op
    let duplicate = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(order_id))
        .await
        .unwrap();
    assert!(!duplicate.newly_confirmed);
    assert_eq!(duplicate.order.payment_state, PaymentState::Paid);

    assert_eq!(app.count_cart_cleared().await, 1);
}

#[tokio::test]
async fn failed_verification_cancels_order_and_keeps_cart() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    let cap = app.seed_product("Cap", dec!(49.50)).await;
    app.cart.set_quantity(customer, shirt.id, 2).await.unwrap();
    app.cart.set_quantity(customer, cap.id, 1).await.unwrap();

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 2), (cap.id, 1)], PaymentMethod::Redirect),
        )
        .await
        .unwrap();

    app.gateway.verify_result.store(false, Ordering::SeqCst);

    let err = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(outcome.order.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PaymentFailed(_)));

    let order = app.orders.get_order(outcome.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_state, PaymentState::Unpaid);

    // Cart is exactly as it was before checkout
    let cart = app.cart.get_cart(customer).await.unwrap();
    let mut quantities: Vec<(Uuid, i32)> = cart
        .items
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();
    quantities.sort();
    let mut expected = vec![(shirt.id, 2), (cap.id, 1)];
    expected.sort();
    assert_eq!(quantities, expected);

    // A repeated failure callback stays a typed failure, not a crash
    let err = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(outcome.order.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PaymentFailed(_)));
}

#[tokio::test]
async fn late_failure_callback_cannot_unpay_an_order() {
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

    app.reconciliation
        .confirm_payment(TestGateway::callback_for(outcome.order.id))
        .await
        .unwrap();

    // A stale verified:false delivery arrives after the order was paid
    app.gateway.verify_result.store(false, Ordering::SeqCst);
    let duplicate = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(outcome.order.id))
        .await
        .unwrap();

    assert!(!duplicate.newly_confirmed);
    assert_eq!(duplicate.order.payment_state, PaymentState::Paid);
    assert_eq!(duplicate.order.status, OrderStatus::Placed);
}

#[tokio::test]
async fn concurrent_confirmations_clear_cart_exactly_once() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    app.cart.set_quantity(customer, shirt.id, 1).await.unwrap();

    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 1)], PaymentMethod::Redirect),
        )
        .await
        .unwrap();
    let order_id = outcome.order.id;
    app.drain_events().await;

    let (first, second) = tokio::join!(
        app.reconciliation
            .confirm_payment(TestGateway::callback_for(order_id)),
        app.reconciliation
            .confirm_payment(TestGateway::callback_for(order_id)),
    );

    let first = first.unwrap();
    let second = second.unwrap();

    // Exactly one of the two performed the transition
    assert_eq!(
        [first.newly_confirmed, second.newly_confirmed]
            .iter()
            .filter(|&&won| won)
            .count(),
        1
    );

    let order = app.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.payment_state, PaymentState::Paid);
    assert_eq!(order.status, OrderStatus::Placed);

    assert_eq!(app.count_cart_cleared().await, 1);
}

#[tokio::test]
async fn callback_for_unknown_order_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn callback_reference_must_match_the_orders_payment_attempt() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    // An order with no provider transaction on record (as COD orders, or
    // orders whose transaction creation never happened, look)
    let order = app
        .orders
        .create_order(
            customer,
            vec![],
            serde_json::json!({"city": "Springfield"}),
            PaymentMethod::Redirect,
            dec!(110),
            DELIVERY_CHARGE,
            "USD".to_string(),
        )
        .await
        .unwrap();

    let err = app
        .reconciliation
        .confirm_payment(TestGateway::callback_for(order.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let order = app.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.payment_state, PaymentState::Unpaid);
}

#[tokio::test]
async fn mis_signed_callback_never_marks_paid() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let shirt = app.seed_product("Shirt", dec!(100)).await;
    let outcome = app
        .reconciliation
        .place_order(
            customer,
            order_input(vec![(shirt.id, 1)], PaymentMethod::Signed),
        )
        .await
        .unwrap();

    // Swap in the real signature-checking adapter for confirmation; the
    // signature check fails before any provider call is attempted.
    let signed_gateway = SignedGateway::new(storefront_api::config::SignedGatewayConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        key_id: "key_test_id".to_string(),
        key_secret: "key_test_secret".to_string(),
        timeout_secs: 1,
    });
    let reconciliation = app.reconciliation_with(GatewayRegistry::new(
        None,
        Some(std::sync::Arc::new(signed_gateway) as std::sync::Arc<dyn PaymentGateway>),
    ));

    let err = reconciliation
        .confirm_payment(CallbackPayload::Signed {
            provider_order_id: TestGateway::reference_for(outcome.order.id),
            provider_payment_id: Some("pay_123".to_string()),
            signature: Some("forged".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SignatureInvalid));

    let order = app.orders.get_order(outcome.order.id).await.unwrap();
    assert_eq!(order.payment_state, PaymentState::Unpaid);
}
