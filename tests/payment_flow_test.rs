mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use storefront_api::{
    entities::{order::OrderStatus, user::UserRole},
    errors::ServiceError,
    services::orders::{CreateOrderInput, OrderItemInput},
};

async fn seed_order(app: &TestApp, user_id: Uuid) -> Uuid {
    let (_, variant_id) = app
        .seed_variant_product("Lounge Chair", "CHAIR-01", dec!(100.00), 10)
        .await;
    app.state
        .services
        .orders
        .create(CreateOrderInput {
            user_id,
            items: vec![OrderItemInput {
                product_id: None,
                variant_id: Some(variant_id),
                quantity: 2,
            }],
            shipping_address: json!({"street": "Calle 1"}),
            billing_address: json!({"street": "Calle 1"}),
            notes: None,
        })
        .await
        .unwrap()
        .order
        .id
}

#[tokio::test]
async fn create_payment_persists_intent() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), Some("buyer@example.com".into()), None)
        .await
        .unwrap();

    assert_eq!(created.payment.status, "pending");
    assert_eq!(created.payment.gateway, "stripe");
    assert_eq!(created.payment.amount, dec!(236.00));
    assert!(created.payment.gateway_id.as_deref().unwrap().starts_with("pi_test_"));
    assert!(created.client_secret.as_deref().unwrap().ends_with("_secret"));
}

#[tokio::test]
async fn create_payment_for_missing_order_fails() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .payments
        .create_payment(Uuid::new_v4(), "USD".into(), None, None)
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn succeeded_webhook_advances_order() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), None, None)
        .await
        .unwrap();
    let intent_id = created.payment.gateway_id.clone().unwrap();

    app.gateway.set_intent_status(&intent_id, "succeeded");

    let (status, _) = app
        .send_webhook(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": intent_id}}
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let payment = app.state.services.payments.get(created.payment.id).await.unwrap();
    assert_eq!(payment.status, "succeeded");

    let order = app.state.services.orders.get(order_id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn replayed_webhook_event_is_not_applied_twice() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), None, None)
        .await
        .unwrap();
    let intent_id = created.payment.gateway_id.clone().unwrap();

    app.gateway.set_intent_status(&intent_id, "succeeded");
    let event = json!({
        "id": "evt_replay",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": intent_id}}
    });

    let (status, _) = app.send_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    // The gateway moves on, but the replayed event id must be ignored.
    app.gateway.set_intent_status(&intent_id, "canceled");
    let (status, _) = app.send_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    let payment = app.state.services.payments.get(created.payment.id).await.unwrap();
    assert_eq!(payment.status, "succeeded");
}

#[tokio::test]
async fn unsigned_webhook_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/payments/webhook",
            None,
            Some(json!({"id": "evt_x", "type": "payment_intent.succeeded"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unhandled_webhook_type_is_accepted() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send_webhook(&json!({
            "id": "evt_2",
            "type": "customer.created",
            "data": {"object": {"id": "cus_1"}}
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_payment_does_not_advance_order() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), None, None)
        .await
        .unwrap();
    let intent_id = created.payment.gateway_id.clone().unwrap();

    app.gateway.set_intent_status(&intent_id, "requires_payment_method");
    let confirmed = app
        .state
        .services
        .payments
        .confirm_payment(&intent_id)
        .await
        .unwrap();
    assert_eq!(confirmed.gateway_status, "requires_payment_method");

    let order = app.state.services.orders.get(order_id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn full_refund_cancels_order() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), None, None)
        .await
        .unwrap();
    let intent_id = created.payment.gateway_id.clone().unwrap();

    let refunded = app
        .state
        .services
        .payments
        .refund_payment(&intent_id, None)
        .await
        .unwrap();
    assert_eq!(refunded.status, "refunded");
    assert_eq!(refunded.metadata["refund"]["status"], "succeeded");
    assert_eq!(refunded.metadata["refund"]["amount"], 23600);

    let order = app.state.services.orders.get(order_id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn partial_refund_keeps_order_under_default_policy() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register_user("buyer@example.com", UserRole::Customer).await;
    let order_id = seed_order(&app, user_id).await;

    let created = app
        .state
        .services
        .payments
        .create_payment(order_id, "USD".into(), None, None)
        .await
        .unwrap();
    let intent_id = created.payment.gateway_id.clone().unwrap();

    let refunded = app
        .state
        .services
        .payments
        .refund_payment(&intent_id, Some(dec!(50.00)))
        .await
        .unwrap();
    assert_eq!(refunded.status, "refunded");
    assert_eq!(refunded.metadata["refund"]["amount"], 5000);

    // Default policy only cancels on a full refund.
    let order = app.state.services.orders.get(order_id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn refund_of_unknown_payment_fails() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .payments
        .refund_payment("pi_missing", None)
        .await;
    assert!(result.is_err());
}
