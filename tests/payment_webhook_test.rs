//! Webhook reconciliation: authoritative-fetch semantics, status mapping,
//! silent no-ops and the deliberate lack of redelivery idempotency.

mod common;

use common::TestApp;
use floreria_api::services::orders::{CreateOrderRequest, OrderItemInput};
use floreria_api::services::payments::GatewayNotification;
use rust_decimal_macros::dec;
use serde_json::json;

fn notification(payment_id: i64) -> GatewayNotification {
    serde_json::from_value(json!({
        "type": "payment",
        "action": "payment.updated",
        "data": { "id": payment_id }
    }))
    .expect("notification payload")
}

async fn place_gateway_order(app: &TestApp) -> floreria_api::services::orders::OrderResponse {
    let request = CreateOrderRequest {
        customer_name: "Bruno Tejada".to_string(),
        customer_email: "bruno@example.com".to_string(),
        customer_phone: "+5491155550002".to_string(),
        delivery_address: "Calle Falsa 123".to_string(),
        note: None,
        payment_method: "mercadopago".to_string(),
        items: vec![OrderItemInput {
            name: "Box dulce".to_string(),
            unit_price: dec!(2900),
            quantity: 1,
        }],
    };
    app.services
        .payments
        .place_order(request)
        .await
        .expect("order placed")
        .order
}

#[tokio::test]
async fn approved_notification_confirms_order_and_sends_both_emails() {
    let app = TestApp::new().await;
    let order = place_gateway_order(&app).await;
    assert_eq!(app.mailer.sent_count(), 0);

    app.gateway
        .register_payment("777", "approved", Some(&order.order_number));

    app.services
        .payments
        .reconcile_notification(notification(777))
        .await
        .expect("reconciled");

    let updated = app
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("lookup")
        .expect("order exists");
    assert_eq!(updated.payment_status, "approved");
    assert_eq!(updated.order_status, "confirmed");
    assert_eq!(updated.payment_id.as_deref(), Some("777"));

    // Exactly one confirmation + one admin alert for this single delivery.
    let recipients = app.mailer.recipients();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.contains(&"bruno@example.com".to_string()));
    assert!(recipients.contains(&"admin@floreria.example".to_string()));
}

#[tokio::test]
async fn rejected_notification_updates_payment_only_and_sends_nothing() {
    let app = TestApp::new().await;
    let order = place_gateway_order(&app).await;

    app.gateway
        .register_payment("778", "rejected", Some(&order.order_number));

    app.services
        .payments
        .reconcile_notification(notification(778))
        .await
        .expect("reconciled");

    let updated = app
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("lookup")
        .expect("order exists");
    assert_eq!(updated.payment_status, "rejected");
    assert_eq!(updated.order_status, "pending");
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn unmapped_gateway_status_stays_pending() {
    let app = TestApp::new().await;
    let order = place_gateway_order(&app).await;

    app.gateway
        .register_payment("779", "in_process", Some(&order.order_number));

    app.services
        .payments
        .reconcile_notification(notification(779))
        .await
        .expect("reconciled");

    let updated = app
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("lookup")
        .expect("order exists");
    assert_eq!(updated.payment_status, "pending");
    assert_eq!(updated.order_status, "pending");
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn unknown_order_reference_is_a_silent_noop() {
    let app = TestApp::new().await;
    let order = place_gateway_order(&app).await;

    app.gateway.register_payment("780", "approved", Some("#9999"));

    // Still acks success: the handler performs no mutation and sends nothing.
    app.services
        .payments
        .reconcile_notification(notification(780))
        .await
        .expect("acked");

    let untouched = app
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("lookup")
        .expect("order exists");
    assert_eq!(untouched.payment_status, "pending");
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn non_payment_notification_is_ignored() {
    let app = TestApp::new().await;
    place_gateway_order(&app).await;

    let merchant_order: GatewayNotification = serde_json::from_value(json!({
        "type": "merchant_order",
        "data": { "id": 1 }
    }))
    .expect("payload");

    app.services
        .payments
        .reconcile_notification(merchant_order)
        .await
        .expect("acked");

    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn gateway_lookup_failure_propagates_for_redelivery() {
    use assert_matches::assert_matches;
    use floreria_api::errors::ServiceError;

    let app = TestApp::new().await;
    place_gateway_order(&app).await;

    // No payment registered under this id: the authoritative fetch fails and
    // the error must surface so the gateway's retry mechanism engages.
    let result = app
        .services
        .payments
        .reconcile_notification(notification(999))
        .await;

    assert_matches!(result, Err(ServiceError::ExternalServiceError(_)));
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn redelivered_approval_sends_emails_again() {
    let app = TestApp::new().await;
    let order = place_gateway_order(&app).await;

    app.gateway
        .register_payment("781", "approved", Some(&order.order_number));

    for _ in 0..2 {
        app.services
            .payments
            .reconcile_notification(notification(781))
            .await
            .expect("reconciled");
    }

    // Not idempotent by design: each delivery re-sends both emails. This
    // asserts the current behavior rather than suppression.
    assert_eq!(app.mailer.sent_count(), 4);
}
