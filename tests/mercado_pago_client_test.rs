//! Wire-level tests for the MercadoPago client against a mock HTTP server.


use floreria_api::integrations::mercado_pago::{
    MercadoPagoClient, PaymentGateway, PreferenceItem, PreferenceRequest,
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn preference_request() -> PreferenceRequest {
    PreferenceRequest {
        items: vec![PreferenceItem {
            title: "Ramo de 12 rosas".to_string(),
            unit_price: dec!(1800),
            quantity: 1,
        }],
        payer_name: "Ana Flores".to_string(),
        payer_email: "ana@example.com".to_string(),
        external_reference: "#0001".to_string(),
        success_url: "https://shop.example/checkout/success".to_string(),
        failure_url: "https://shop.example/checkout/failure".to_string(),
        pending_url: "https://shop.example/checkout/pending".to_string(),
        notification_url: "https://api.shop.example/api/mp-webhook".to_string(),
    }
}

#[tokio::test]
async fn create_preference_posts_bearer_token_and_parses_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/preferences"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "123456-abc",
            "init_point": "https://www.mercadopago.com/init/123456-abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MercadoPagoClient::new(Some("test-token".to_string()), server.uri());

    let preference = client
        .create_preference(preference_request())
        .await
        .expect("preference created");

    assert_eq!(preference.id, "123456-abc");
    assert_eq!(
        preference.init_point,
        "https://www.mercadopago.com/init/123456-abc"
    );
}

#[tokio::test]
async fn get_payment_reads_the_authoritative_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/777"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 777,
            "status": "approved",
            "external_reference": "#0001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MercadoPagoClient::new(Some("test-token".to_string()), server.uri());

    let payment = client.get_payment("777").await.expect("payment fetched");

    assert_eq!(payment.id, "777");
    assert_eq!(payment.status, "approved");
    assert_eq!(payment.external_reference.as_deref(), Some("#0001"));
}

#[tokio::test]
async fn gateway_error_status_surfaces_as_external_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/778"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = MercadoPagoClient::new(Some("test-token".to_string()), server.uri());

    assert!(client.get_payment("778").await.is_err());
}

#[tokio::test]
async fn missing_credential_fails_before_any_request() {
    // No mock server at all: the call must fail at invocation, not at startup.
    let client = MercadoPagoClient::new(None, "http://127.0.0.1:9");

    assert!(client.create_preference(preference_request()).await.is_err());
    assert!(client.get_payment("777").await.is_err());
}
