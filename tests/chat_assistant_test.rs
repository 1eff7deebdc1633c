//! Conversational assistant: bounded context window over unbounded stored
//! history, reply forwarding and the webhook surface.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::TestApp;
use serde_json::json;
use tower::ServiceExt;

const PHONE: &str = "5491155550003";

#[tokio::test]
async fn context_window_is_capped_at_twenty_turns() {
    let app = TestApp::new().await;

    // First message: the window holds exactly the one user turn.
    app.services
        .chats
        .handle_inbound(PHONE, Some("Diego"), "Hola!")
        .await
        .expect("inbound handled");
    let (_, first_window) = app.model.last_context().expect("model called");
    assert_eq!(first_window.len(), 1);

    // 24 more exchanges: stored history keeps growing, the window does not.
    for i in 0..24 {
        app.services
            .chats
            .handle_inbound(PHONE, None, &format!("Tienen stock? ({})", i))
            .await
            .expect("inbound handled");
    }

    let (_, last_window) = app.model.last_context().expect("model called");
    assert_eq!(last_window.len(), 20);

    // Stored history retained every turn: 25 user + 25 assistant.
    let chats = app.services.chats.list_recent(50).await.expect("chats");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].messages.len(), 50);
    assert_eq!(chats[0].contact_name.as_deref(), Some("Diego"));
}

#[tokio::test]
async fn reply_is_persisted_and_forwarded_to_the_channel() {
    let app = TestApp::new().await;
    app.model.set_reply("Tenemos ramos desde $950.");

    let reply = app
        .services
        .chats
        .handle_inbound(PHONE, None, "Que precios tienen?")
        .await
        .expect("inbound handled");
    assert_eq!(reply, "Tenemos ramos desde $950.");

    let sent = app.channel.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(PHONE.to_string(), reply.clone())]);

    let chats = app.services.chats.list_recent(50).await.expect("chats");
    let messages = &chats[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "Que precios tienen?");
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].content, reply);
}

#[tokio::test]
async fn system_prompt_grounds_catalog_and_shipping_policy() {
    let app = TestApp::new().await;

    app.services
        .chats
        .handle_inbound(PHONE, None, "Hola")
        .await
        .expect("inbound handled");

    let (system_prompt, _) = app.model.last_context().expect("model called");
    assert!(system_prompt.contains("Ramo de 12 rosas"));
    assert!(system_prompt.contains("$150"));
    assert!(system_prompt.contains("$2000"));
}

#[tokio::test]
async fn recent_chats_order_by_latest_activity() {
    let app = TestApp::new().await;

    app.services
        .chats
        .handle_inbound("111", None, "Primero")
        .await
        .expect("inbound handled");
    app.services
        .chats
        .handle_inbound("222", None, "Segundo")
        .await
        .expect("inbound handled");

    let chats = app.services.chats.list_recent(50).await.expect("chats");
    assert_eq!(chats.len(), 2);
    assert!(chats[0].updated_at >= chats[1].updated_at);
}

#[tokio::test]
async fn webhook_processes_text_messages_and_acks_empty() {
    let app = TestApp::new().await;

    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "value": {
                    "contacts": [{ "profile": { "name": "Eva" }, "wa_id": PHONE }],
                    "messages": [{
                        "from": PHONE,
                        "type": "text",
                        "text": { "body": "Hacen envios hoy?" }
                    }]
                }
            }]
        }]
    });

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/whatsapp-webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.model.call_count(), 1);
    assert_eq!(app.channel.sent_count(), 1);
}

#[tokio::test]
async fn status_callbacks_are_acked_without_side_effects() {
    let app = TestApp::new().await;

    let payload = json!({
        "entry": [{
            "changes": [{
                "value": {
                    "statuses": [{ "id": "wamid.X", "status": "delivered" }]
                }
            }]
        }]
    });

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/whatsapp-webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.model.call_count(), 0);
    assert_eq!(app.channel.sent_count(), 0);
}

#[tokio::test]
async fn verification_handshake_echoes_challenge_for_matching_token() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/whatsapp-webhook?hub.mode=subscribe&hub.verify_token=verify-secret&hub.challenge=12345")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"12345");

    let rejected = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/whatsapp-webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
}
