use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{errors::ServiceError, services::chats::ChatResponse, AppState};

/// Latest conversations returned by GET /api/chats.
const RECENT_CHATS_LIMIT: u64 = 50;

/// Channel verification handshake parameters.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Inbound webhook payload from the messaging channel. Only text messages are
/// processed; delivery-status callbacks arrive on the same endpoint and are
/// acked without side effects.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct WhatsAppWebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct WebhookContact {
    pub profile: Option<ContactProfile>,
    pub wa_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct InboundMessage {
    pub from: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<TextBody>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct TextBody {
    pub body: Option<String>,
}

/// Webhook verification handshake: echo the challenge when the shared token
/// matches the configured one.
#[utoipa::path(
    get,
    path = "/api/whatsapp-webhook",
    params(VerifyParams),
    responses(
        (status = 200, description = "Challenge echoed", body = String),
        (status = 403, description = "Verification token mismatch")
    ),
    tag = "Chats"
)]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected = state.config.whatsapp_verify_token.as_deref();

    match (params.mode.as_deref(), params.verify_token.as_deref(), expected) {
        (Some("subscribe"), Some(token), Some(configured)) if token == configured => {
            info!("Webhook verification handshake accepted");
            (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
        }
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/whatsapp-webhook",
    request_body = WhatsAppWebhookPayload,
    responses(
        (status = 200, description = "Message processed (empty ack)"),
        (status = 500, description = "Processing failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Chats"
)]
pub async fn receive_message(
    State(state): State<AppState>,
    Json(payload): Json<WhatsAppWebhookPayload>,
) -> Result<Json<Value>, ServiceError> {
    let Some(value) = payload
        .entry
        .first()
        .and_then(|entry| entry.changes.first())
        .map(|change| &change.value)
    else {
        return Ok(Json(json!({})));
    };

    let contact_name = value
        .contacts
        .first()
        .and_then(|contact| contact.profile.as_ref())
        .and_then(|profile| profile.name.as_deref());

    let Some(message) = value
        .messages
        .iter()
        .find(|m| m.kind.as_deref() == Some("text"))
    else {
        // Delivery-status callback or unsupported message type
        return Ok(Json(json!({})));
    };

    let (Some(from), Some(text)) = (
        message.from.as_deref(),
        message.text.as_ref().and_then(|t| t.body.as_deref()),
    ) else {
        return Ok(Json(json!({})));
    };

    state
        .services
        .chats
        .handle_inbound(from, contact_name, text)
        .await?;

    Ok(Json(json!({})))
}

#[utoipa::path(
    get,
    path = "/api/chats",
    responses(
        (status = 200, description = "Latest 50 conversations", body = [ChatResponse])
    ),
    tag = "Chats"
)]
pub async fn list_chats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatResponse>>, ServiceError> {
    let chats = state.services.chats.list_recent(RECENT_CHATS_LIMIT).await?;
    Ok(Json(chats))
}
