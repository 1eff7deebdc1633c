use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{errors::ServiceError, services::payments::GatewayNotification, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Gateway payment notification. A success ack is returned only when
/// processing truly completed; any internal failure propagates as a 500 ack
/// so the gateway's redelivery mechanism engages.
#[utoipa::path(
    post,
    path = "/api/mp-webhook",
    request_body = GatewayNotification,
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 500, description = "Processing failed; gateway will redeliver", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn mp_webhook(
    State(state): State<AppState>,
    Json(notification): Json<GatewayNotification>,
) -> Result<Json<WebhookAck>, ServiceError> {
    state
        .services
        .payments
        .reconcile_notification(notification)
        .await?;
    Ok(Json(WebhookAck { received: true }))
}
