use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::ServiceError,
    services::leads::{LeadResponse, Segment, SubscribeRequest},
    AppState,
};

/// Newsletter signup result: either the stored lead (new signup) or the soft
/// "already subscribed" acknowledgment for a duplicate email.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<LeadResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub segment: Segment,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignResponse {
    pub success: bool,
    pub sent: u32,
}

#[utoipa::path(
    post,
    path = "/api/leads",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Lead stored or already subscribed", body = SubscribeResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Leads"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let outcome = state
        .services
        .leads
        .upsert(&request.name, &request.email, "newsletter", &["newsletter"])
        .await?;

    if outcome.created {
        state
            .services
            .notifications
            .send_welcome(&outcome.lead)
            .await?;
        Ok(Json(SubscribeResponse {
            success: true,
            lead: Some(outcome.lead),
            message: None,
        }))
    } else {
        Ok(Json(SubscribeResponse {
            success: true,
            lead: None,
            message: Some("already subscribed".to_string()),
        }))
    }
}

#[utoipa::path(
    get,
    path = "/api/leads",
    responses(
        (status = 200, description = "All leads, newest first", body = [LeadResponse])
    ),
    tag = "Leads"
)]
pub async fn list_leads(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeadResponse>>, ServiceError> {
    let leads = state.services.leads.list_leads().await?;
    Ok(Json(leads))
}

/// Bulk send to a segment. Sends are sequential with no partial-failure
/// isolation: a failure mid-run fails the whole call and the count of
/// messages already delivered is not reported.
#[utoipa::path(
    post,
    path = "/api/leads/campaign",
    request_body = CampaignRequest,
    responses(
        (status = 200, description = "Campaign fully delivered", body = CampaignResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 502, description = "A send failed; partial progress is not reported", body = crate::errors::ErrorResponse)
    ),
    tag = "Leads"
)]
pub async fn send_campaign(
    State(state): State<AppState>,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<CampaignResponse>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let leads = state.services.leads.segment_leads(request.segment).await?;
    let sent = state
        .services
        .notifications
        .send_campaign(&leads, &request.subject, &request.message)
        .await?;

    Ok(Json(CampaignResponse {
        success: true,
        sent,
    }))
}
