use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument};

use crate::errors::ServiceError;

/// Outbound side of the messaging channel: deliver one text message to one
/// contact. Inbound traffic arrives through the webhook handler instead.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ServiceError>;
}

/// WhatsApp Cloud API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    phone_id: Option<String>,
}

impl WhatsAppClient {
    pub fn new(
        token: Option<String>,
        phone_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            base_url: base_url.into(),
            token,
            phone_id,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ServiceError> {
        match (self.token.as_deref(), self.phone_id.as_deref()) {
            (Some(token), Some(phone_id)) => Ok((token, phone_id)),
            _ => Err(ServiceError::ExternalServiceError(
                "WhatsApp credentials are not configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl MessagingChannel for WhatsAppClient {
    #[instrument(skip(self, body))]
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        let (token, phone_id) = self.credentials()?;

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .client
            .post(format!("{}/{}/messages", self.base_url, phone_id))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "message delivery failed with {}: {}",
                status, detail
            )));
        }

        info!(to = %to, "WhatsApp message delivered");
        Ok(())
    }
}
