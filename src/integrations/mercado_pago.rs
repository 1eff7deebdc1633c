use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

use crate::errors::ServiceError;

/// Line item submitted to the hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Everything the gateway needs to build a hosted checkout session.
#[derive(Debug, Clone)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer_name: String,
    pub payer_email: String,
    /// Correlation key echoed back in payment records; set to the order number.
    pub external_reference: String,
    pub success_url: String,
    pub failure_url: String,
    pub pending_url: String,
    pub notification_url: String,
}

/// Hosted-checkout session handle returned by the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutPreference {
    pub id: String,
    pub init_point: String,
}

/// Authoritative payment record fetched from the gateway. Reconciliation
/// always reads this, never the webhook payload's own status field.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError>;

    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, ServiceError>;
}

/// MercadoPago REST client.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(access_token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            base_url: base_url.into(),
            access_token,
        }
    }

    fn token(&self) -> Result<&str, ServiceError> {
        self.access_token.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError(
                "MercadoPago access token is not configured".to_string(),
            )
        })
    }
}

#[derive(Serialize)]
struct CreatePreferenceBody<'a> {
    items: Vec<WireItem>,
    payer: WirePayer<'a>,
    back_urls: WireBackUrls<'a>,
    auto_return: &'a str,
    external_reference: &'a str,
    notification_url: &'a str,
}

#[derive(Serialize)]
struct WireItem {
    title: String,
    unit_price: Decimal,
    quantity: u32,
}

#[derive(Serialize)]
struct WirePayer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct WireBackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: i64,
    status: String,
    external_reference: Option<String>,
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError> {
        let token = self.token()?;

        let body = CreatePreferenceBody {
            items: request
                .items
                .iter()
                .map(|item| WireItem {
                    title: item.title.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                })
                .collect(),
            payer: WirePayer {
                name: &request.payer_name,
                email: &request.payer_email,
            },
            back_urls: WireBackUrls {
                success: &request.success_url,
                failure: &request.failure_url,
                pending: &request.pending_url,
            },
            auto_return: "approved",
            external_reference: &request.external_reference,
            notification_url: &request.notification_url,
        };

        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "preference creation failed with {}: {}",
                status, detail
            )));
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        info!(preference_id = %preference.id, "Checkout preference created");

        Ok(CheckoutPreference {
            id: preference.id,
            init_point: preference.init_point,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, ServiceError> {
        let token = self.token()?;

        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "payment lookup failed with {}",
                response.status()
            )));
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(GatewayPayment {
            id: payment.id.to_string(),
            status: payment.status,
            external_reference: payment.external_reference,
        })
    }
}
