use crate::{
    entities::order::{OrderStatus, PaymentStatus},
    errors::ServiceError,
    integrations::mercado_pago::{PaymentGateway, PreferenceItem, PreferenceRequest},
    services::leads::{LeadService, BUYER_TAG},
    services::notifications::NotificationService,
    services::orders::{CreateOrderRequest, OrderResponse, OrderService},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Payment-type webhook notification. All fields optional: the gateway posts
/// several shapes on the same endpoint and anything unrecognized is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GatewayNotification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationData {
    /// Gateway payment identifier; arrives as a number or a string.
    #[schema(value_type = Option<String>)]
    pub id: Option<serde_json::Value>,
}

/// Outcome of a checkout submission.
pub struct PlacedOrder {
    pub order: OrderResponse,
    pub init_point: Option<String>,
    pub preference_id: Option<String>,
}

/// Maps a gateway payment status onto the local one. Anything the gateway
/// reports that is neither approved nor rejected stays pending.
pub fn map_gateway_status(status: &str) -> PaymentStatus {
    match status {
        "approved" => PaymentStatus::Approved,
        "rejected" => PaymentStatus::Rejected,
        _ => PaymentStatus::Pending,
    }
}

fn is_gateway_method(payment_method: &str) -> bool {
    matches!(payment_method, "mercadopago" | "mp")
}

/// Orchestrates checkout submissions and reconciles asynchronous payment
/// notifications against local order records.
#[derive(Clone)]
pub struct PaymentService {
    orders: Arc<OrderService>,
    leads: Arc<LeadService>,
    notifications: Arc<NotificationService>,
    gateway: Arc<dyn PaymentGateway>,
    frontend_url: String,
    backend_url: String,
}

impl PaymentService {
    pub fn new(
        orders: Arc<OrderService>,
        leads: Arc<LeadService>,
        notifications: Arc<NotificationService>,
        gateway: Arc<dyn PaymentGateway>,
        frontend_url: String,
        backend_url: String,
    ) -> Self {
        Self {
            orders,
            leads,
            notifications,
            gateway,
            frontend_url,
            backend_url,
        }
    }

    /// Handles a checkout submission end to end: create the order, record the
    /// customer as a buyer lead, then either open a hosted checkout session
    /// (gateway methods) or notify immediately (offline methods, for which no
    /// webhook will ever arrive).
    #[instrument(skip(self, request))]
    pub async fn place_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<PlacedOrder, ServiceError> {
        let order = self.orders.create_order(request).await?;

        self.leads
            .upsert(
                &order.customer_name,
                &order.customer_email,
                "checkout",
                &[BUYER_TAG],
            )
            .await?;

        if is_gateway_method(&order.payment_method) {
            let preference = self
                .gateway
                .create_preference(PreferenceRequest {
                    items: order
                        .items
                        .iter()
                        .map(|item| PreferenceItem {
                            title: item.name.clone(),
                            unit_price: item.unit_price,
                            quantity: item.quantity,
                        })
                        .collect(),
                    payer_name: order.customer_name.clone(),
                    payer_email: order.customer_email.clone(),
                    external_reference: order.order_number.clone(),
                    success_url: format!("{}/checkout/success", self.frontend_url),
                    failure_url: format!("{}/checkout/failure", self.frontend_url),
                    pending_url: format!("{}/checkout/pending", self.frontend_url),
                    notification_url: format!("{}/api/mp-webhook", self.backend_url),
                })
                .await?;

            // Persist the session id before answering the client. If this
            // write fails the remote session is orphaned; no compensating
            // cancel is issued.
            self.orders
                .set_preference_id(order.id, &preference.id)
                .await?;

            info!(order_number = %order.order_number, preference_id = %preference.id, "Checkout session opened");

            Ok(PlacedOrder {
                order,
                init_point: Some(preference.init_point),
                preference_id: Some(preference.id),
            })
        } else {
            self.notifications.send_order_confirmation(&order).await?;
            self.notifications.send_order_alert(&order).await?;

            Ok(PlacedOrder {
                order,
                init_point: None,
                preference_id: None,
            })
        }
    }

    /// Reconciles one payment notification.
    ///
    /// The webhook payload's own status field is never trusted: the
    /// authoritative record is fetched from the gateway by id. An unknown
    /// external reference is a silent no-op. On an approved result both
    /// notification emails go out once per delivery: the gateway may redeliver
    /// the same event and this handler is deliberately NOT idempotent against
    /// that, so a redelivered approval re-sends both emails.
    #[instrument(skip(self, notification))]
    pub async fn reconcile_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<(), ServiceError> {
        let Some(kind) = notification.kind.as_deref() else {
            return Ok(());
        };
        if kind != "payment" {
            info!(kind = %kind, "Ignoring non-payment notification");
            return Ok(());
        }

        let Some(payment_id) = notification
            .data
            .as_ref()
            .and_then(|data| data.id.as_ref())
            .and_then(normalize_payment_id)
        else {
            warn!("Payment notification without a payment id");
            return Ok(());
        };

        let payment = self.gateway.get_payment(&payment_id).await?;

        let Some(reference) = payment.external_reference.as_deref() else {
            warn!(payment_id = %payment.id, "Payment record carries no external reference");
            return Ok(());
        };

        let Some(order) = self.orders.get_order_by_number(reference).await? else {
            info!(reference = %reference, "No local order for notification, ignoring");
            return Ok(());
        };

        let payment_status = map_gateway_status(&payment.status);
        let order_status =
            (payment_status == PaymentStatus::Approved).then_some(OrderStatus::Confirmed);

        let updated = self
            .orders
            .apply_payment_result(order.id, &payment.id, payment_status, order_status)
            .await?;

        info!(
            order_number = %updated.order_number,
            payment_status = %payment_status,
            "Payment notification reconciled"
        );

        if payment_status == PaymentStatus::Approved {
            self.notifications.send_order_confirmation(&updated).await?;
            self.notifications.send_order_alert(&updated).await?;
        }

        Ok(())
    }
}

fn normalize_payment_id(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(map_gateway_status("approved"), PaymentStatus::Approved);
        assert_eq!(map_gateway_status("rejected"), PaymentStatus::Rejected);
        assert_eq!(map_gateway_status("in_process"), PaymentStatus::Pending);
        assert_eq!(map_gateway_status("refunded"), PaymentStatus::Pending);
        assert_eq!(map_gateway_status(""), PaymentStatus::Pending);
    }

    #[test]
    fn payment_id_accepts_number_or_string() {
        assert_eq!(
            normalize_payment_id(&json!("12345")),
            Some("12345".to_string())
        );
        assert_eq!(normalize_payment_id(&json!(12345)), Some("12345".to_string()));
        assert_eq!(normalize_payment_id(&json!("")), None);
        assert_eq!(normalize_payment_id(&json!(null)), None);
    }

    #[test]
    fn gateway_methods_open_checkout_sessions() {
        assert!(is_gateway_method("mercadopago"));
        assert!(is_gateway_method("mp"));
        assert!(!is_gateway_method("cash"));
        assert!(!is_gateway_method("transfer"));
    }
}
