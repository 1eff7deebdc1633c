use crate::{
    errors::ServiceError,
    integrations::smtp::{Mailer, OutgoingEmail},
    services::leads::LeadResponse,
    services::orders::OrderResponse,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Formats and dispatches transactional and campaign email.
///
/// Pure formatting plus a send: there is no queue, no batching and no retry.
#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    shop_name: String,
    admin_email: Option<String>,
    frontend_url: String,
}

impl NotificationService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        shop_name: String,
        admin_email: Option<String>,
        frontend_url: String,
    ) -> Self {
        Self {
            mailer,
            shop_name,
            admin_email,
            frontend_url,
        }
    }

    /// Order confirmation sent to the customer.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(&self, order: &OrderResponse) -> Result<(), ServiceError> {
        let item_lines: Vec<String> = order
            .items
            .iter()
            .map(|item| format!("- {} x{} (${})", item.name, item.quantity, item.unit_price))
            .collect();

        let text_body = format!(
            "Hola {name}!\n\nRecibimos tu pedido {number}.\n\n{items}\n\nSubtotal: ${subtotal}\nEnvio: ${shipping}\nTotal: ${total}\n\nTe avisamos cuando salga para {address}.\n\n{shop}",
            name = order.customer_name,
            number = order.order_number,
            items = item_lines.join("\n"),
            subtotal = order.subtotal,
            shipping = order.shipping,
            total = order.total,
            address = order.delivery_address,
            shop = self.shop_name,
        );

        let html_items: String = order
            .items
            .iter()
            .map(|item| {
                format!(
                    "<li>{} x{} (${})</li>",
                    item.name, item.quantity, item.unit_price
                )
            })
            .collect();

        let html_body = format!(
            "<h2>Gracias por tu pedido, {name}!</h2>\
             <p>Recibimos tu pedido <strong>{number}</strong>.</p>\
             <ul>{items}</ul>\
             <p>Subtotal: ${subtotal}<br>Envio: ${shipping}<br><strong>Total: ${total}</strong></p>\
             <p>Te avisamos cuando salga para {address}.</p>\
             <p>{shop}</p>",
            name = order.customer_name,
            number = order.order_number,
            items = html_items,
            subtotal = order.subtotal,
            shipping = order.shipping,
            total = order.total,
            address = order.delivery_address,
            shop = self.shop_name,
        );

        self.mailer
            .send(OutgoingEmail {
                to: order.customer_email.clone(),
                subject: format!("{} - Pedido {} recibido", self.shop_name, order.order_number),
                text_body,
                html_body,
            })
            .await
    }

    /// New-order alert sent to the shop's admin address.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_alert(&self, order: &OrderResponse) -> Result<(), ServiceError> {
        let admin_email = self.admin_email.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("admin notification address is not configured".into())
        })?;

        let text_body = format!(
            "Nuevo pedido {number}\n\nCliente: {name} <{email}> {phone}\nEntrega: {address}\nPago: {method} ({status})\nTotal: ${total}",
            number = order.order_number,
            name = order.customer_name,
            email = order.customer_email,
            phone = order.customer_phone,
            address = order.delivery_address,
            method = order.payment_method,
            status = order.payment_status,
            total = order.total,
        );

        let html_body = format!(
            "<h2>Nuevo pedido {number}</h2>\
             <p><strong>Cliente:</strong> {name} &lt;{email}&gt; {phone}</p>\
             <p><strong>Entrega:</strong> {address}</p>\
             <p><strong>Pago:</strong> {method} ({status})</p>\
             <p><strong>Total:</strong> ${total}</p>",
            number = order.order_number,
            name = order.customer_name,
            email = order.customer_email,
            phone = order.customer_phone,
            address = order.delivery_address,
            method = order.payment_method,
            status = order.payment_status,
            total = order.total,
        );

        self.mailer
            .send(OutgoingEmail {
                to: admin_email.clone(),
                subject: format!("Nuevo pedido {} - ${}", order.order_number, order.total),
                text_body,
                html_body,
            })
            .await
    }

    /// Welcome email for a newly captured lead.
    #[instrument(skip(self, lead), fields(email = %lead.email))]
    pub async fn send_welcome(&self, lead: &LeadResponse) -> Result<(), ServiceError> {
        let text_body = format!(
            "Hola {name}!\n\nGracias por sumarte a {shop}. Cada semana te mandamos novedades, lanzamientos y descuentos.\n\nMientras tanto, date una vuelta por la tienda: {url}",
            name = lead.name,
            shop = self.shop_name,
            url = self.frontend_url,
        );

        let html_body = format!(
            "<h2>Bienvenido/a, {name}!</h2>\
             <p>Gracias por sumarte a <strong>{shop}</strong>. Cada semana te mandamos novedades, lanzamientos y descuentos.</p>\
             <p><a href=\"{url}\">Visitar la tienda</a></p>",
            name = lead.name,
            shop = self.shop_name,
            url = self.frontend_url,
        );

        self.mailer
            .send(OutgoingEmail {
                to: lead.email.clone(),
                subject: format!("Bienvenido/a a {}", self.shop_name),
                text_body,
                html_body,
            })
            .await
    }

    /// Sends one campaign message per lead, sequentially, counting successes.
    ///
    /// A failure aborts the remaining sends and propagates; the partial count
    /// is lost with it. No batching, no rate limiting, no isolation.
    #[instrument(skip(self, leads, body), fields(recipients = leads.len()))]
    pub async fn send_campaign(
        &self,
        leads: &[LeadResponse],
        subject: &str,
        body: &str,
    ) -> Result<u32, ServiceError> {
        let mut sent = 0u32;
        for lead in leads {
            let text_body = format!("Hola {}!\n\n{}", lead.name, body);
            let html_body = format!(
                "<p>Hola {}!</p><p>{}</p><p>{}</p>",
                lead.name, body, self.shop_name
            );
            self.mailer
                .send(OutgoingEmail {
                    to: lead.email.clone(),
                    subject: subject.to_string(),
                    text_body,
                    html_body,
                })
                .await?;
            sent += 1;
        }

        info!(sent = sent, "Campaign dispatched");
        Ok(sent)
    }
}
