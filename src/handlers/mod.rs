pub mod analytics;
pub mod chats;
pub mod health;
pub mod leads;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use crate::config::AppConfig;
use crate::integrations::{
    mercado_pago::PaymentGateway, openai::ChatModel, smtp::Mailer, whatsapp::MessagingChannel,
};
use crate::services::{
    analytics::AnalyticsService, chats::ChatService, leads::LeadService,
    notifications::NotificationService, orders::OrderService, payments::PaymentService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
///
/// External collaborators arrive as trait objects so production wiring and
/// tests construct the same graph with different leaves.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub leads: Arc<LeadService>,
    pub notifications: Arc<NotificationService>,
    pub payments: Arc<PaymentService>,
    pub chats: Arc<ChatService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        channel: Arc<dyn MessagingChannel>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db.clone(), config));
        let leads = Arc::new(LeadService::new(db.clone()));
        let notifications = Arc::new(NotificationService::new(
            mailer,
            config.shop_name.clone(),
            config.admin_email.clone(),
            config.frontend_url.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            orders.clone(),
            leads.clone(),
            notifications.clone(),
            gateway,
            config.frontend_url.clone(),
            config.backend_url.clone(),
        ));
        let chats = Arc::new(ChatService::new(db.clone(), model, channel, config));
        let analytics = Arc::new(AnalyticsService::new(db));

        Self {
            orders,
            leads,
            notifications,
            payments,
            chats,
            analytics,
        }
    }
}
