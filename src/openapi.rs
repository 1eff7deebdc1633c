use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{catalog, errors, handlers, services};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Floreria API",
        version = "0.1.0",
        description = "Order-taking and customer-engagement backend for a small flowers and gift-box storefront: checkout with hosted payments, payment-status reconciliation, transactional and campaign email, and a WhatsApp shopping assistant.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::payment_webhooks::mp_webhook,
        handlers::leads::subscribe,
        handlers::leads::list_leads,
        handlers::leads::send_campaign,
        handlers::chats::verify_webhook,
        handlers::chats::receive_message,
        handlers::chats::list_chats,
        handlers::products::list_products,
        handlers::analytics::summary,
        handlers::analytics::revenue_weekly,
        handlers::health::health,
    ),
    components(schemas(
        errors::ErrorResponse,
        catalog::Product,
        services::orders::CreateOrderRequest,
        services::orders::OrderItemInput,
        services::orders::UpdateOrderStatusRequest,
        services::orders::OrderResponse,
        services::orders::OrderItemResponse,
        services::payments::GatewayNotification,
        services::payments::NotificationData,
        services::leads::SubscribeRequest,
        services::leads::LeadResponse,
        services::leads::Segment,
        services::chats::ChatResponse,
        services::chats::ChatMessageView,
        handlers::chats::WhatsAppWebhookPayload,
        handlers::chats::WebhookEntry,
        handlers::chats::WebhookChange,
        handlers::chats::ChangeValue,
        handlers::chats::WebhookContact,
        handlers::chats::ContactProfile,
        handlers::chats::InboundMessage,
        handlers::chats::TextBody,
        services::analytics::AnalyticsSummary,
        services::analytics::WeeklyRevenuePoint,
        handlers::orders::CreateOrderResponse,
        handlers::payment_webhooks::WebhookAck,
        handlers::leads::SubscribeResponse,
        handlers::leads::CampaignRequest,
        handlers::leads::CampaignResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "Orders", description = "Order intake and lifecycle"),
        (name = "Payments", description = "Payment gateway notifications"),
        (name = "Leads", description = "Newsletter signups and campaigns"),
        (name = "Chats", description = "WhatsApp shopping assistant"),
        (name = "Catalog", description = "Static product catalog"),
        (name = "Analytics", description = "Read-only KPI views"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
