//! Floreria API Library
//!
//! Order-taking and customer-engagement backend for a small flowers and
//! gift-box storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod integrations;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// The full HTTP surface under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Orders
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/status",
            patch(handlers::orders::update_order_status),
        )
        // Payment gateway notifications
        .route("/mp-webhook", post(handlers::payment_webhooks::mp_webhook))
        // Leads
        .route(
            "/leads",
            post(handlers::leads::subscribe).get(handlers::leads::list_leads),
        )
        .route("/leads/campaign", post(handlers::leads::send_campaign))
        // Conversational assistant
        .route(
            "/whatsapp-webhook",
            get(handlers::chats::verify_webhook).post(handlers::chats::receive_message),
        )
        .route("/chats", get(handlers::chats::list_chats))
        // Catalog
        .route("/products", get(handlers::products::list_products))
        // Analytics
        .route("/analytics/summary", get(handlers::analytics::summary))
        .route(
            "/analytics/revenue-weekly",
            get(handlers::analytics::revenue_weekly),
        )
}
