//! Shared test harness: in-memory SQLite created by the real migrator plus
//! recording fakes for the four injected integrations.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use sea_orm::ConnectOptions;
use sea_orm_migration::MigratorTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use floreria_api::{
    api_routes,
    config::AppConfig,
    errors::ServiceError,
    handlers::{self, AppServices},
    integrations::{
        mercado_pago::{CheckoutPreference, GatewayPayment, PaymentGateway, PreferenceRequest},
        openai::{ChatModel, ChatTurn},
        smtp::{Mailer, OutgoingEmail},
        whatsapp::MessagingChannel,
    },
    migrator::Migrator,
    AppState,
};

/// Mailer fake that records every accepted message and can be told to reject
/// the Nth send attempt.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    fail_on_attempt: Mutex<Option<usize>>,
    attempts: Mutex<usize>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_on_attempt: Mutex::new(None),
            attempts: Mutex::new(0),
        }
    }

    /// Makes the Nth (1-based) send attempt fail.
    pub fn fail_on_attempt(&self, n: usize) {
        *self.fail_on_attempt.lock().unwrap() = Some(n);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if *self.fail_on_attempt.lock().unwrap() == Some(attempt) {
            return Err(ServiceError::ExternalServiceError(
                "smtp rejected the message".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Gateway fake: preferences are minted locally, payment records are whatever
/// the test registered.
pub struct StubGateway {
    pub created_preferences: Mutex<Vec<PreferenceRequest>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            created_preferences: Mutex::new(Vec::new()),
            payments: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the authoritative payment record the fake will serve.
    pub fn register_payment(&self, id: &str, status: &str, external_reference: Option<&str>) {
        self.payments.lock().unwrap().insert(
            id.to_string(),
            GatewayPayment {
                id: id.to_string(),
                status: status.to_string(),
                external_reference: external_reference.map(str::to_string),
            },
        );
    }

    pub fn preference_count(&self) -> usize {
        self.created_preferences.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<CheckoutPreference, ServiceError> {
        let mut created = self.created_preferences.lock().unwrap();
        created.push(request);
        let id = format!("pref-{:04}", created.len());
        Ok(CheckoutPreference {
            init_point: format!("https://gateway.example/init/{}", id),
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, ServiceError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(format!("payment {} not found", payment_id))
            })
    }
}

/// Model fake: returns a fixed reply and records every submitted context.
pub struct ScriptedModel {
    pub reply: Mutex<String>,
    pub calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Mutex::new(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Context window submitted on the most recent call.
    pub fn last_context(&self) -> Option<(String, Vec<ChatTurn>)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<String, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), turns.to_vec()));
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Channel fake recording every outbound text.
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

/// Fully wired application over in-memory storage and recording fakes.
pub struct TestApp {
    pub state: AppState,
    pub services: AppServices,
    pub mailer: Arc<RecordingMailer>,
    pub gateway: Arc<StubGateway>,
    pub model: Arc<ScriptedModel>,
    pub channel: Arc<RecordingChannel>,
}

impl TestApp {
    pub async fn new() -> Self {
        // A single pooled connection: every handle must see the same
        // in-memory database.
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = sea_orm::Database::connect(options)
            .await
            .expect("in-memory sqlite");
        Migrator::up(&db, None).await.expect("migrations");
        let db = Arc::new(db);

        let mut config = AppConfig::with_defaults("sqlite::memory:");
        config.admin_email = Some("admin@floreria.example".to_string());
        config.whatsapp_verify_token = Some("verify-secret".to_string());

        let mailer = Arc::new(RecordingMailer::new());
        let gateway = Arc::new(StubGateway::new());
        let model = Arc::new(ScriptedModel::new("Hola! En que te puedo ayudar?"));
        let channel = Arc::new(RecordingChannel::new());

        let services = AppServices::new(
            db.clone(),
            &config,
            gateway.clone(),
            mailer.clone(),
            channel.clone(),
            model.clone(),
        );

        let state = AppState {
            db,
            config,
            services: services.clone(),
        };

        Self {
            state,
            services,
            mailer,
            gateway,
            model,
            channel,
        }
    }

    /// The full HTTP surface, for `oneshot` request tests.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health))
            .nest("/api", api_routes())
            .with_state(self.state.clone())
    }
}
