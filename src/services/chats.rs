use crate::{
    catalog,
    config::AppConfig,
    entities::chat::{self, ActiveModel as ChatActiveModel, Entity as ChatEntity},
    entities::chat_message::{
        self, ActiveModel as ChatMessageActiveModel, Entity as ChatMessageEntity,
        Model as ChatMessageModel,
    },
    errors::ServiceError,
    integrations::openai::{ChatModel, ChatTurn, TurnRole},
    integrations::whatsapp::MessagingChannel,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

const ROLE_USER: &str = "user";
const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub phone: String,
    pub contact_name: Option<String>,
    pub messages: Vec<ChatMessageView>,
    pub updated_at: DateTime<Utc>,
}

/// Conversational assistant over the messaging channel.
///
/// Stored history per contact grows without bound; only the context window
/// submitted to the model is truncated. Turns are appended in arrival order
/// with no merge logic, so two near-simultaneous messages from one contact
/// interleave non-deterministically.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<DatabaseConnection>,
    model: Arc<dyn ChatModel>,
    channel: Arc<dyn MessagingChannel>,
    context_turns: u64,
    shop_name: String,
    free_shipping_threshold: u32,
    shipping_fee: u32,
}

impl ChatService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        model: Arc<dyn ChatModel>,
        channel: Arc<dyn MessagingChannel>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            model,
            channel,
            context_turns: config.chat_context_turns,
            shop_name: config.shop_name.clone(),
            free_shipping_threshold: config.free_shipping_threshold,
            shipping_fee: config.shipping_fee,
        }
    }

    /// Handles one inbound message: append the user turn, window the history,
    /// ask the model, append and forward the reply.
    #[instrument(skip(self, text), fields(phone = %phone))]
    pub async fn handle_inbound(
        &self,
        phone: &str,
        contact_name: Option<&str>,
        text: &str,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        self.touch_chat(phone, contact_name, now).await?;
        self.append_message(phone, ROLE_USER, text, now).await?;

        let window = self.context_window(phone).await?;
        let system_prompt = self.system_prompt();

        let reply = self.model.complete(&system_prompt, &window).await?;

        self.append_message(phone, ROLE_ASSISTANT, &reply, Utc::now())
            .await?;
        self.channel.send_text(phone, &reply).await?;

        info!(phone = %phone, "Assistant reply delivered");
        Ok(reply)
    }

    /// Latest conversations, most recently active first.
    #[instrument(skip(self))]
    pub async fn list_recent(&self, limit: u64) -> Result<Vec<ChatResponse>, ServiceError> {
        let chats = ChatEntity::find()
            .order_by_desc(chat::Column::UpdatedAt)
            .limit(limit)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let phones: Vec<String> = chats.iter().map(|c| c.phone.clone()).collect();
        let messages = ChatMessageEntity::find()
            .filter(chat_message::Column::ChatPhone.is_in(phones))
            .order_by_asc(chat_message::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut by_phone: HashMap<String, Vec<ChatMessageModel>> = HashMap::new();
        for message in messages {
            by_phone
                .entry(message.chat_phone.clone())
                .or_default()
                .push(message);
        }

        Ok(chats
            .into_iter()
            .map(|c| ChatResponse {
                messages: by_phone
                    .remove(&c.phone)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|m| ChatMessageView {
                        role: m.role,
                        content: m.content,
                        timestamp: m.created_at,
                    })
                    .collect(),
                phone: c.phone,
                contact_name: c.contact_name,
                updated_at: c.updated_at,
            })
            .collect())
    }

    /// The bounded slice of history actually submitted to the model: the last
    /// `context_turns` stored turns, oldest first.
    pub async fn context_window(&self, phone: &str) -> Result<Vec<ChatTurn>, ServiceError> {
        let mut recent = ChatMessageEntity::find()
            .filter(chat_message::Column::ChatPhone.eq(phone))
            .order_by_desc(chat_message::Column::Id)
            .limit(self.context_turns)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        recent.reverse();

        Ok(recent
            .into_iter()
            .map(|m| ChatTurn {
                role: if m.role == ROLE_ASSISTANT {
                    TurnRole::Assistant
                } else {
                    TurnRole::User
                },
                content: m.content,
            })
            .collect())
    }

    /// Fixed system instruction: persona, catalog, pricing policy and
    /// response rules.
    pub fn system_prompt(&self) -> String {
        let catalog_lines: Vec<String> = catalog::products()
            .iter()
            .map(|p| format!("- {}: ${} ({})", p.name, p.price, p.description))
            .collect();

        format!(
            "Sos el asistente virtual de {shop}, una tienda online de flores y box de regalo.\n\
             \n\
             Catalogo:\n{catalog}\n\
             \n\
             Envio a domicilio: ${fee}. Gratis en pedidos desde ${threshold}.\n\
             Los pedidos se hacen desde la tienda online; si el cliente quiere comprar, \
             indicale que complete el checkout en la web.\n\
             \n\
             Respondé en español rioplatense, en tono cercano y breve (maximo 3 o 4 oraciones). \
             Solo hablá de productos del catalogo, precios, envios y horarios. \
             Si no sabés la respuesta, ofrecé derivar con una persona del equipo.",
            shop = self.shop_name,
            catalog = catalog_lines.join("\n"),
            fee = self.shipping_fee,
            threshold = self.free_shipping_threshold,
        )
    }

    async fn touch_chat(
        &self,
        phone: &str,
        contact_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let existing = ChatEntity::find_by_id(phone)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match existing {
            Some(model) => {
                let mut active: ChatActiveModel = model.into();
                active.updated_at = Set(now);
                if let Some(name) = contact_name {
                    active.contact_name = Set(Some(name.to_string()));
                }
                active
                    .update(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
            None => {
                ChatActiveModel {
                    phone: Set(phone.to_string()),
                    contact_name: Set(contact_name.map(str::to_string)),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            }
        }

        Ok(())
    }

    async fn append_message(
        &self,
        phone: &str,
        role: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        ChatMessageActiveModel {
            chat_phone: Set(phone.to_string()),
            role: Set(role.to_string()),
            content: Set(content.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }
}
