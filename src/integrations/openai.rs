use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::instrument;

use crate::errors::ServiceError;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of the context window submitted to the model.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Hosted text-generation capability with bounded output length and a fixed
/// sampling temperature.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<String, ServiceError>;
}

pub struct OpenAiChatModel {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        let client = api_key.map(|key| {
            let config = OpenAIConfig::new().with_api_key(key);
            Client::with_config(config)
        });

        Self {
            client,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(skip(self, system_prompt, turns), fields(turns = turns.len()))]
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<String, ServiceError> {
        let client = self.client.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("inference credential is not configured".to_string())
        })?;

        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(turns.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt.to_string())
                .build()
                .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?
                .into(),
        );

        for turn in turns {
            let message = match turn.role {
                TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?
                    .into(),
                TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("model returned no completion".to_string())
            })?;

        Ok(reply)
    }
}
