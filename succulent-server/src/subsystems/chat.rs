//! Chat turns about an identified plant.
//!
//! A turn loads the identification, persists the user's message before the
//! model is called, sends a bounded window of prior messages, and persists
//! the reply. Only a missing identification and a failed completion are
//! surfaced; history and persistence failures are logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use succulent_core::models::{ChatMessage, Identification, Sender};
use succulent_core::{
    ChatStore, ChatTurn, CompletionBackend, CompletionRequest, IdentificationStore, StoreError,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub identification_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// System prompt grounding the model in one identification.
pub fn build_system_prompt(identification: &Identification) -> String {
    let mut prompt = String::from(
        "You are a helpful succulent plant expert assistant. \
         The user has identified a succulent plant. Here is the identification information:\n\n",
    );

    prompt.push_str(&format!("Genus: {}\n", identification.genus));
    if !identification.species.is_empty() {
        prompt.push_str(&format!("Species: {}\n", identification.species));
    }
    prompt.push_str(&format!(
        "Confidence: {:.2}%\n\n",
        identification.confidence * 100.0
    ));

    if let Some(guide) = &identification.care_guide {
        prompt.push_str("Care Instructions:\n");
        for (label, value) in [
            ("Sunlight", &guide.sunlight),
            ("Watering", &guide.watering),
            ("Soil", &guide.soil),
            ("Notes", &guide.notes),
        ] {
            if !value.is_empty() {
                prompt.push_str(&format!("- {}: {}\n", label, value));
            }
        }
    }

    prompt.push_str(
        "\nAnswer the user's questions about this plant. Be concise, helpful, and friendly. \
         If asked about care, reference the care instructions provided above. \
         If you don't know something specific about this plant, be honest and provide general succulent care advice.",
    );
    prompt
}

/// System prompt, then at most `window` most recent prior messages, then the
/// new user message. Older history is dropped, not summarized.
pub fn build_messages(
    system_prompt: String,
    history: &[ChatMessage],
    window: usize,
    user_message: &str,
) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(window);
    let mut turns = Vec::with_capacity(history.len() - start + 2);
    turns.push(ChatTurn::system(system_prompt));
    turns.extend(history[start..].iter().map(|m| match m.sender {
        Sender::User => ChatTurn::user(m.message.clone()),
        Sender::Assistant => ChatTurn::assistant(m.message.clone()),
    }));
    turns.push(ChatTurn::user(user_message));
    turns
}

/// Parse an identification id; malformed ids cannot name a record.
pub fn parse_identification_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found("Identification not found"))
}

pub struct ChatOrchestrator {
    identifications: Arc<dyn IdentificationStore>,
    chats: Arc<dyn ChatStore>,
    completion: Arc<dyn CompletionBackend>,
    context_window: usize,
    max_tokens: u32,
    temperature: f32,
}

impl ChatOrchestrator {
    pub fn new(
        identifications: Arc<dyn IdentificationStore>,
        chats: Arc<dyn ChatStore>,
        completion: Arc<dyn CompletionBackend>,
        context_window: usize,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            identifications,
            chats,
            completion,
            context_window,
            max_tokens,
            temperature,
        }
    }

    pub async fn send(&self, request: ChatRequest) -> Result<ChatReply, ApiError> {
        let raw_id = request
            .identification_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("identification_id is required"))?;
        let message = request
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("message is required"))?;

        let id = parse_identification_id(&raw_id)?;
        let identification = match self.identifications.get_by_id(id).await {
            Ok(identification) => identification,
            Err(StoreError::NotFound) => {
                return Err(ApiError::not_found("Identification not found"));
            }
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to load identification");
                return Err(ApiError::Internal("Failed to load identification".to_string()));
            }
        };

        // Loaded before the new message is saved so it is not sent twice.
        let history = match self
            .chats
            .get_latest_messages(id, self.context_window as i64)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to load chat history, continuing without it");
                Vec::new()
            }
        };

        let user_message = ChatMessage::new(id, Sender::User, message.clone());
        if let Err(e) = self.chats.create(&user_message).await {
            tracing::warn!(id = %id, error = %e, "Failed to save user message");
        }

        let request = CompletionRequest {
            messages: build_messages(
                build_system_prompt(&identification),
                &history,
                self.context_window,
                &message,
            ),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let reply = self.completion.complete(request).await.map_err(|e| {
            tracing::error!(id = %id, backend = self.completion.name(), error = %e, "Chat completion failed");
            ApiError::Upstream("Failed to get response from assistant".to_string())
        })?;
        if reply.trim().is_empty() {
            tracing::error!(id = %id, backend = self.completion.name(), "Chat completion returned an empty reply");
            return Err(ApiError::Upstream(
                "Failed to get response from assistant".to_string(),
            ));
        }

        let assistant_message = ChatMessage::new(id, Sender::Assistant, reply);
        let saved = match self.chats.create(&assistant_message).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to save assistant message");
                assistant_message
            }
        };

        Ok(ChatReply {
            message: saved.message,
            message_id: saved.id,
            timestamp: saved.created_at,
        })
    }
}
