//! Read-only history views plus soft delete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use succulent_core::models::{CareGuide, ChatMessage, Identification, Sender};
use succulent_core::store::MAX_PAGE_SIZE;
use succulent_core::{ChatStore, IdentificationStore, StoreError};
use uuid::Uuid;

use crate::error::ApiError;
use crate::subsystems::chat::parse_identification_id;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Non-numeric or non-positive limits fall back to the default; large ones clamp.
pub fn parse_limit(raw: Option<&str>) -> i64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    }
}

pub fn parse_offset(raw: Option<&str>) -> i64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(offset) if offset >= 0 => offset,
        _ => 0,
    }
}

/// Stored file name, servable under `/uploads/`.
pub fn image_file_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}

fn non_empty(species: &str) -> Option<String> {
    (!species.is_empty()).then(|| species.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub genus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub confidence: f64,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Identification> for HistoryItem {
    fn from(record: &Identification) -> Self {
        Self {
            id: record.id,
            genus: record.genus.clone(),
            species: non_empty(&record.species),
            confidence: record.confidence,
            image_path: image_file_name(&record.image_path).to_string(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDetail {
    pub id: Uuid,
    pub genus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub confidence: f64,
    pub image_path: String,
    pub care_guide: Option<CareGuide>,
    pub created_at: DateTime<Utc>,
}

impl From<Identification> for HistoryDetail {
    fn from(record: Identification) -> Self {
        Self {
            id: record.id,
            species: non_empty(&record.species),
            image_path: image_file_name(&record.image_path).to_string(),
            genus: record.genus,
            confidence: record.confidence,
            care_guide: record.care_guide,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageView {
    pub id: Uuid,
    pub message: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for ChatMessageView {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            message: message.message,
            sender: message.sender,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryWithChat {
    pub identification: HistoryDetail,
    pub chat_messages: Vec<ChatMessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    pub identification_id: Uuid,
    pub messages: Vec<ChatMessageView>,
    pub total: usize,
}

pub struct HistoryPresenter {
    identifications: Arc<dyn IdentificationStore>,
    chats: Arc<dyn ChatStore>,
}

impl HistoryPresenter {
    pub fn new(identifications: Arc<dyn IdentificationStore>, chats: Arc<dyn ChatStore>) -> Self {
        Self {
            identifications,
            chats,
        }
    }

    pub async fn list(
        &self,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Result<HistoryPage, ApiError> {
        let limit = parse_limit(limit);
        let offset = parse_offset(offset);

        let records = self
            .identifications
            .get_all(limit, offset)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list identifications");
                ApiError::Internal("Failed to retrieve history".to_string())
            })?;

        let total = self.identifications.count().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to count identifications");
            0
        });

        Ok(HistoryPage {
            items: records.iter().map(HistoryItem::from).collect(),
            total,
            limit,
            offset,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Identification, ApiError> {
        match self.identifications.get_by_id(id).await {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound) => Err(ApiError::not_found("Identification not found")),
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to load identification");
                Err(ApiError::Internal("Failed to retrieve identification".to_string()))
            }
        }
    }

    pub async fn get(&self, raw_id: &str) -> Result<HistoryDetail, ApiError> {
        let id = parse_identification_id(raw_id)?;
        Ok(self.load(id).await?.into())
    }

    pub async fn get_with_chat(&self, raw_id: &str) -> Result<HistoryWithChat, ApiError> {
        let id = parse_identification_id(raw_id)?;
        let record = self.load(id).await?;

        let messages = self
            .chats
            .get_by_identification_id(id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(id = %id, error = %e, "Failed to load chat messages");
                Vec::new()
            });

        Ok(HistoryWithChat {
            identification: record.into(),
            chat_messages: messages.into_iter().map(ChatMessageView::from).collect(),
        })
    }

    /// A deleted identification hides its conversation along with itself.
    pub async fn chat_history(&self, raw_id: &str) -> Result<ChatHistory, ApiError> {
        let id = parse_identification_id(raw_id)?;
        self.load(id).await?;
        let messages = self
            .chats
            .get_by_identification_id(id)
            .await
            .map_err(|e| {
                tracing::error!(id = %id, error = %e, "Failed to load chat history");
                ApiError::Internal("Failed to retrieve chat history".to_string())
            })?;

        let messages: Vec<ChatMessageView> =
            messages.into_iter().map(ChatMessageView::from).collect();
        Ok(ChatHistory {
            identification_id: id,
            total: messages.len(),
            messages,
        })
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), ApiError> {
        let id = parse_identification_id(raw_id)?;
        match self.identifications.delete(id).await {
            Ok(()) => {
                tracing::info!(id = %id, "Identification deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(ApiError::not_found("Identification not found")),
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to delete identification");
                Err(ApiError::Internal("Failed to delete identification".to_string()))
            }
        }
    }
}
