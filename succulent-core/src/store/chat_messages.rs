use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ChatStore, StoreError};
use crate::models::ChatMessage;

#[derive(sqlx::FromRow)]
struct ChatMessageRow {
    id: Uuid,
    identification_id: Uuid,
    message: String,
    sender: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: ChatMessageRow) -> Result<Self, Self::Error> {
        let sender = row.sender.parse().map_err(StoreError::Corrupt)?;
        Ok(Self {
            id: row.id,
            identification_id: row.identification_id,
            message: row.message,
            sender,
            created_at: row.created_at,
        })
    }
}

fn into_messages(rows: Vec<ChatMessageRow>) -> Result<Vec<ChatMessage>, StoreError> {
    rows.into_iter().map(ChatMessage::try_from).collect()
}

#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, StoreError> {
        let row: ChatMessageRow = sqlx::query_as(
            "INSERT INTO chat_messages (id, identification_id, message, sender, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, identification_id, message, sender, created_at",
        )
        .bind(message.id)
        .bind(message.identification_id)
        .bind(&message.message)
        .bind(message.sender.as_str())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_by_identification_id(
        &self,
        identification_id: Uuid,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(
            "SELECT id, identification_id, message, sender, created_at
             FROM chat_messages
             WHERE identification_id = $1
             ORDER BY created_at ASC",
        )
        .bind(identification_id)
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn get_latest_messages(
        &self,
        identification_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(
            "SELECT id, identification_id, message, sender, created_at
             FROM chat_messages
             WHERE identification_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(identification_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = into_messages(rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn count_by_identification_id(&self, identification_id: Uuid) -> Result<i64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE identification_id = $1")
                .bind(identification_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
