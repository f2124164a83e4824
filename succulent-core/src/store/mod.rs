//! Repositories over the relational store.
//!
//! Each table is owned by exactly one repository trait. The PostgreSQL
//! implementations issue single parameterized statements; nothing here spans
//! a transaction.

pub mod care_cache;
pub mod chat_messages;
pub mod identifications;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CareCacheEntry, CareGuide, ChatMessage, Identification};

pub use care_cache::PgCareCache;
pub use chat_messages::PgChatStore;
pub use identifications::PgIdentificationStore;

/// Upper bound on a single history page.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Clamp caller-supplied pagination to `[0, MAX_PAGE_SIZE]` / `>= 0`.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(0, MAX_PAGE_SIZE), offset.max(0))
}

#[async_trait]
pub trait IdentificationStore: Send + Sync {
    /// Insert and return the stored record (id and created_at as persisted).
    async fn create(&self, record: &Identification) -> Result<Identification, StoreError>;

    /// Fetch a non-deleted record.
    async fn get_by_id(&self, id: Uuid) -> Result<Identification, StoreError>;

    /// Newest-first page of non-deleted records; `limit` is clamped.
    async fn get_all(&self, limit: i64, offset: i64) -> Result<Vec<Identification>, StoreError>;

    /// Number of non-deleted records.
    async fn count(&self) -> Result<i64, StoreError>;

    /// Soft delete. `NotFound` when the id is unknown or already deleted.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, StoreError>;

    /// Whole conversation, oldest first.
    async fn get_by_identification_id(
        &self,
        identification_id: Uuid,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// The newest `limit` messages, returned oldest first.
    async fn get_latest_messages(
        &self,
        identification_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    async fn count_by_identification_id(&self, identification_id: Uuid) -> Result<i64, StoreError>;
}

/// Generated care guides keyed by the raw `(genus, species)` pair.
#[async_trait]
pub trait CareCache: Send + Sync {
    /// `Ok(None)` is a cache miss, not an error.
    async fn get(&self, genus: &str, species: &str) -> Result<Option<CareCacheEntry>, StoreError>;

    /// Insert or replace the guide for the pair.
    async fn upsert(
        &self,
        genus: &str,
        species: &str,
        guide: &CareGuide,
    ) -> Result<CareCacheEntry, StoreError>;

    /// Replace an existing entry. `NotFound` when the pair is not cached.
    async fn update(&self, genus: &str, species: &str, guide: &CareGuide) -> Result<(), StoreError>;
}
