use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CareCache, StoreError};
use crate::models::{CareCacheEntry, CareGuide};

#[derive(sqlx::FromRow)]
struct CareCacheRow {
    id: Uuid,
    genus: String,
    species: String,
    care_guide: Json<CareGuide>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CareCacheRow> for CareCacheEntry {
    fn from(row: CareCacheRow) -> Self {
        Self {
            id: row.id,
            genus: row.genus,
            species: row.species,
            care_guide: row.care_guide.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCareCache {
    pool: PgPool,
}

impl PgCareCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CareCache for PgCareCache {
    async fn get(&self, genus: &str, species: &str) -> Result<Option<CareCacheEntry>, StoreError> {
        let row: Option<CareCacheRow> = sqlx::query_as(
            "SELECT id, genus, species, care_guide, created_at, updated_at
             FROM care_instructions
             WHERE genus = $1 AND species = $2",
        )
        .bind(genus)
        .bind(species)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CareCacheEntry::from))
    }

    async fn upsert(
        &self,
        genus: &str,
        species: &str,
        guide: &CareGuide,
    ) -> Result<CareCacheEntry, StoreError> {
        let guide = serde_json::to_value(guide)?;
        let row: CareCacheRow = sqlx::query_as(
            "INSERT INTO care_instructions (id, genus, species, care_guide, created_at, updated_at)
             VALUES ($1, $2, $3, $4, now(), now())
             ON CONFLICT (genus, species) DO UPDATE
             SET care_guide = EXCLUDED.care_guide,
                 updated_at = EXCLUDED.updated_at
             RETURNING id, genus, species, care_guide, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(genus)
        .bind(species)
        .bind(guide)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, genus: &str, species: &str, guide: &CareGuide) -> Result<(), StoreError> {
        let guide = serde_json::to_value(guide)?;
        let result = sqlx::query(
            "UPDATE care_instructions
             SET care_guide = $1, updated_at = now()
             WHERE genus = $2 AND species = $3",
        )
        .bind(guide)
        .bind(genus)
        .bind(species)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
