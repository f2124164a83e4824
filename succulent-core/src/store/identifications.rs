use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{clamp_page, IdentificationStore, StoreError};
use crate::models::{CareGuide, Identification};

const COLUMNS: &str =
    "id, genus, species, confidence, image_path, care_guide, created_at, deleted_at";

#[derive(sqlx::FromRow)]
struct IdentificationRow {
    id: Uuid,
    genus: String,
    species: String,
    confidence: f64,
    image_path: String,
    care_guide: Option<Json<CareGuide>>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<IdentificationRow> for Identification {
    fn from(row: IdentificationRow) -> Self {
        Self {
            id: row.id,
            genus: row.genus,
            species: row.species,
            confidence: row.confidence,
            image_path: row.image_path,
            care_guide: row.care_guide.map(|Json(guide)| guide),
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct PgIdentificationStore {
    pool: PgPool,
}

impl PgIdentificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentificationStore for PgIdentificationStore {
    async fn create(&self, record: &Identification) -> Result<Identification, StoreError> {
        let care_guide = record
            .care_guide
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let sql = format!(
            "INSERT INTO identifications (id, genus, species, confidence, image_path, care_guide, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            COLUMNS
        );

        let row: IdentificationRow = sqlx::query_as(&sql)
            .bind(record.id)
            .bind(&record.genus)
            .bind(&record.species)
            .bind(record.confidence)
            .bind(&record.image_path)
            .bind(care_guide)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identification, StoreError> {
        let sql = format!(
            "SELECT {} FROM identifications WHERE id = $1 AND deleted_at IS NULL",
            COLUMNS
        );

        let row: Option<IdentificationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Identification::from).ok_or(StoreError::NotFound)
    }

    async fn get_all(&self, limit: i64, offset: i64) -> Result<Vec<Identification>, StoreError> {
        let (limit, offset) = clamp_page(limit, offset);
        let sql = format!(
            "SELECT {} FROM identifications
             WHERE deleted_at IS NULL
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2",
            COLUMNS
        );

        let rows: Vec<IdentificationRow> = sqlx::query_as(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Identification::from).collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM identifications WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE identifications SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
