//! Identification pipeline
//!
//! intake → inference → disclosure policy → care resolution → persistence →
//! response. Only intake and inference failures reach the caller; care
//! resolution degrades to a fallback guide and a failed insert is logged and
//! reported through `IdentifyOutcome::persisted`.

use std::sync::Arc;

use serde::Serialize;
use succulent_core::label::{format_genus, format_species, parse_label};
use succulent_core::models::{CareGuide, Identification};
use succulent_core::{FileIntake, IdentificationStore, InferenceBackend, UploadMeta};
use uuid::Uuid;

use crate::error::ApiError;
use crate::subsystems::care::{CareResolver, CareSource};

/// Whether the species-level name is shown to the user.
///
/// The threshold is inclusive: a prediction exactly at the threshold discloses.
pub fn disclose_species(confidence: f64, threshold: f64, species: &str) -> bool {
    !species.is_empty() && confidence >= threshold
}

#[derive(Debug, Clone, Serialize)]
pub struct PlantInfo {
    pub genus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResponse {
    pub id: Uuid,
    pub plant: PlantInfo,
    pub care: CareGuide,
}

#[derive(Debug, Clone)]
pub struct IdentifyOutcome {
    pub response: IdentifyResponse,
    pub care_source: CareSource,
    pub persisted: bool,
}

pub struct Identifier {
    intake: FileIntake,
    inference: Arc<dyn InferenceBackend>,
    care: CareResolver,
    store: Arc<dyn IdentificationStore>,
    species_threshold: f64,
}

impl Identifier {
    pub fn new(
        intake: FileIntake,
        inference: Arc<dyn InferenceBackend>,
        care: CareResolver,
        store: Arc<dyn IdentificationStore>,
        species_threshold: f64,
    ) -> Self {
        Self {
            intake,
            inference,
            care,
            store,
            species_threshold,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.intake.max_bytes()
    }

    pub async fn identify(
        &self,
        data: &[u8],
        meta: &UploadMeta,
    ) -> Result<IdentifyOutcome, ApiError> {
        let stored = self.intake.save(data, meta).await?;
        let image_path = stored.display().to_string();

        let predictions = self.inference.infer(&image_path).await.map_err(|e| {
            tracing::error!(image_path = %image_path, error = %e, "Inference failed");
            ApiError::Upstream("Failed to identify plant".to_string())
        })?;
        let top = predictions.into_iter().next().ok_or_else(|| {
            tracing::error!(image_path = %image_path, "Inference returned no predictions");
            ApiError::Upstream("Failed to identify plant".to_string())
        })?;

        let (genus, species) = parse_label(&top.label);
        let display_species = disclose_species(top.confidence, self.species_threshold, &species)
            .then(|| format_species(&top.label));

        let care = self.care.resolve(&genus, &species).await;

        // Persisted genus/species stay raw; display formatting is response-only.
        let record = Identification::new(
            genus.clone(),
            species,
            top.confidence,
            image_path,
            care.guide.clone(),
        );
        let (id, persisted) = match self.store.create(&record).await {
            Ok(saved) => {
                tracing::info!(id = %saved.id, genus = %saved.genus, "Identification saved");
                (saved.id, true)
            }
            Err(e) => {
                tracing::error!(id = %record.id, error = %e, "Failed to save identification");
                (record.id, false)
            }
        };

        Ok(IdentifyOutcome {
            response: IdentifyResponse {
                id,
                plant: PlantInfo {
                    genus: format_genus(&genus),
                    species: display_species,
                    confidence: top.confidence,
                },
                care: care.guide,
            },
            care_source: care.source,
            persisted,
        })
    }
}
