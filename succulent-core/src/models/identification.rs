use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::care::CareGuide;

/// One identification result. `genus` and `species` hold the raw classifier
/// forms (`species` is the full label, e.g. `haworthia_zebrina`, or empty);
/// display formatting happens only at the response boundary.
///
/// `care_guide` is a snapshot taken at creation time and is not refreshed
/// when the care cache entry for the same taxon changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identification {
    pub id: Uuid,
    pub genus: String,
    pub species: String,
    pub confidence: f64,
    pub image_path: String,
    pub care_guide: Option<CareGuide>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Identification {
    pub fn new(
        genus: String,
        species: String,
        confidence: f64,
        image_path: String,
        care_guide: CareGuide,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            genus,
            species,
            confidence,
            image_path,
            care_guide: Some(care_guide),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}
