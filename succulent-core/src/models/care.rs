use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cultivation guidance for a taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareGuide {
    pub sunlight: String,
    pub watering: String,
    pub soil: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trivia: Option<String>,
}

impl CareGuide {
    /// General succulent advice used when nothing taxon-specific is available.
    pub fn generic() -> Self {
        Self {
            sunlight: "Provide bright, indirect light for most succulents.".to_string(),
            watering: "Water when soil is completely dry. Succulents prefer infrequent, deep watering."
                .to_string(),
            soil: "Use well-draining cactus or succulent mix.".to_string(),
            notes: "Care information could not be generated. These are general succulent care guidelines."
                .to_string(),
            trivia: None,
        }
    }
}

/// A cached guide keyed by the raw (genus, species) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareCacheEntry {
    pub id: Uuid,
    pub genus: String,
    pub species: String,
    pub care_guide: CareGuide,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
