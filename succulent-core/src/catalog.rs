//! Static care catalog loaded from a JSON file of `taxon key -> care guide`.
//!
//! Keys are either full labels (`haworthia_zebrina`) or bare genera
//! (`haworthia`). Lookups try the species key first, then the genus.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::models::CareGuide;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read care catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse care catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CareCatalog {
    entries: HashMap<String, CareGuide>,
}

impl CareCatalog {
    pub fn from_entries(entries: HashMap<String, CareGuide>) -> Self {
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: display.clone(),
            source,
        })?;
        let entries = serde_json::from_str(&data).map_err(|source| CatalogError::Parse {
            path: display,
            source,
        })?;
        Ok(Self { entries })
    }

    pub fn lookup(&self, genus: &str, species: &str) -> Option<&CareGuide> {
        if !species.is_empty() {
            if let Some(guide) = self.entries.get(species) {
                return Some(guide);
            }
        }
        if !genus.is_empty() {
            return self.entries.get(genus);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
