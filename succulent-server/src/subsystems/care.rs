//! Care resolution: cache, then generation, then static fallbacks.
//!
//! `resolve` never fails. The branch it took is reported as a `CareSource`
//! so callers and tests can observe degradation explicitly:
//!
//! - `Cache`    : a guide for the exact `(genus, species)` key was cached
//! - `Generated`: the completion backend produced a guide (written back to
//!   the cache on a best-effort basis)
//! - `Catalog`  : generation failed; the static catalog had an entry
//! - `Generic`  : nothing taxon-specific was available

use std::sync::Arc;

use serde::Serialize;
use succulent_core::models::CareGuide;
use succulent_core::store::{CareCache, StoreError};
use succulent_core::{CareCatalog, CareError, CareGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CareSource {
    Cache,
    Generated,
    Catalog,
    Generic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CareResolution {
    pub guide: CareGuide,
    pub source: CareSource,
}

pub struct CareResolver {
    cache: Arc<dyn CareCache>,
    generator: CareGenerator,
    catalog: Option<CareCatalog>,
}

impl CareResolver {
    pub fn new(
        cache: Arc<dyn CareCache>,
        generator: CareGenerator,
        catalog: Option<CareCatalog>,
    ) -> Self {
        Self {
            cache,
            generator,
            catalog,
        }
    }

    /// `Ok(None)` is a miss; only `Err` is worth logging.
    pub async fn get_cached(
        &self,
        genus: &str,
        species: &str,
    ) -> Result<Option<CareGuide>, StoreError> {
        Ok(self
            .cache
            .get(genus, species)
            .await?
            .map(|entry| entry.care_guide))
    }

    pub async fn generate(&self, genus: &str, species: &str) -> Result<CareGuide, CareError> {
        self.generator.generate(genus, species).await
    }

    /// Upsert into the cache. Failure only costs a future regeneration.
    pub async fn write_cache(&self, genus: &str, species: &str, guide: &CareGuide) {
        match self.cache.upsert(genus, species, guide).await {
            Ok(_) => tracing::debug!(genus, species, "Care instructions cached"),
            Err(e) => {
                tracing::warn!(genus, species, error = %e, "Failed to cache care instructions")
            }
        }
    }

    pub async fn resolve(&self, genus: &str, species: &str) -> CareResolution {
        match self.get_cached(genus, species).await {
            Ok(Some(guide)) => {
                tracing::debug!(genus, species, "Using cached care instructions");
                return CareResolution {
                    guide,
                    source: CareSource::Cache,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(genus, species, error = %e, "Care cache lookup failed");
            }
        }

        match self.generate(genus, species).await {
            Ok(guide) => {
                self.write_cache(genus, species, &guide).await;
                return CareResolution {
                    guide,
                    source: CareSource::Generated,
                };
            }
            Err(e) => {
                tracing::warn!(genus, species, error = %e, "Care generation failed, falling back");
            }
        }

        if let Some(guide) = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.lookup(genus, species))
        {
            return CareResolution {
                guide: guide.clone(),
                source: CareSource::Catalog,
            };
        }

        CareResolution {
            guide: CareGuide::generic(),
            source: CareSource::Generic,
        }
    }
}
