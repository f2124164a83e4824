//! Care resolution integration tests: cache idempotence and fallbacks.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use succulent_core::models::CareGuide;
use succulent_core::{CareCache, CareCatalog, CareGenerator};
use succulent_server::subsystems::care::{CareResolver, CareSource};

fn resolver(
    cache: Arc<MemoryCareCache>,
    completion: Arc<FakeCompletion>,
    catalog: Option<CareCatalog>,
) -> CareResolver {
    CareResolver::new(cache, CareGenerator::new(completion, 400, 0.7), catalog)
}

fn catalog_guide() -> CareGuide {
    CareGuide {
        sunlight: "Morning sun".to_string(),
        watering: "Monthly in winter".to_string(),
        soil: "Pumice heavy".to_string(),
        notes: "From the catalog".to_string(),
        trivia: None,
    }
}

// ===========================================================================
// TEST 1: generate once, then serve from cache
// ===========================================================================
#[tokio::test]
async fn test_resolve_caches_generated_guide() {
    let cache = Arc::new(MemoryCareCache::default());
    let completion = Arc::new(FakeCompletion::healthy());
    let resolver = resolver(cache.clone(), completion.clone(), None);

    let first = resolver.resolve("haworthia", "haworthia_zebrina").await;
    assert_eq!(first.source, CareSource::Generated);
    assert_eq!(first.guide.soil, "Gritty cactus mix");
    assert_eq!(completion.care_calls(), 1);

    let cached = cache.get("haworthia", "haworthia_zebrina").await.unwrap().unwrap();
    assert_eq!(cached.care_guide, first.guide);

    let second = resolver.resolve("haworthia", "haworthia_zebrina").await;
    assert_eq!(second.source, CareSource::Cache);
    assert_eq!(second.guide, first.guide);
    assert_eq!(completion.care_calls(), 1);

    // A different key is a separate entry
    resolver.resolve("haworthia", "haworthia_cooperi").await;
    assert_eq!(completion.care_calls(), 2);
    assert_eq!(cache.len(), 2);
}

// ===========================================================================
// TEST 2: generation failure falls back to the generic guide, uncached
// ===========================================================================
#[tokio::test]
async fn test_resolve_generation_failure_is_generic() {
    let cache = Arc::new(MemoryCareCache::default());
    let completion = Arc::new(FakeCompletion::down());
    let resolver = resolver(cache.clone(), completion.clone(), None);

    let resolution = resolver.resolve("aloe", "aloe_vera").await;
    assert_eq!(resolution.source, CareSource::Generic);
    assert_eq!(resolution.guide, CareGuide::generic());
    assert_eq!(cache.len(), 0);

    // Nothing cached, so the next request tries again
    resolver.resolve("aloe", "aloe_vera").await;
    assert_eq!(completion.care_calls(), 2);
}

// ===========================================================================
// TEST 3: an unparseable reply is treated as a generation failure
// ===========================================================================
#[tokio::test]
async fn test_resolve_unparseable_reply() {
    let cache = Arc::new(MemoryCareCache::default());
    let completion = Arc::new(FakeCompletion::new(
        Some("Aloe likes sun and little water."),
        None,
    ));
    let resolver = resolver(cache.clone(), completion, None);

    let resolution = resolver.resolve("aloe", "aloe_vera").await;
    assert_eq!(resolution.source, CareSource::Generic);
    assert_eq!(cache.len(), 0);
}

// ===========================================================================
// TEST 4: fenced JSON replies are accepted
// ===========================================================================
#[tokio::test]
async fn test_resolve_accepts_fenced_reply() {
    let fenced = format!("```json\n{}\n```", CARE_REPLY);
    let cache = Arc::new(MemoryCareCache::default());
    let completion = Arc::new(FakeCompletion::new(Some(&fenced), None));
    let resolver = resolver(cache, completion, None);

    let resolution = resolver.resolve("haworthia", "haworthia_zebrina").await;
    assert_eq!(resolution.source, CareSource::Generated);
    assert_eq!(resolution.guide.watering, "Every 2-3 weeks");
}

// ===========================================================================
// TEST 5: cache failures degrade without failing resolution
// ===========================================================================
#[tokio::test]
async fn test_resolve_cache_failures_are_soft() {
    let cache = Arc::new(MemoryCareCache::default());
    cache.fail_reads.store(true, Ordering::SeqCst);
    cache.fail_writes.store(true, Ordering::SeqCst);
    let completion = Arc::new(FakeCompletion::healthy());
    let resolver = resolver(cache.clone(), completion.clone(), None);

    let resolution = resolver.resolve("gasteria", "gasteria_batesiana").await;
    assert_eq!(resolution.source, CareSource::Generated);
    assert_eq!(cache.len(), 0);

    cache.fail_reads.store(false, Ordering::SeqCst);
    let again = resolver.resolve("gasteria", "gasteria_batesiana").await;
    assert_eq!(again.source, CareSource::Generated);
    assert_eq!(completion.care_calls(), 2);
}

// ===========================================================================
// TEST 6: catalog is consulted after generation fails, species then genus
// ===========================================================================
#[tokio::test]
async fn test_resolve_catalog_fallback() {
    let mut entries = HashMap::new();
    entries.insert("echeveria".to_string(), catalog_guide());
    let catalog = CareCatalog::from_entries(entries);

    let cache = Arc::new(MemoryCareCache::default());
    let resolver = resolver(cache.clone(), Arc::new(FakeCompletion::down()), Some(catalog));

    let resolution = resolver.resolve("echeveria", "echeveria_elegans").await;
    assert_eq!(resolution.source, CareSource::Catalog);
    assert_eq!(resolution.guide.notes, "From the catalog");
    // Catalog guides are not written to the cache
    assert_eq!(cache.len(), 0);

    let miss = resolver.resolve("sedum", "sedum_morganianum").await;
    assert_eq!(miss.source, CareSource::Generic);
}

// ===========================================================================
// TEST 7: the identify flow reuses cached care across requests
// ===========================================================================
#[tokio::test]
async fn test_identify_reuses_cached_care() {
    let h = harness(
        FakeInference::returning("haworthia_zebrina", 0.85),
        FakeCompletion::healthy(),
    );

    for _ in 0..3 {
        let (status, body) =
            send(&h.router, multipart_request("image", "plant.jpg", &jpeg_bytes())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["care"]["soil"], "Gritty cactus mix");
    }

    assert_eq!(h.completion.care_calls(), 1);
    assert_eq!(h.cache.len(), 1);
    assert_eq!(h.identifications.len(), 3);
}

// ===========================================================================
// TEST 8: identify still succeeds with care generation down
// ===========================================================================
#[tokio::test]
async fn test_identify_with_generic_care() {
    let h = harness(
        FakeInference::returning("haworthia_zebrina", 0.85),
        FakeCompletion::down(),
    );

    let (status, body) = send(&h.router, multipart_request("image", "plant.jpg", &jpeg_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["care"]["soil"], CareGuide::generic().soil);
    assert!(body["care"].get("trivia").is_none());

    let rows = h.identifications.rows.lock().unwrap().clone();
    assert_eq!(rows[0].care_guide, Some(CareGuide::generic()));
}
