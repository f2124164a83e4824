//! In-memory fakes of every capability trait plus request helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use succulent_core::models::{CareCacheEntry, CareGuide, ChatMessage, Identification, Sender};
use succulent_core::store::clamp_page;
use succulent_core::{
    CareCache, ChatStore, CompletionBackend, CompletionError, CompletionRequest,
    IdentificationStore, InferenceBackend, InferenceError, Prediction, StoreError,
    SucculentConfig,
};
use succulent_server::http::{build_router, Backends, HttpState};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const CARE_REPLY: &str = r#"{"sunlight": "Bright, indirect light", "watering": "Every 2-3 weeks", "soil": "Gritty cactus mix", "notes": "Forms clumps of offsets", "trivia": "Its white bands resemble a zebra"}"#;

fn simulated() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

// ============================================================================
// Inference
// ============================================================================

pub struct FakeInference {
    predictions: Option<Vec<Prediction>>,
    pub calls: AtomicUsize,
    pub last_path: Mutex<Option<String>>,
}

impl FakeInference {
    pub fn returning(label: &str, confidence: f64) -> Self {
        Self {
            predictions: Some(vec![Prediction {
                label: label.to_string(),
                confidence,
            }]),
            calls: AtomicUsize::new(0),
            last_path: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            predictions: None,
            calls: AtomicUsize::new(0),
            last_path: Mutex::new(None),
        }
    }
}

#[async_trait]
impl InferenceBackend for FakeInference {
    async fn infer(&self, image_path: &str) -> Result<Vec<Prediction>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(image_path.to_string());
        self.predictions.clone().ok_or(InferenceError::Api {
            code: 503,
            message: "model not loaded".to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

// ============================================================================
// Completion: answers care prompts and chat prompts separately
// ============================================================================

pub struct FakeCompletion {
    care_reply: Option<String>,
    chat_reply: Option<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn new(care_reply: Option<&str>, chat_reply: Option<&str>) -> Self {
        Self {
            care_reply: care_reply.map(str::to_string),
            chat_reply: chat_reply.map(str::to_string),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::new(Some(CARE_REPLY), Some("Water it sparingly."))
    }

    pub fn down() -> Self {
        Self::new(None, None)
    }

    fn is_care_request(request: &CompletionRequest) -> bool {
        request
            .messages
            .first()
            .is_some_and(|m| m.content.starts_with("You are an expert botanist"))
    }

    pub fn care_calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| Self::is_care_request(r))
            .count()
    }

    pub fn chat_requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !Self::is_care_request(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let reply = if Self::is_care_request(&request) {
            self.care_reply.clone()
        } else {
            self.chat_reply.clone()
        };
        self.requests.lock().unwrap().push(request);
        reply.ok_or(CompletionError::Api {
            code: 500,
            message: "upstream unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct MemoryIdentificationStore {
    pub rows: Mutex<Vec<Identification>>,
    pub fail_create: AtomicBool,
}

impl MemoryIdentificationStore {
    pub fn insert(&self, record: Identification) {
        self.rows.lock().unwrap().push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentificationStore for MemoryIdentificationStore {
    async fn create(&self, record: &Identification) -> Result<Identification, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(simulated());
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(record.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identification, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all(&self, limit: i64, offset: i64) -> Result<Vec<Identification>, StoreError> {
        let (limit, offset) = clamp_page(limit, offset);
        let mut live: Vec<Identification> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .count() as i64)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
        {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[derive(Default)]
pub struct MemoryChatStore {
    pub rows: Mutex<Vec<ChatMessage>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_assistant_writes: AtomicBool,
}

impl MemoryChatStore {
    pub fn for_identification(&self, id: Uuid) -> Vec<ChatMessage> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.identification_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst)
            || (message.sender == Sender::Assistant
                && self.fail_assistant_writes.load(Ordering::SeqCst))
        {
            return Err(simulated());
        }
        self.rows.lock().unwrap().push(message.clone());
        Ok(message.clone())
    }

    async fn get_by_identification_id(
        &self,
        identification_id: Uuid,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(simulated());
        }
        Ok(self.for_identification(identification_id))
    }

    async fn get_latest_messages(
        &self,
        identification_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(simulated());
        }
        let all = self.for_identification(identification_id);
        let start = all.len().saturating_sub(limit.max(0) as usize);
        Ok(all[start..].to_vec())
    }

    async fn count_by_identification_id(&self, identification_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.for_identification(identification_id).len() as i64)
    }
}

#[derive(Default)]
pub struct MemoryCareCache {
    pub entries: Mutex<HashMap<(String, String), CareCacheEntry>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryCareCache {
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl CareCache for MemoryCareCache {
    async fn get(&self, genus: &str, species: &str) -> Result<Option<CareCacheEntry>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(simulated());
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(genus.to_string(), species.to_string()))
            .cloned())
    }

    async fn upsert(
        &self,
        genus: &str,
        species: &str,
        guide: &CareGuide,
    ) -> Result<CareCacheEntry, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated());
        }
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry((genus.to_string(), species.to_string()))
            .and_modify(|e| {
                e.care_guide = guide.clone();
                e.updated_at = now;
            })
            .or_insert_with(|| CareCacheEntry {
                id: Uuid::new_v4(),
                genus: genus.to_string(),
                species: species.to_string(),
                care_guide: guide.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(entry.clone())
    }

    async fn update(&self, genus: &str, species: &str, guide: &CareGuide) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&(genus.to_string(), species.to_string())) {
            Some(entry) => {
                entry.care_guide = guide.clone();
                entry.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub router: Router,
    pub inference: Arc<FakeInference>,
    pub completion: Arc<FakeCompletion>,
    pub identifications: Arc<MemoryIdentificationStore>,
    pub chats: Arc<MemoryChatStore>,
    pub cache: Arc<MemoryCareCache>,
    pub upload_dir: TempDir,
}

pub fn test_config(upload_dir: &std::path::Path) -> SucculentConfig {
    let mut config =
        SucculentConfig::load("/nonexistent/succulent-test.toml").expect("default config");
    config.upload.dir = upload_dir.display().to_string();
    config.upload.max_bytes = 1024;
    config.identification.species_threshold = 0.4;
    config.chat.context_window = 10;
    config.server.cors = true;
    config
}

pub fn harness(inference: FakeInference, completion: FakeCompletion) -> Harness {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = test_config(upload_dir.path());

    let inference = Arc::new(inference);
    let completion = Arc::new(completion);
    let identifications = Arc::new(MemoryIdentificationStore::default());
    let chats = Arc::new(MemoryChatStore::default());
    let cache = Arc::new(MemoryCareCache::default());

    let backends = Backends {
        inference: inference.clone(),
        completion: completion.clone(),
        identifications: identifications.clone(),
        chats: chats.clone(),
        care_cache: cache.clone(),
        catalog: None,
    };
    let state = Arc::new(HttpState::new(&config, backends).unwrap());

    Harness {
        router: build_router(state),
        inference,
        completion,
        identifications,
        chats,
        cache,
        upload_dir,
    }
}

pub fn stored_identification(genus: &str, species: &str, confidence: f64) -> Identification {
    Identification::new(
        genus.to_string(),
        species.to_string(),
        confidence,
        format!("./uploads/{}.jpg", Uuid::new_v4()),
        CareGuide::generic(),
    )
}

// ============================================================================
// Requests
// ============================================================================

const BOUNDARY: &str = "succulent-test-boundary";

pub fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/identify")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Dispatch through the router; an empty body decodes as `Null`.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

pub fn jpeg_bytes() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(b"fake jpeg payload");
    data
}
