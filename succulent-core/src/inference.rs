//! Client for the external image-classification service.
//!
//! The service exposes:
//! - `POST /infer` with `{"image_path": "..."}` returning ranked predictions
//! - `GET /health` for liveness
//!
//! Calls are bounded by a fixed timeout and are never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InferenceConfig;

/// One ranked classifier prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference service error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Inference service returned no predictions")]
    NoPredictions,

    #[error("Prediction '{label}' has confidence {confidence} outside [0, 1]")]
    InvalidConfidence { label: String, confidence: f64 },
}

/// Abstraction over the classification backend.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Classify the stored image. Predictions are ranked by descending
    /// confidence; the list is never empty on success.
    async fn infer(&self, image_path: &str) -> Result<Vec<Prediction>, InferenceError>;

    /// Best-effort liveness probe.
    async fn health_check(&self) -> Result<(), InferenceError>;
}

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    image_path: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
}

impl HttpInferenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn infer(&self, image_path: &str) -> Result<Vec<Prediction>, InferenceError> {
        let url = format!("{}/infer", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&InferRequest { image_path })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Inference service error");
            return Err(InferenceError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: InferResponse = response.json().await?;
        if body.predictions.is_empty() {
            return Err(InferenceError::NoPredictions);
        }

        if let Some(bad) = body
            .predictions
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.confidence))
        {
            return Err(InferenceError::InvalidConfidence {
                label: bad.label.clone(),
                confidence: bad.confidence,
            });
        }

        Ok(body.predictions)
    }

    async fn health_check(&self) -> Result<(), InferenceError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Api {
                code: status.as_u16(),
                message: "inference service unhealthy".to_string(),
            });
        }
        Ok(())
    }
}
