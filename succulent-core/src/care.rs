//! Care-guide generation through a chat-completion backend.
//!
//! The model is asked for a single JSON object with the `CareGuide` fields.
//! Replies wrapped in a Markdown code fence are accepted; anything else that
//! is not that JSON shape is a parse failure.

use std::sync::Arc;

use thiserror::Error;

use crate::completion::{ChatTurn, CompletionBackend, CompletionError, CompletionRequest};
use crate::config::LlmConfig;
use crate::label::{format_genus, format_species};
use crate::models::CareGuide;

const CARE_SYSTEM_PROMPT: &str = "You are an expert botanist specializing in succulent plants. \
Provide accurate, detailed care instructions in JSON format.";

#[derive(Error, Debug)]
pub enum CareError {
    #[error("failed to generate care instructions: {0}")]
    Completion(#[from] CompletionError),

    #[error("failed to parse care instructions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Human-readable taxon name for prompts: `"Haworthia zebrina"` or `"Haworthia"`.
pub fn taxon_display_name(genus: &str, species: &str) -> String {
    let formatted = format_species(species);
    if formatted.is_empty() {
        format_genus(genus)
    } else {
        formatted
    }
}

pub fn care_prompt(genus: &str, species: &str) -> String {
    format!(
        r#"Generate care instructions for the succulent plant: {}

Please provide specific care guidance in the following format (respond ONLY with valid JSON, no markdown formatting):

{{
  "sunlight": "<detailed sunlight requirements>",
  "watering": "<detailed watering schedule and tips>",
  "soil": "<detailed soil requirements and recommendations>",
  "notes": "<additional care tips, growth patterns, or common issues>",
  "trivia": "<interesting facts, origin, cultural significance, or fun botanical trivia about this plant>"
}}

Be specific, practical, and helpful. Include measurements and frequencies where relevant."#,
        taxon_display_name(genus, species)
    )
}

/// Parse a model reply into a `CareGuide`.
pub fn parse_care_reply(reply: &str) -> Result<CareGuide, serde_json::Error> {
    let body = strip_code_fence(reply.trim());
    let mut guide: CareGuide = serde_json::from_str(body)?;
    if guide.trivia.as_deref().is_some_and(|t| t.trim().is_empty()) {
        guide.trivia = None;
    }
    Ok(guide)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Clone)]
pub struct CareGenerator {
    backend: Arc<dyn CompletionBackend>,
    max_tokens: u32,
    temperature: f32,
}

impl CareGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            backend,
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(backend: Arc<dyn CompletionBackend>, config: &LlmConfig) -> Self {
        Self::new(backend, config.care_max_tokens, config.temperature)
    }

    pub fn request(&self, genus: &str, species: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatTurn::system(CARE_SYSTEM_PROMPT),
                ChatTurn::user(care_prompt(genus, species)),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub async fn generate(&self, genus: &str, species: &str) -> Result<CareGuide, CareError> {
        let reply = self.backend.complete(self.request(genus, species)).await?;
        let guide = parse_care_reply(&reply).map_err(|e| {
            tracing::debug!(backend = self.backend.name(), reply = %reply, "Unparseable care reply");
            e
        })?;
        tracing::info!(genus, species, "Generated care instructions");
        Ok(guide)
    }
}
