//! Gemini memo generator (Generative Language API)
//!
//! Sends one `generateContent` request in JSON response mode and expects a
//! single JSON object `{ "summary": "...", "sections": { "<criterion>": "..." } }`
//! back. Transport failures, API errors and unparseable output all become
//! [`Error::Generation`].

use super::extract::truncate_chars;
use super::generator::{GeneratedMemo, MemoGenerator, MemoRequest};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::gcp::ApiFailure;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Budget for material text in one prompt
const PROMPT_MATERIAL_CHARS: usize = 120_000;

/// Gemini-backed memo writer
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiGenerator {
    /// Build from config; the API key is resolved through `api_key_ref`
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            Error::Config(format!(
                "Gemini generator needs an API key in ${}",
                config.api_key_ref
            ))
        })?;
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &GeneratorConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Prompt text for one memo
pub fn build_prompt(request: &MemoRequest) -> String {
    let mut prompt = format!(
        "You are an investment analyst drafting an investment memo for {}.\n",
        request.company_name
    );
    if let Some(sector) = &request.sector {
        prompt.push_str(&format!("Sector: {}\n", sector));
    }
    if !request.founders.is_empty() {
        prompt.push_str(&format!("Founders: {}\n", request.founders.join(", ")));
    }

    prompt.push_str(
        "\nWrite one section per criterion below. Weights show how much emphasis each section deserves:\n",
    );
    for (criterion, weight) in &request.weights {
        prompt.push_str(&format!(
            "- {} ({}): {:.0}%\n",
            criterion.key(),
            criterion.title(),
            weight * 100.0
        ));
    }

    prompt.push_str(
        "\nRespond with a JSON object: {\"summary\": string, \"sections\": {<criterion key>: string}}. \
         Use exactly the criterion keys listed above. Base every statement on the materials; say so when information is missing.\n",
    );

    let mut budget = PROMPT_MATERIAL_CHARS;
    for material in &request.materials {
        if budget == 0 {
            break;
        }
        let text = truncate_chars(&material.text, budget);
        budget = budget.saturating_sub(text.chars().count());
        prompt.push_str(&format!(
            "\n=== {} ({}) ===\n{}\n",
            material.filename, material.content_type, text
        ));
    }
    prompt
}

/// Parse model text into a memo, tolerating a Markdown code fence
pub fn parse_memo_text(text: &str) -> Result<GeneratedMemo> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body)
        .map_err(|e| Error::Generation(format!("Gemini returned malformed memo JSON: {}", e)))
}

#[async_trait]
impl MemoGenerator for GeminiGenerator {
    async fn generate(&self, request: &MemoRequest) -> Result<GeneratedMemo> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_prompt(request) }]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json"
            }
        });

        tracing::debug!(deal_id = %request.deal_id, model = %self.model, "Requesting memo from Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let failure = ApiFailure::from_response(response).await;
            return Err(Error::Generation(format!("Gemini API error: {}", failure)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Gemini response unreadable: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Generation("Gemini returned no content".to_string()));
        }
        parse_memo_text(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
