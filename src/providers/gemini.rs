//! Gemini provider: remote inference over the generateContent REST API.
//!
//! Paid provider supporting all input modalities. Used for the quality tier
//! and as a fallback when the local daemon is down.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::get_config;
use crate::errors::{Result, WorkflowError};
use crate::providers::StructuredRequest;
use crate::schemas::StructuredSchema;
use crate::types::LlmResponse;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Blended cost estimate per token in USD.
const COST_PER_TOKEN: f64 = 0.000_000_3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: u64,
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Build the provider. Fails when the API key is missing or looks like
    /// a placeholder; the router then leaves the remote side unavailable.
    pub fn new(api_key: Option<String>, model: Option<String>) -> Result<Self> {
        let config = get_config();
        let api_key = api_key.or_else(|| config.gemini_api_key.clone()).ok_or_else(|| {
            WorkflowError::config("GOOGLE_API_KEY not set; remote provider unavailable")
        })?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| config.gemini_model.clone()),
            client: reqwest::Client::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &StructuredRequest, schema: Option<&Value>) -> Value {
        let mut parts = vec![json!({"text": request.prompt})];
        // Images/files ride along as inline references; URLs are appended as
        // context the model can read.
        for image in &request.images {
            parts.push(json!({"text": format!("[image] {image}")}));
        }
        for file in &request.files {
            parts.push(json!({"text": format!("[file] {file}")}));
        }
        for url in &request.urls {
            parts.push(json!({"text": format!("[url] {url}")}));
        }

        let mut generation_config = json!({"temperature": request.temperature});
        if let Some(schema) = schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = schema.clone();
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system_instruction {
            if !system.is_empty() {
                body["systemInstruction"] = json!({"parts": [{"text": system}]});
            }
        }
        body
    }

    async fn call(&self, body: &Value) -> Result<(String, u64, f64)> {
        let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Gemini call failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(WorkflowError::provider_unavailable(format!(
                "Gemini returned HTTP {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Gemini call failed: {e}")))?;
        let latency = start.elapsed().as_secs_f64() * 1000.0;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                WorkflowError::provider_unavailable("Gemini returned no candidates".to_string())
            })?;
        let tokens = parsed
            .usage_metadata
            .map(|m| m.total_token_count)
            .unwrap_or(0);

        Ok((text, tokens, latency))
    }

    pub async fn generate_structured<T: StructuredSchema>(
        &self,
        request: &StructuredRequest,
    ) -> Result<(T, LlmResponse)> {
        let schema = T::json_schema();
        let body = self.build_body(request, Some(&schema));
        let (text, tokens, latency) = self.call(&body).await?;

        let validated: T = serde_json::from_str(&text).map_err(|e| {
            WorkflowError::schema_validation(format!("Gemini output doesn't match schema: {e}"))
        })?;

        let response = LlmResponse::new(
            text,
            "gemini",
            &self.model,
            tokens,
            latency,
            tokens as f64 * COST_PER_TOKEN,
        );

        tracing::info!("Gemini generated structured output in {latency:.0}ms ({tokens} tokens)");

        Ok((validated, response))
    }

    pub async fn generate(&self, request: &StructuredRequest) -> Result<LlmResponse> {
        let body = self.build_body(request, None);
        let (text, tokens, latency) = self.call(&body).await?;
        Ok(LlmResponse::new(
            text,
            "gemini",
            &self.model,
            tokens,
            latency,
            tokens as f64 * COST_PER_TOKEN,
        ))
    }

    pub fn cost_per_token(&self) -> f64 {
        COST_PER_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_key_is_config_error() {
        crate::config::reset_config();
        std::env::remove_var("GOOGLE_API_KEY");
        let result = GeminiProvider::new(None, None);
        assert!(matches!(result, Err(WorkflowError::Config(_))));
        crate::config::reset_config();
    }

    #[test]
    fn test_body_includes_schema_and_system_instruction() {
        let provider = GeminiProvider::new(
            Some("AIzaSyD4u8fake9keyv4lue0987654321".to_string()),
            Some("gemini-2.5-flash".to_string()),
        )
        .unwrap();

        let request = StructuredRequest::new("rate this", 0.2)
            .with_system_instruction("respond in Japanese");
        let schema = json!({"type": "object"});
        let body = provider.build_body(&request, Some(&schema));

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "respond in Japanese"
        );
    }

    #[test]
    fn test_body_includes_multimodal_inputs() {
        let provider = GeminiProvider::new(
            Some("AIzaSyD4u8fake9keyv4lue0987654321".to_string()),
            None,
        )
        .unwrap();

        let mut request = StructuredRequest::new("summarize", 0.2);
        request.urls = vec!["https://example.com/paper".to_string()];
        let body = provider.build_body(&request, None);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[1]["text"].as_str().unwrap().contains("example.com"));
    }
}
