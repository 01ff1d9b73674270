//! Ollama provider: local inference over the Ollama HTTP API.
//!
//! Primary provider for cost-effective inference. Supports text and image
//! inputs; files and URLs are not supported and are ignored with a warning.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::get_config;
use crate::errors::{Result, WorkflowError};
use crate::providers::{estimate_token_budget, StructuredRequest};
use crate::schemas::StructuredSchema;
use crate::types::LlmResponse;

/// How long a health-check result stays valid before re-probing the daemon.
const HEALTH_CHECK_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug)]
pub struct OllamaProvider {
    host: String,
    model: String,
    client: reqwest::Client,
    health: Mutex<Option<(bool, Instant)>>,
}

impl OllamaProvider {
    pub fn new(model: Option<String>, host: Option<String>) -> Self {
        let config = get_config();
        Self {
            host: host.unwrap_or_else(|| config.ollama_host.clone()),
            model: model.unwrap_or_else(|| config.ollama_model().to_string()),
            client: reqwest::Client::new(),
            health: Mutex::new(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the server is running and the model is pulled.
    ///
    /// Results are cached for 30 seconds to avoid hammering the daemon.
    /// A pulled model matches if its name equals the requested model or
    /// starts with it (e.g. requested `gemma3:4b` matches the pulled
    /// `gemma3:4b-it-qat`).
    pub async fn health_check(&self) -> bool {
        let mut cached = self.health.lock().await;
        if let Some((result, checked_at)) = *cached {
            if checked_at.elapsed() < HEALTH_CHECK_TTL {
                return result;
            }
        }

        let result = self.probe().await;
        *cached = Some((result, Instant::now()));
        result
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        let response = match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Ollama health check failed: {e}");
                return false;
            }
        };

        let tags: TagsResponse = match response.json().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!("Ollama health check failed: {e}");
                return false;
            }
        };

        tags.models
            .iter()
            .any(|entry| entry.name == self.model || entry.name.starts_with(&self.model))
    }

    fn build_messages(&self, request: &StructuredRequest, prompt: &str) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_instruction {
            if !system.is_empty() {
                messages.push(json!({"role": "system", "content": system}));
            }
        }
        let mut user_message = json!({"role": "user", "content": prompt});
        if !request.images.is_empty() {
            user_message["images"] = json!(request.images);
        }
        messages.push(user_message);
        messages
    }

    /// Generate structured output enforced by Ollama's native JSON schema
    /// support, validated into `T` on the client side.
    pub async fn generate_structured<T: StructuredSchema>(
        &self,
        request: &StructuredRequest,
    ) -> Result<(T, LlmResponse)> {
        if !request.files.is_empty() || !request.urls.is_empty() {
            tracing::warn!(
                "Ollama does not support files/urls parameters. \
                 Consider using the Gemini provider for PDF/URL processing."
            );
        }

        if !self.health_check().await {
            return Err(WorkflowError::provider_unavailable(format!(
                "Ollama not available. Is 'ollama serve' running? Is model '{}' pulled?",
                self.model
            )));
        }

        let schema = T::json_schema();
        let token_budget = request
            .max_tokens
            .unwrap_or_else(|| estimate_token_budget(&schema));

        // Schema hint in the prompt grounds the model on the expected shape
        let enhanced_prompt = format!(
            "{}\n\nIMPORTANT: Respond with valid JSON matching the schema. \
             Keep each field concise and focused on key points.",
            request.prompt
        );

        let body = json!({
            "model": self.model,
            "messages": self.build_messages(request, &enhanced_prompt),
            "stream": false,
            "format": schema,
            "options": {"temperature": request.temperature, "num_predict": token_budget},
        });

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Ollama call failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkflowError::provider_unavailable(format!(
                "Ollama returned HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Ollama call failed: {e}")))?;
        let latency = start.elapsed().as_secs_f64() * 1000.0;

        let validated: T = serde_json::from_str(&chat.message.content).map_err(|e| {
            WorkflowError::schema_validation(format!("Ollama output doesn't match schema: {e}"))
        })?;

        let tokens_used = chat.eval_count.unwrap_or_else(|| {
            tracing::warn!("Ollama response missing eval_count, defaulting to 0");
            0
        });

        let llm_response = LlmResponse::new(
            chat.message.content,
            "ollama",
            &self.model,
            tokens_used,
            latency,
            0.0,
        );

        tracing::info!(
            "Ollama generated structured output in {latency:.0}ms ({tokens_used} tokens)"
        );

        Ok((validated, llm_response))
    }

    /// Generate unstructured text completion.
    pub async fn generate(&self, request: &StructuredRequest) -> Result<LlmResponse> {
        if !self.health_check().await {
            return Err(WorkflowError::provider_unavailable(format!(
                "Ollama not available. Model: {}",
                self.model
            )));
        }

        let mut options = json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }

        let body = json!({
            "model": self.model,
            "messages": self.build_messages(request, &request.prompt),
            "stream": false,
            "options": options,
        });

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Ollama call failed: {e}")))?;
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::provider_unavailable(format!("Ollama call failed: {e}")))?;
        let latency = start.elapsed().as_secs_f64() * 1000.0;

        Ok(LlmResponse::new(
            chat.message.content,
            "ollama",
            &self.model,
            chat.eval_count.unwrap_or(0),
            latency,
            0.0,
        ))
    }

    /// Local inference is free.
    pub fn cost_per_token(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matching_rules() {
        let entries = ["gemma3:4b-it-qat", "llama3:8b"];
        let requested = "gemma3:4b";
        assert!(entries
            .iter()
            .any(|name| *name == requested || name.starts_with(requested)));

        let requested = "gemma3:12b";
        assert!(!entries
            .iter()
            .any(|name| *name == requested || name.starts_with(requested)));
    }

    #[tokio::test]
    async fn test_health_check_against_dead_host_is_fast() {
        let provider = OllamaProvider::new(
            Some("gemma3:4b-it-qat".to_string()),
            Some("http://127.0.0.1:1".to_string()),
        );
        let start = Instant::now();
        assert!(!provider.health_check().await);
        assert!(start.elapsed() < Duration::from_secs(5));

        // Second call served from the 30s cache
        let start = Instant::now();
        assert!(!provider.health_check().await);
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
