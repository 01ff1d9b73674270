//! Concrete LLM providers behind a uniform capability.
//!
//! Two providers exist: Ollama (local, zero-cost, image-capable) and Gemini
//! (remote, paid, all input modalities). Both expose
//! `generate_structured` returning a validated payload plus response
//! metadata, and a plain `generate` for free-text output.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::errors::Result;
use crate::schemas::StructuredSchema;
use crate::types::LlmResponse;

/// Inputs for a single generation call.
#[derive(Debug, Clone, Default)]
pub struct StructuredRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub temperature: f64,
    pub images: Vec<String>,
    pub files: Vec<String>,
    pub urls: Vec<String>,
    pub max_tokens: Option<u32>,
}

impl StructuredRequest {
    pub fn new(prompt: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// A configured provider instance.
pub enum Provider {
    Ollama(OllamaProvider),
    Gemini(GeminiProvider),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama(_) => "ollama",
            Self::Gemini(_) => "gemini",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Ollama(p) => p.model(),
            Self::Gemini(p) => p.model(),
        }
    }

    pub async fn is_available(&self) -> bool {
        match self {
            Self::Ollama(p) => p.health_check().await,
            Self::Gemini(_) => true,
        }
    }

    pub async fn generate_structured<T: StructuredSchema>(
        &self,
        request: &StructuredRequest,
    ) -> Result<(T, LlmResponse)> {
        match self {
            Self::Ollama(p) => p.generate_structured(request).await,
            Self::Gemini(p) => p.generate_structured(request).await,
        }
    }

    pub async fn generate(&self, request: &StructuredRequest) -> Result<LlmResponse> {
        match self {
            Self::Ollama(p) => p.generate(request).await,
            Self::Gemini(p) => p.generate(request).await,
        }
    }
}

/// Estimate a token budget from schema complexity.
///
/// Each field needs roughly 50-100 tokens of content; nested objects and
/// arrays of objects multiply the allocation. Capped at 2000.
pub(crate) fn estimate_token_budget(schema: &serde_json::Value) -> u32 {
    fn count_fields(schema: &serde_json::Value) -> u32 {
        let mut count = 0;
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            count += props.len() as u32;
            for prop_schema in props.values() {
                match prop_schema.get("type").and_then(|t| t.as_str()) {
                    Some("object") => count += count_fields(prop_schema) * 2,
                    Some("array") => {
                        if let Some(items) = prop_schema.get("items") {
                            if items.get("type").and_then(|t| t.as_str()) == Some("object") {
                                count += count_fields(items) * 3;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(defs) = schema.get("$defs").and_then(|d| d.as_object()) {
            for def_schema in defs.values() {
                count += count_fields(def_schema);
            }
        }
        count
    }

    let budget = 100 + count_fields(schema) * 80;
    budget.min(2000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_budget_scales_with_fields() {
        let flat = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}, "b": {"type": "number"}}
        });
        let nested = json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "a": {"type": "string"},
                            "b": {"type": "string"},
                            "c": {"type": "string"}
                        }
                    }
                }
            }
        });
        assert!(estimate_token_budget(&nested) > estimate_token_budget(&flat));
        assert!(estimate_token_budget(&nested) <= 2000);
    }

    #[test]
    fn test_request_builder() {
        let request = StructuredRequest::new("rate this", 0.4)
            .with_system_instruction("be terse");
        assert_eq!(request.prompt, "rate this");
        assert_eq!(request.system_instruction.as_deref(), Some("be terse"));
        assert!(request.images.is_empty());
    }
}
