//! Core record types shared across the pipeline.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ModelTier, ProviderChoice};
use crate::inference::{InferenceResult, InferenceType};
use crate::schemas::{AdvocacyItem, MultiDimEvaluation, SkepticismItem};
use crate::temperature::TemperaturePreset;

/// Metadata carried alongside every validated LLM payload.
///
/// Enables monitoring and caching throughout the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: f64,
    pub cost: f64,
    #[serde(default)]
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

impl LlmResponse {
    pub fn new(text: String, provider: &str, model: &str, tokens_used: u64, latency_ms: f64, cost: f64) -> Self {
        Self {
            text,
            provider: provider.to_string(),
            model: model.to_string(),
            tokens_used,
            latency_ms,
            cost,
            cached: false,
            timestamp: Utc::now(),
        }
    }
}

/// Output verbosity for the CLI collaborator. Affects formatting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    Brief,
    #[default]
    Simple,
    Detailed,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "simple" => Ok(Self::Simple),
            "detailed" => Ok(Self::Detailed),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}

/// Named options for a workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// How many top-scored ideas advance to stages 4-6 (1..=10).
    pub num_top_candidates: usize,
    /// Named creativity preset; overridden by `temperature` when set.
    pub temperature_preset: Option<TemperaturePreset>,
    /// Explicit base temperature in [0, 1].
    pub temperature: Option<f64>,
    /// Advocate + skeptic stages; standard in the pipeline.
    pub enhanced_reasoning: bool,
    pub multi_dimensional_eval: bool,
    pub logical_inference: Option<InferenceType>,
    pub novelty_filter_enabled: bool,
    pub similarity_threshold: f64,
    pub enable_cache: bool,
    /// Overall workflow timeout.
    pub timeout: Duration,
    pub per_call_timeout: Duration,
    pub per_stage_timeout: Duration,
    pub max_concurrent_calls: usize,
    pub provider: ProviderChoice,
    pub model_tier: ModelTier,
    pub no_fallback: bool,
    pub output_mode: OutputMode,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            num_top_candidates: 1,
            temperature_preset: None,
            temperature: None,
            enhanced_reasoning: true,
            multi_dimensional_eval: false,
            logical_inference: None,
            novelty_filter_enabled: true,
            similarity_threshold: 0.8,
            enable_cache: true,
            timeout: Duration::from_secs(1200),
            per_call_timeout: Duration::from_secs(30),
            per_stage_timeout: Duration::from_secs(60),
            max_concurrent_calls: 10,
            provider: ProviderChoice::Auto,
            model_tier: ModelTier::Fast,
            no_fallback: false,
            output_mode: OutputMode::Simple,
        }
    }
}

impl WorkflowOptions {
    /// Number of top candidates clamped to the supported range.
    pub fn effective_top_candidates(&self) -> usize {
        self.num_top_candidates.clamp(1, 10)
    }
}

/// A single proposal carried through the six pipeline stages.
///
/// Created by stage 1 and enriched in place through stages 2-6. The `idea`
/// and `text` fields are aliases kept equal for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnrichedIdea {
    pub idea: String,
    pub text: String,
    pub score: i32,
    pub critique: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advocacy: Option<AdvocacyItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skepticism: Option<SkepticismItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_idea: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_critique: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_dimensional_evaluation: Option<MultiDimEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_multi_dimensional_evaluation: Option<MultiDimEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_inference: Option<InferenceResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<String>,
}

impl EnrichedIdea {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            idea: text.clone(),
            text,
            ..Default::default()
        }
    }

    /// Keep the `idea` alias equal to `text`.
    pub fn normalize_fields(&mut self) {
        if self.idea.is_empty() && !self.text.is_empty() {
            self.idea = self.text.clone();
        } else if self.text.is_empty() && !self.idea.is_empty() {
            self.text = self.idea.clone();
        } else if self.idea != self.text {
            self.idea = self.text.clone();
        }
    }

    /// Apply the improved evaluation, maintaining the score-delta invariant.
    pub fn set_improved_score(&mut self, improved_score: i32) {
        self.improved_score = Some(improved_score);
        self.score_delta = Some(improved_score - self.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_parity() {
        let mut idea = EnrichedIdea::new("solar microgrids");
        assert_eq!(idea.idea, idea.text);

        idea.text = "updated text".to_string();
        idea.normalize_fields();
        assert_eq!(idea.idea, "updated text");
        assert_eq!(idea.idea, idea.text);
    }

    #[test]
    fn test_score_delta_invariant() {
        let mut idea = EnrichedIdea::new("bike lanes");
        idea.score = 6;
        idea.set_improved_score(9);
        assert_eq!(idea.score_delta, Some(3));

        idea.set_improved_score(4);
        assert_eq!(idea.score_delta, Some(-2));
    }

    #[test]
    fn test_options_clamp_top_candidates() {
        let mut options = WorkflowOptions::default();
        options.num_top_candidates = 0;
        assert_eq!(options.effective_top_candidates(), 1);
        options.num_top_candidates = 25;
        assert_eq!(options.effective_top_candidates(), 10);
        options.num_top_candidates = 3;
        assert_eq!(options.effective_top_candidates(), 3);
    }
}
