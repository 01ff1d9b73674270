//! Multi-dimensional idea evaluation.
//!
//! Scores an idea across seven fixed dimensions with configured weights
//! summing to 1.0. The batch entry point does all ideas in one LLM call;
//! the single-idea entry point fans out one call per dimension plus a
//! summary call.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::agents::prompts::LANGUAGE_CONSISTENCY_INSTRUCTION;
use crate::errors::{Result, WorkflowError};
use crate::providers::StructuredRequest;
use crate::router::LlmRouter;
use crate::schemas::{
    clamp_dimension, DimensionScore, MultiDimBatch, MultiDimEvaluation, MultiDimScores,
    StructuredSchema, SummaryText,
};

/// The seven dimensions and their weights. Weights sum to 1.0.
pub const DIMENSION_WEIGHTS: [(&str, f64); 7] = [
    ("feasibility", 0.20),
    ("innovation", 0.15),
    ("impact", 0.20),
    ("cost_effectiveness", 0.10),
    ("scalability", 0.15),
    ("risk_assessment", 0.10),
    ("timeline", 0.10),
];

/// Default score range for every dimension.
pub const DIMENSION_RANGE: (i32, i32) = (1, 10);

/// Temperature for evaluator calls; scoring wants determinism.
const EVALUATION_TEMPERATURE: f64 = 0.2;

#[derive(Debug)]
pub struct MultiDimEvaluator {
    router: Arc<LlmRouter>,
    range: (i32, i32),
}

impl MultiDimEvaluator {
    /// Build the evaluator. A router is mandatory; constructing without one
    /// is a configuration error.
    pub fn new(router: Option<Arc<LlmRouter>>) -> Result<Self> {
        let router = router.ok_or_else(|| {
            WorkflowError::config(
                "Multi-dimensional evaluation requires an LLM router. \
                 Set GOOGLE_API_KEY or start the local Ollama daemon.",
            )
        })?;
        Ok(Self::with_router(router))
    }

    pub fn with_router(router: Arc<LlmRouter>) -> Self {
        Self {
            router,
            range: DIMENSION_RANGE,
        }
    }

    fn validate_numeric(&self, raw: f64) -> Result<i32> {
        if !raw.is_finite() {
            return Err(WorkflowError::schema_validation("AI returned non-numeric score"));
        }
        Ok(clamp_dimension(raw, self.range.0, self.range.1))
    }

    fn build_evaluation(
        &self,
        scores: &MultiDimScores,
        summary: String,
    ) -> Result<MultiDimEvaluation> {
        let clamped: Vec<i32> = DIMENSION_WEIGHTS
            .iter()
            .map(|(name, _)| {
                let raw = scores
                    .dimension(name)
                    .ok_or_else(|| WorkflowError::schema_validation("AI returned non-numeric score"))?;
                self.validate_numeric(raw)
            })
            .collect::<Result<_>>()?;

        let overall: f64 = clamped.iter().map(|s| *s as f64).sum::<f64>() / clamped.len() as f64;
        let weighted: f64 = DIMENSION_WEIGHTS
            .iter()
            .zip(&clamped)
            .map(|((_, weight), score)| weight * *score as f64)
            .sum();
        let max = *clamped.iter().max().unwrap_or(&0);
        let min = *clamped.iter().min().unwrap_or(&0);

        Ok(MultiDimEvaluation {
            feasibility: clamped[0],
            innovation: clamped[1],
            impact: clamped[2],
            cost_effectiveness: clamped[3],
            scalability: clamped[4],
            risk_assessment: clamped[5],
            timeline: clamped[6],
            overall_score: overall,
            weighted_score: weighted,
            evaluation_summary: summary,
            confidence_interval: (max - min) as f64 / 2.0,
        })
    }

    fn dimension_prompt(dimension: &str, idea: &str, topic: &str, context: &str) -> String {
        format!(
            "Topic: {topic}\nContext: {context}\n\n\
             Rate the following idea on the '{dimension}' dimension with an \
             integer score from 1 (worst) to 10 (best), with brief reasoning.\n\n\
             Idea: {idea}\n\n\
             {LANGUAGE_CONSISTENCY_INSTRUCTION}"
        )
    }

    fn summary_prompt(idea: &str, topic: &str, scores: &MultiDimEvaluation) -> String {
        let score_lines: Vec<String> = scores
            .dimension_scores()
            .iter()
            .map(|(name, score)| format!("{name}: {score}"))
            .collect();
        format!(
            "Topic: {topic}\n\n\
             Summarize in one short paragraph how the following idea scores \
             across these dimensions:\n{}\n\nIdea: {idea}\n\n\
             {LANGUAGE_CONSISTENCY_INSTRUCTION}",
            score_lines.join("\n")
        )
    }

    fn batch_prompt(ideas: &[String], topic: &str, context: &str) -> String {
        let mut body = String::new();
        for (index, idea) in ideas.iter().enumerate() {
            body.push_str(&format!("IDEA_{index}: {idea}\n"));
        }
        let dimensions: Vec<&str> = DIMENSION_WEIGHTS.iter().map(|(name, _)| *name).collect();
        format!(
            "Topic: {topic}\nContext: {context}\n\n\
             Score every idea below on each of these dimensions with an integer \
             from 1 (worst) to 10 (best): {}.\n\
             Also write a one-sentence evaluation_summary per idea.\n\
             Return one record per idea, in input order, with idea_index \
             starting at 0.\n\n{body}\n\
             {LANGUAGE_CONSISTENCY_INSTRUCTION}",
            dimensions.join(", ")
        )
    }

    /// Evaluate one idea: one call per dimension, run concurrently, plus a
    /// summary call.
    pub async fn evaluate_idea(
        &self,
        idea: &str,
        topic: &str,
        context: &str,
    ) -> Result<(MultiDimEvaluation, u64)> {
        let dimension_calls = DIMENSION_WEIGHTS.iter().map(|(name, _)| {
            let request = StructuredRequest::new(
                Self::dimension_prompt(name, idea, topic, context),
                EVALUATION_TEMPERATURE,
            );
            async move {
                self.router
                    .generate_structured::<DimensionScore>(&request)
                    .await
            }
        });

        let results = try_join_all(dimension_calls).await?;
        let mut tokens: u64 = results.iter().map(|(_, resp)| resp.tokens_used).sum();

        let raw = MultiDimScores {
            idea_index: 0,
            feasibility: results[0].0.score,
            innovation: results[1].0.score,
            impact: results[2].0.score,
            cost_effectiveness: results[3].0.score,
            scalability: results[4].0.score,
            risk_assessment: results[5].0.score,
            timeline: results[6].0.score,
        };
        let mut evaluation = self.build_evaluation(&raw, String::new())?;

        let summary_request = StructuredRequest::new(
            Self::summary_prompt(idea, topic, &evaluation),
            EVALUATION_TEMPERATURE,
        );
        let (summary, response) = self
            .router
            .generate_structured::<SummaryText>(&summary_request)
            .await?;
        tokens += response.tokens_used;
        evaluation.evaluation_summary = summary.summary;

        Ok((evaluation, tokens))
    }

    /// Evaluate all ideas in a single batched call. Summaries ride along in
    /// the same response so the call budget stays at one.
    pub async fn evaluate_ideas_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
    ) -> Result<(Vec<MultiDimEvaluation>, u64)> {
        if ideas.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let request = StructuredRequest::new(
            Self::batch_prompt(ideas, topic, context),
            EVALUATION_TEMPERATURE,
        );
        let (payload, response) = self
            .router
            .generate_structured::<MultiDimBatchWithSummaries>(&request)
            .await?;

        let mut records = payload.evaluations;
        if records.len() != ideas.len() {
            return Err(WorkflowError::batch_length_mismatch(
                "multidim",
                ideas.len(),
                records.len(),
            ));
        }
        records.sort_by_key(|record| record.scores.idea_index);

        let evaluations = records
            .into_iter()
            .map(|record| self.build_evaluation(&record.scores, record.evaluation_summary))
            .collect::<Result<Vec<_>>>()?;

        Ok((evaluations, response.tokens_used))
    }
}

/// Batch record: the seven scores plus an inline summary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MultiDimRecord {
    #[serde(flatten)]
    pub scores: MultiDimScores,
    #[serde(default)]
    pub evaluation_summary: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MultiDimBatchWithSummaries {
    pub evaluations: Vec<MultiDimRecord>,
}

impl StructuredSchema for MultiDimBatchWithSummaries {
    const SCHEMA_NAME: &'static str = "madspark::multidim::MultiDimBatchWithSummaries";

    fn json_schema() -> serde_json::Value {
        let mut schema = MultiDimBatch::json_schema();
        if let Some(properties) = schema
            .pointer_mut("/properties/evaluations/items/properties")
            .and_then(|v| v.as_object_mut())
        {
            properties.insert(
                "evaluation_summary".to_string(),
                serde_json::json!({"type": "string"}),
            );
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, ProviderChoice};

    fn offline_router() -> Arc<LlmRouter> {
        Arc::new(LlmRouter::new(
            Arc::new(LlmConfig {
                default_provider: ProviderChoice::Local,
                ollama_host: "http://127.0.0.1:1".to_string(),
                gemini_api_key: None,
                cache_enabled: false,
                ..Default::default()
            }),
            None,
            false,
        ))
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = DIMENSION_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_router_is_config_error() {
        let result = MultiDimEvaluator::new(None);
        match result {
            Err(WorkflowError::Config(msg)) => assert!(msg.contains("GOOGLE_API_KEY")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_evaluation_aggregates() {
        let evaluator = MultiDimEvaluator::new(Some(offline_router())).unwrap();
        let scores = MultiDimScores {
            idea_index: 0,
            feasibility: 8.0,
            innovation: 8.0,
            impact: 8.0,
            cost_effectiveness: 8.0,
            scalability: 8.0,
            risk_assessment: 8.0,
            timeline: 8.0,
        };
        let evaluation = evaluator
            .build_evaluation(&scores, "uniform".to_string())
            .unwrap();
        assert!((evaluation.overall_score - 8.0).abs() < 1e-9);
        assert!((evaluation.weighted_score - 8.0).abs() < 1e-9);
        assert_eq!(evaluation.confidence_interval, 0.0);
    }

    #[test]
    fn test_build_evaluation_clamps_out_of_range() {
        let evaluator = MultiDimEvaluator::new(Some(offline_router())).unwrap();
        let scores = MultiDimScores {
            idea_index: 0,
            feasibility: 0.0,
            innovation: 14.0,
            impact: 5.4,
            cost_effectiveness: 5.5,
            scalability: 5.0,
            risk_assessment: 5.0,
            timeline: 5.0,
        };
        let evaluation = evaluator.build_evaluation(&scores, String::new()).unwrap();
        assert_eq!(evaluation.feasibility, 1);
        assert_eq!(evaluation.innovation, 10);
        assert_eq!(evaluation.impact, 5);
        assert_eq!(evaluation.cost_effectiveness, 6);
    }

    #[test]
    fn test_non_numeric_score_is_error() {
        let evaluator = MultiDimEvaluator::new(Some(offline_router())).unwrap();
        let scores = MultiDimScores {
            idea_index: 0,
            feasibility: f64::NAN,
            innovation: 5.0,
            impact: 5.0,
            cost_effectiveness: 5.0,
            scalability: 5.0,
            risk_assessment: 5.0,
            timeline: 5.0,
        };
        let result = evaluator.build_evaluation(&scores, String::new());
        match result {
            Err(WorkflowError::SchemaValidation(msg)) => {
                assert!(msg.contains("non-numeric"));
            }
            other => panic!("expected schema validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_weighted_differs_from_overall_when_uneven() {
        let evaluator = MultiDimEvaluator::new(Some(offline_router())).unwrap();
        let scores = MultiDimScores {
            idea_index: 0,
            feasibility: 10.0,
            innovation: 2.0,
            impact: 10.0,
            cost_effectiveness: 2.0,
            scalability: 2.0,
            risk_assessment: 2.0,
            timeline: 2.0,
        };
        let evaluation = evaluator.build_evaluation(&scores, String::new()).unwrap();
        // Heavier weights on feasibility and impact pull the weighted score up
        assert!(evaluation.weighted_score > evaluation.overall_score);
    }

    #[test]
    fn test_batch_schema_includes_summary_field() {
        let schema = MultiDimBatchWithSummaries::json_schema();
        let properties = schema
            .pointer("/properties/evaluations/items/properties")
            .unwrap();
        assert!(properties.get("evaluation_summary").is_some());
    }
}
