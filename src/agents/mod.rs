//! LLM-backed agent roles: idea generator, critic, advocate, skeptic.
//!
//! Each role has single-item and batch variants. All variants construct a
//! deterministic prompt, request schema-validated structured output through
//! the router, and return the payload together with the token count. Batch
//! responses are re-ordered by `idea_index` and length-checked.
//!
//! When no provider is available, every caller returns deterministic mock
//! payloads tagged `[DEGRADED MODE]`; mock mode never errors.

pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{Result, WorkflowError};
use crate::inference::{InferenceResult, InferenceType, LogicalInferenceEngine};
use crate::multidim::MultiDimEvaluator;
use crate::parsing::JsonParser;
use crate::providers::StructuredRequest;
use crate::router::LlmRouter;
use crate::schemas::{
    clamp_score, AdvocacyBatch, AdvocacyItem, Evaluation, EvaluationBatch, IdeaList,
    ImprovementBatch, ImprovementItem, MultiDimEvaluation, SkepticismBatch, SkepticismItem,
    TitledPoint,
};

pub use prompts::LANGUAGE_CONSISTENCY_INSTRUCTION;

/// Input to the advocate: the idea plus the critic's evaluation of it.
#[derive(Debug, Clone)]
pub struct AdvocacyInput {
    pub idea: String,
    pub evaluation: String,
}

impl AdvocacyInput {
    pub fn validate(&self) -> Result<()> {
        if self.idea.trim().is_empty() {
            return Err(WorkflowError::validation("advocate input requires a non-empty idea"));
        }
        if self.evaluation.trim().is_empty() {
            return Err(WorkflowError::validation(
                "advocate input requires a non-empty evaluation",
            ));
        }
        Ok(())
    }
}

/// Input to the skeptic: the idea plus the critic's evaluation of it.
///
/// The skeptic runs concurrently with the advocate, so it works from the
/// evaluation rather than the advocacy.
#[derive(Debug, Clone)]
pub struct SkepticismInput {
    pub idea: String,
    pub evaluation: String,
}

impl SkepticismInput {
    pub fn validate(&self) -> Result<()> {
        if self.idea.trim().is_empty() {
            return Err(WorkflowError::validation("skeptic input requires a non-empty idea"));
        }
        if self.evaluation.trim().is_empty() {
            return Err(WorkflowError::validation(
                "skeptic input requires a non-empty evaluation",
            ));
        }
        Ok(())
    }
}

/// Input to the improver: the idea plus everything accumulated about it.
#[derive(Debug, Clone)]
pub struct ImprovementInput {
    pub idea: String,
    pub critique: String,
    pub advocacy: String,
    pub skepticism: String,
}

impl ImprovementInput {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("idea", &self.idea),
            ("critique", &self.critique),
            ("advocacy", &self.advocacy),
            ("skepticism", &self.skepticism),
        ] {
            if value.trim().is_empty() {
                return Err(WorkflowError::validation(format!(
                    "improve input requires a non-empty {field}"
                )));
            }
        }
        Ok(())
    }
}

/// The seam between the orchestrator and the LLM layer.
///
/// Production uses `RouterAgents`; tests substitute deterministic doubles.
#[async_trait]
pub trait AgentSuite: Send + Sync {
    async fn generate_ideas(
        &self,
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<String>, u64)>;

    async fn evaluate_ideas(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
        temperature: f64,
        re_evaluation: bool,
    ) -> Result<(Vec<Evaluation>, u64)>;

    async fn advocate_ideas_batch(
        &self,
        items: &[AdvocacyInput],
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<AdvocacyItem>, u64)>;

    async fn advocate_idea(
        &self,
        item: &AdvocacyInput,
        context: &str,
        temperature: f64,
    ) -> Result<(AdvocacyItem, u64)>;

    async fn criticize_ideas_batch(
        &self,
        items: &[SkepticismInput],
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<SkepticismItem>, u64)>;

    async fn criticize_idea(
        &self,
        item: &SkepticismInput,
        context: &str,
        temperature: f64,
    ) -> Result<(SkepticismItem, u64)>;

    async fn improve_ideas_batch(
        &self,
        items: &[ImprovementInput],
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<ImprovementItem>, u64)>;

    async fn improve_idea(
        &self,
        item: &ImprovementInput,
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(ImprovementItem, u64)>;

    async fn evaluate_multi_dimensional_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
    ) -> Result<(Vec<MultiDimEvaluation>, u64)>;

    async fn analyze_logical_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
        analysis_type: InferenceType,
    ) -> Result<(Vec<InferenceResult>, u64)>;
}

/// Re-order a batch response by `idea_index` and verify alignment with the
/// input.
fn align_batch<T>(
    mut items: Vec<T>,
    expected: usize,
    batch_type: &str,
    index_of: impl Fn(&T) -> usize,
) -> Result<Vec<T>> {
    if items.len() != expected {
        return Err(WorkflowError::batch_length_mismatch(
            batch_type,
            expected,
            items.len(),
        ));
    }
    items.sort_by_key(|item| index_of(item));
    Ok(items)
}

/// Production agent suite backed by the LLM router.
pub struct RouterAgents {
    router: Arc<LlmRouter>,
    parser: JsonParser,
    multidim: MultiDimEvaluator,
    inference: LogicalInferenceEngine,
}

impl RouterAgents {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self {
            multidim: MultiDimEvaluator::with_router(Arc::clone(&router)),
            inference: LogicalInferenceEngine::new(Arc::clone(&router)),
            parser: JsonParser::new(),
            router,
        }
    }

    pub fn router(&self) -> &Arc<LlmRouter> {
        &self.router
    }

    pub fn parser(&self) -> &JsonParser {
        &self.parser
    }

    async fn mock_mode(&self) -> bool {
        !self.router.has_provider().await
    }

    /// Legacy recovery: re-ask for free text and run it through the parsing
    /// fallback chain.
    async fn evaluate_via_parser(
        &self,
        request: &StructuredRequest,
        expected: usize,
    ) -> Result<(Vec<Evaluation>, u64)> {
        let response = self.router.generate(request).await?;
        let parsed = self
            .parser
            .parse(&response.text, Some(expected))
            .ok_or_else(|| WorkflowError::Parsing("no evaluation records found".to_string()))?;

        let records: Vec<Value> = match parsed {
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            _ => return Err(WorkflowError::Parsing("unexpected parse shape".to_string())),
        };

        let mut evaluations: Vec<Evaluation> = records
            .into_iter()
            .map(|record| Evaluation {
                score: clamp_score(record.get("score").and_then(Value::as_f64).unwrap_or(0.0)),
                comment: record
                    .get("comment")
                    .and_then(Value::as_str)
                    .unwrap_or("Failed to parse evaluation")
                    .to_string(),
            })
            .collect();

        while evaluations.len() < expected {
            evaluations.push(Evaluation {
                score: 0,
                comment: "Failed to parse evaluation".to_string(),
            });
        }
        evaluations.truncate(expected);
        Ok((evaluations, response.tokens_used))
    }
}

const MOCK_SCORES: [i32; 5] = [8, 6, 9, 7, 5];

fn mock_ideas(topic: &str) -> Vec<String> {
    (1..=3)
        .map(|i| format!("Mock idea {i}: a practical take on {topic}"))
        .collect()
}

fn mock_advocacy(index: usize) -> AdvocacyItem {
    AdvocacyItem {
        idea_index: index,
        strengths: vec![TitledPoint {
            title: "Addresses the topic".to_string(),
            description: "Has potential for development".to_string(),
        }],
        opportunities: Vec::new(),
        addressing_concerns: Vec::new(),
        formatted: "[DEGRADED MODE]\nSTRENGTHS:\n• Addresses the topic\n• Has potential for development".to_string(),
    }
}

fn mock_skepticism(index: usize) -> SkepticismItem {
    SkepticismItem {
        idea_index: index,
        critical_flaws: vec![crate::schemas::SkepticPoint::Text(
            "Implementation challenges".to_string(),
        )],
        risks_challenges: vec![crate::schemas::SkepticPoint::Text(
            "Resource requirements need evaluation".to_string(),
        )],
        questionable_assumptions: Vec::new(),
        missing_considerations: Vec::new(),
        formatted: "[DEGRADED MODE]\nCRITICAL FLAWS:\n• Implementation challenges\n• Resource requirements need evaluation".to_string(),
    }
}

fn mock_improvement(index: usize, idea: &str) -> ImprovementItem {
    ImprovementItem {
        idea_index: index,
        improved_title: "Enhanced version".to_string(),
        improved_description: format!("[DEGRADED MODE] {idea} (with improvements based on feedback)"),
        key_improvements: vec!["Incorporates review feedback".to_string()],
        implementation_steps: None,
        differentiators: None,
    }
}

#[async_trait]
impl AgentSuite for RouterAgents {
    async fn generate_ideas(
        &self,
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<String>, u64)> {
        if topic.trim().is_empty() {
            return Err(WorkflowError::validation("topic must not be empty"));
        }
        if self.mock_mode().await {
            return Ok((mock_ideas(topic), 0));
        }

        let request = StructuredRequest::new(prompts::idea_generation_prompt(topic, context), temperature);
        let (payload, response) = self.router.generate_structured::<IdeaList>(&request).await?;
        let ideas: Vec<String> = payload
            .ideas
            .into_iter()
            .map(|idea| idea.trim().to_string())
            .filter(|idea| !idea.is_empty())
            .collect();
        Ok((ideas, response.tokens_used))
    }

    async fn evaluate_ideas(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
        temperature: f64,
        re_evaluation: bool,
    ) -> Result<(Vec<Evaluation>, u64)> {
        if ideas.is_empty() {
            return Ok((Vec::new(), 0));
        }
        if self.mock_mode().await {
            let evaluations = ideas
                .iter()
                .enumerate()
                .map(|(i, _)| Evaluation {
                    score: MOCK_SCORES[i % MOCK_SCORES.len()],
                    comment: "[DEGRADED MODE] Mock evaluation".to_string(),
                })
                .collect();
            return Ok((evaluations, 0));
        }

        let request = StructuredRequest::new(
            prompts::evaluation_prompt(ideas, topic, context, re_evaluation),
            temperature,
        );

        match self.router.generate_structured::<EvaluationBatch>(&request).await {
            Ok((payload, response)) => {
                let items = align_batch(payload.evaluations, ideas.len(), "evaluate", |item| {
                    item.idea_index
                })?;
                let evaluations = items.into_iter().map(Evaluation::from).collect();
                Ok((evaluations, response.tokens_used))
            }
            Err(e)
                if matches!(
                    e,
                    WorkflowError::SchemaValidation(_) | WorkflowError::AllProvidersFailed(_)
                ) =>
            {
                tracing::warn!("Structured evaluation failed ({e}); recovering via parser chain");
                self.evaluate_via_parser(&request, ideas.len()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn advocate_ideas_batch(
        &self,
        items: &[AdvocacyInput],
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<AdvocacyItem>, u64)> {
        for item in items {
            item.validate()?;
        }
        if self.mock_mode().await {
            let advocacies = (0..items.len()).map(mock_advocacy).collect();
            return Ok((advocacies, 0));
        }

        let request =
            StructuredRequest::new(prompts::advocacy_batch_prompt(items, context), temperature);
        let (payload, response) = self.router.generate_structured::<AdvocacyBatch>(&request).await?;
        let advocacies = align_batch(payload.advocacies, items.len(), "advocate", |item| {
            item.idea_index
        })?
        .into_iter()
        .map(AdvocacyItem::finalize)
        .collect();
        Ok((advocacies, response.tokens_used))
    }

    async fn advocate_idea(
        &self,
        item: &AdvocacyInput,
        context: &str,
        temperature: f64,
    ) -> Result<(AdvocacyItem, u64)> {
        item.validate()?;
        if self.mock_mode().await {
            return Ok((mock_advocacy(0), 0));
        }

        let request =
            StructuredRequest::new(prompts::advocacy_single_prompt(item, context), temperature);
        let (payload, response) = self.router.generate_structured::<AdvocacyBatch>(&request).await?;
        let advocacy = payload
            .advocacies
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::batch_length_mismatch("advocate", 1, 0))?
            .finalize();
        Ok((advocacy, response.tokens_used))
    }

    async fn criticize_ideas_batch(
        &self,
        items: &[SkepticismInput],
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<SkepticismItem>, u64)> {
        for item in items {
            item.validate()?;
        }
        if self.mock_mode().await {
            let critiques = (0..items.len()).map(mock_skepticism).collect();
            return Ok((critiques, 0));
        }

        let request =
            StructuredRequest::new(prompts::skepticism_batch_prompt(items, context), temperature);
        let (payload, response) = self
            .router
            .generate_structured::<SkepticismBatch>(&request)
            .await?;
        let critiques = align_batch(payload.critiques, items.len(), "skeptic", |item| {
            item.idea_index
        })?
        .into_iter()
        .map(SkepticismItem::finalize)
        .collect();
        Ok((critiques, response.tokens_used))
    }

    async fn criticize_idea(
        &self,
        item: &SkepticismInput,
        context: &str,
        temperature: f64,
    ) -> Result<(SkepticismItem, u64)> {
        item.validate()?;
        if self.mock_mode().await {
            return Ok((mock_skepticism(0), 0));
        }

        let request =
            StructuredRequest::new(prompts::skepticism_single_prompt(item, context), temperature);
        let (payload, response) = self
            .router
            .generate_structured::<SkepticismBatch>(&request)
            .await?;
        let critique = payload
            .critiques
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::batch_length_mismatch("skeptic", 1, 0))?
            .finalize();
        Ok((critique, response.tokens_used))
    }

    async fn improve_ideas_batch(
        &self,
        items: &[ImprovementInput],
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(Vec<ImprovementItem>, u64)> {
        for item in items {
            item.validate()?;
        }
        if self.mock_mode().await {
            let improvements = items
                .iter()
                .enumerate()
                .map(|(i, item)| mock_improvement(i, &item.idea))
                .collect();
            return Ok((improvements, 0));
        }

        let request = StructuredRequest::new(
            prompts::improvement_batch_prompt(items, topic, context),
            temperature,
        );
        let (payload, response) = self
            .router
            .generate_structured::<ImprovementBatch>(&request)
            .await?;
        let improvements = align_batch(payload.improvements, items.len(), "improve", |item| {
            item.idea_index
        })?;
        Ok((improvements, response.tokens_used))
    }

    async fn improve_idea(
        &self,
        item: &ImprovementInput,
        topic: &str,
        context: &str,
        temperature: f64,
    ) -> Result<(ImprovementItem, u64)> {
        item.validate()?;
        if self.mock_mode().await {
            return Ok((mock_improvement(0, &item.idea), 0));
        }

        let request = StructuredRequest::new(
            prompts::improvement_single_prompt(item, topic, context),
            temperature,
        );
        let (payload, response) = self
            .router
            .generate_structured::<ImprovementBatch>(&request)
            .await?;
        let improvement = payload
            .improvements
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::batch_length_mismatch("improve", 1, 0))?;
        Ok((improvement, response.tokens_used))
    }

    async fn evaluate_multi_dimensional_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
    ) -> Result<(Vec<MultiDimEvaluation>, u64)> {
        self.multidim.evaluate_ideas_batch(ideas, topic, context).await
    }

    async fn analyze_logical_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
        analysis_type: InferenceType,
    ) -> Result<(Vec<InferenceResult>, u64)> {
        self.inference
            .analyze_batch(ideas, topic, context, analysis_type)
            .await
    }
}
