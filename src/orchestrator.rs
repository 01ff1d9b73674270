//! The six-stage workflow orchestrator.
//!
//! Composes generate → evaluate → select → advocate‖skeptic → improve →
//! re-evaluate into a single cooperative pipeline: batch-capable stages use
//! one LLM call regardless of item count, independent stages fan out
//! concurrently under a per-stage timeout, and the whole run is bounded by
//! an overall timeout and a cancellation token. On the happy path a run
//! costs exactly six LLM calls.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::agents::{AdvocacyInput, AgentSuite, ImprovementInput, SkepticismInput};
use crate::batch_fallback::{batch_with_fallback, BatchOutcome, FallbackPlaceholder};
use crate::batch_monitor::{get_batch_monitor, BatchMonitor};
use crate::errors::{Result, WorkflowError};
use crate::novelty::NoveltyFilter;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::temperature::{TemperatureManager, WorkflowStage};
use crate::types::{EnrichedIdea, WorkflowOptions};

/// Invoked at stage boundaries with a message and progress in [0, 1].
pub type ProgressCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Fallback text for stages that are disabled or degraded.
const NOT_AVAILABLE: &str = "N/A";

pub struct WorkflowOrchestrator {
    agents: Arc<dyn AgentSuite>,
    monitor: Arc<BatchMonitor>,
    options: WorkflowOptions,
    semaphore: Arc<Semaphore>,
    retry_policy: RetryPolicy,
}

impl WorkflowOrchestrator {
    pub fn new(agents: Arc<dyn AgentSuite>, options: WorkflowOptions) -> Self {
        Self::with_monitor(agents, options, get_batch_monitor())
    }

    pub fn with_monitor(
        agents: Arc<dyn AgentSuite>,
        options: WorkflowOptions,
        monitor: Arc<BatchMonitor>,
    ) -> Self {
        let permits = options.max_concurrent_calls.max(1);
        Self {
            agents,
            monitor,
            options,
            semaphore: Arc::new(Semaphore::new(permits)),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Run the full pipeline under the overall timeout.
    ///
    /// Overrun cancels in-flight calls and discards their results.
    pub async fn run(
        &self,
        topic: &str,
        context: &str,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<EnrichedIdea>> {
        let overall = self.options.timeout;
        match tokio::time::timeout(overall, self.execute(topic, context, &cancel, &progress)).await
        {
            Ok(result) => result,
            Err(_) => Err(WorkflowError::operation_timeout(
                overall.as_millis() as u64,
                "overall workflow",
            )),
        }
    }

    fn report(&self, progress: &Option<ProgressCallback>, message: &str, fraction: f64) {
        if let Some(callback) = progress {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(message, fraction)
            }));
            if outcome.is_err() {
                tracing::warn!("Progress callback panicked; continuing workflow");
            }
        }
    }

    /// Race a stage future against cancellation.
    async fn with_cancel<T>(
        &self,
        cancel: &CancellationToken,
        context: &str,
        future: impl Future<Output = T>,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(WorkflowError::operation_cancelled(context));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkflowError::operation_cancelled(context)),
            value = future => Ok(value),
        }
    }

    /// One LLM call: bounded by the semaphore, wrapped in the per-call
    /// timeout, retried on transient failures. A batch call acquires a
    /// single permit regardless of item count.
    async fn agent_call<T, F, Fut>(&self, name: &'static str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| WorkflowError::operation_cancelled(name))?;
        let per_call = self.options.per_call_timeout;
        call_with_retry(&self.retry_policy, name, || {
            let future = operation();
            async move {
                match tokio::time::timeout(per_call, future).await {
                    Ok(result) => result,
                    Err(_) => Err(WorkflowError::operation_timeout(
                        per_call.as_millis() as u64,
                        name,
                    )),
                }
            }
        })
        .await
    }

    /// Wrap a call in a monitor span.
    async fn monitored<T>(
        &self,
        batch_type: &str,
        items_count: usize,
        future: impl Future<Output = Result<(T, u64)>>,
    ) -> Result<T> {
        let context = self.monitor.start_batch_call(batch_type, items_count);
        match future.await {
            Ok((value, tokens)) => {
                self.monitor
                    .end_batch_call(context, true, Some(tokens), None, false);
                Ok(value)
            }
            Err(e) => {
                self.monitor
                    .end_batch_call(context, false, None, Some(e.to_string()), false);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        topic: &str,
        context: &str,
        cancel: &CancellationToken,
        progress: &Option<ProgressCallback>,
    ) -> Result<Vec<EnrichedIdea>> {
        let temperatures = self.temperature_manager();
        let num_candidates = self.options.effective_top_candidates();

        // Stage 1: generate
        self.report(progress, "Generating ideas", 0.05);
        let ideas = self
            .with_cancel(cancel, "generate", self.stage_generate(topic, context, &temperatures))
            .await??;
        if ideas.is_empty() {
            tracing::warn!("Idea generator returned no ideas");
            return Ok(Vec::new());
        }

        // Stage 2: evaluate
        self.report(progress, "Evaluating ideas", 0.25);
        let temp_eval = temperatures.for_stage(WorkflowStage::Evaluation);
        let evaluations = self
            .with_cancel(
                cancel,
                "evaluate",
                self.monitored(
                    "evaluate",
                    ideas.len(),
                    self.agent_call("evaluate_ideas", || {
                        self.agents
                            .evaluate_ideas(&ideas, topic, context, temp_eval, false)
                    }),
                ),
            )
            .await??;

        let mut pool: Vec<EnrichedIdea> = ideas
            .iter()
            .zip(evaluations)
            .map(|(idea, evaluation)| {
                let mut record = EnrichedIdea::new(idea.clone());
                record.score = evaluation.score;
                record.critique = evaluation.comment;
                record
            })
            .collect();

        // Stage 3: select top-N by initial score (stable sort keeps input
        // order among ties)
        self.report(progress, "Selecting top candidates", 0.35);
        pool.sort_by_key(|record| std::cmp::Reverse(record.score));
        let mut candidates: Vec<EnrichedIdea> = pool.into_iter().take(num_candidates).collect();

        // Stage 4: advocate ‖ skeptic
        if self.options.enhanced_reasoning {
            self.report(progress, "Running advocacy and skepticism", 0.5);
            self.stage_advocate_skeptic(&mut candidates, context, &temperatures, cancel)
                .await?;
        }

        // Stage 5: improve
        self.report(progress, "Improving ideas", 0.7);
        self.stage_improve(&mut candidates, topic, context, &temperatures, cancel)
            .await?;

        // Stage 6: re-evaluate ‖ multi-dimensional re-evaluation
        self.report(progress, "Re-evaluating improved ideas", 0.85);
        self.stage_reevaluate(&mut candidates, topic, context, &temperatures, cancel)
            .await?;

        // Optional logical inference
        if let Some(analysis_type) = self.options.logical_inference {
            self.report(progress, "Running logical inference", 0.95);
            let texts: Vec<String> = candidates
                .iter()
                .map(|record| record.improved_idea.clone().unwrap_or_else(|| record.text.clone()))
                .collect();
            let inference = self
                .with_cancel(
                    cancel,
                    "inference",
                    self.monitored(
                        "inference",
                        texts.len(),
                        self.agent_call("logical_inference", || {
                            self.agents
                                .analyze_logical_batch(&texts, topic, context, analysis_type)
                        }),
                    ),
                )
                .await?;
            match inference {
                Ok(results) => {
                    for (record, result) in candidates.iter_mut().zip(results) {
                        record.logical_inference = Some(result);
                    }
                }
                Err(e) => {
                    tracing::warn!("[DEGRADED MODE] Logical inference failed: {e}");
                    for record in candidates.iter_mut() {
                        record
                            .partial_failures
                            .push(format!("logical_inference: {e}"));
                    }
                }
            }
        }

        for record in candidates.iter_mut() {
            record.normalize_fields();
        }

        self.report(progress, "Workflow complete", 1.0);
        Ok(candidates)
    }

    fn temperature_manager(&self) -> TemperatureManager {
        if let Some(temperature) = self.options.temperature {
            TemperatureManager::from_base(temperature)
        } else if let Some(preset) = self.options.temperature_preset {
            TemperatureManager::from_preset(preset)
        } else {
            TemperatureManager::from_base(0.7)
        }
    }

    async fn stage_generate(
        &self,
        topic: &str,
        context: &str,
        temperatures: &TemperatureManager,
    ) -> Result<Vec<String>> {
        let temp_gen = temperatures.for_stage(WorkflowStage::IdeaGeneration);
        let ideas = self
            .monitored(
                "generate",
                1,
                self.agent_call("generate_ideas", || {
                    self.agents.generate_ideas(topic, context, temp_gen)
                }),
            )
            .await?;

        if self.options.novelty_filter_enabled {
            let filter = NoveltyFilter::new(self.options.similarity_threshold);
            let before = ideas.len();
            let filtered = filter.filter(ideas);
            if filtered.len() < before {
                tracing::info!(
                    "Novelty filter removed {} near-duplicate ideas",
                    before - filtered.len()
                );
            }
            Ok(filtered)
        } else {
            Ok(ideas)
        }
    }

    async fn stage_advocate_skeptic(
        &self,
        candidates: &mut [EnrichedIdea],
        context: &str,
        temperatures: &TemperatureManager,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let temp_adv = temperatures.for_stage(WorkflowStage::Advocacy);
        let temp_skep = temperatures.for_stage(WorkflowStage::Skepticism);

        let advocacy_inputs: Vec<AdvocacyInput> = candidates
            .iter()
            .map(|record| AdvocacyInput {
                idea: record.text.clone(),
                evaluation: record.critique.clone(),
            })
            .collect();
        let skepticism_inputs: Vec<SkepticismInput> = candidates
            .iter()
            .map(|record| SkepticismInput {
                idea: record.text.clone(),
                evaluation: record.critique.clone(),
            })
            .collect();

        let advocate_future = batch_with_fallback(
            &self.monitor,
            "advocate",
            &advocacy_inputs,
            |items| {
                async move {
                    self.agent_call("advocate_batch", || {
                        self.agents.advocate_ideas_batch(items, context, temp_adv)
                    })
                    .await
                }
                .boxed()
            },
            |item| {
                async move {
                    self.agent_call("advocate_item", || {
                        self.agents.advocate_idea(item, context, temp_adv)
                    })
                    .await
                }
                .boxed()
            },
        );

        let skeptic_future = batch_with_fallback(
            &self.monitor,
            "skeptic",
            &skepticism_inputs,
            |items| {
                async move {
                    self.agent_call("skeptic_batch", || {
                        self.agents.criticize_ideas_batch(items, context, temp_skep)
                    })
                    .await
                }
                .boxed()
            },
            |item| {
                async move {
                    self.agent_call("skeptic_item", || {
                        self.agents.criticize_idea(item, context, temp_skep)
                    })
                    .await
                }
                .boxed()
            },
        );

        // Both branches join before the next stage starts
        let stage = async { tokio::join!(advocate_future, skeptic_future) };
        let joined = self
            .with_cancel(
                cancel,
                "advocate/skeptic",
                tokio::time::timeout(self.options.per_stage_timeout, stage),
            )
            .await?;

        match joined {
            Ok((advocate_outcome, skeptic_outcome)) => {
                attach_outcome(candidates, advocate_outcome, "advocacy", |record, item| {
                    record.advocacy = Some(item);
                });
                attach_outcome(candidates, skeptic_outcome, "skepticism", |record, item| {
                    record.skepticism = Some(item);
                });
            }
            Err(_) => {
                tracing::warn!("[DEGRADED MODE] Advocate/skeptic stage timed out");
                for (index, record) in candidates.iter_mut().enumerate() {
                    record.advocacy = Some(FallbackPlaceholder::placeholder(
                        index,
                        "advocate",
                        "stage timed out",
                    ));
                    record.skepticism = Some(FallbackPlaceholder::placeholder(
                        index,
                        "skeptic",
                        "stage timed out",
                    ));
                    record
                        .partial_failures
                        .push("advocate/skeptic: stage timed out".to_string());
                }
            }
        }
        Ok(())
    }

    async fn stage_improve(
        &self,
        candidates: &mut [EnrichedIdea],
        topic: &str,
        context: &str,
        temperatures: &TemperatureManager,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let temp_improve = temperatures.for_stage(WorkflowStage::Improvement);

        let inputs: Vec<ImprovementInput> = candidates
            .iter()
            .map(|record| ImprovementInput {
                idea: record.text.clone(),
                critique: non_empty_or(&record.critique, NOT_AVAILABLE),
                advocacy: record
                    .advocacy
                    .as_ref()
                    .map(|a| non_empty_or(&a.formatted, NOT_AVAILABLE))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                skepticism: record
                    .skepticism
                    .as_ref()
                    .map(|s| non_empty_or(&s.formatted, NOT_AVAILABLE))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            })
            .collect();

        let improve_future = batch_with_fallback(
            &self.monitor,
            "improve",
            &inputs,
            |items| {
                async move {
                    self.agent_call("improve_batch", || {
                        self.agents
                            .improve_ideas_batch(items, topic, context, temp_improve)
                    })
                    .await
                }
                .boxed()
            },
            |item| {
                async move {
                    self.agent_call("improve_item", || {
                        self.agents.improve_idea(item, topic, context, temp_improve)
                    })
                    .await
                }
                .boxed()
            },
        );

        let outcome = self
            .with_cancel(cancel, "improve", improve_future)
            .await?;

        for (index, (record, item)) in candidates.iter_mut().zip(outcome.results).enumerate() {
            if let Some(error) = &outcome.errors[index] {
                record
                    .partial_failures
                    .push(format!("improve: {error}"));
            }
            record.improved_idea = Some(item.combined_text());
        }
        Ok(())
    }

    async fn stage_reevaluate(
        &self,
        candidates: &mut [EnrichedIdea],
        topic: &str,
        context: &str,
        temperatures: &TemperatureManager,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let temp_reeval = temperatures.for_stage(WorkflowStage::ReEvaluation);
        let improved_texts: Vec<String> = candidates
            .iter()
            .map(|record| {
                record
                    .improved_idea
                    .clone()
                    .unwrap_or_else(|| record.text.clone())
            })
            .collect();

        let reeval_future = self.monitored(
            "reevaluate",
            improved_texts.len(),
            self.agent_call("reevaluate_ideas", || {
                self.agents
                    .evaluate_ideas(&improved_texts, topic, context, temp_reeval, true)
            }),
        );

        let multidim_future = async {
            if self.options.multi_dimensional_eval {
                Some(
                    self.monitored(
                        "multidim",
                        improved_texts.len(),
                        self.agent_call("multidim_batch", || {
                            self.agents
                                .evaluate_multi_dimensional_batch(&improved_texts, topic, context)
                        }),
                    )
                    .await,
                )
            } else {
                None
            }
        };

        // Standard and multi-dim re-evaluation fan out together
        let stage = async { tokio::join!(reeval_future, multidim_future) };
        let joined = self
            .with_cancel(
                cancel,
                "reevaluate",
                tokio::time::timeout(self.options.per_stage_timeout, stage),
            )
            .await?;

        match joined {
            Ok((reeval_result, multidim_result)) => {
                match reeval_result {
                    Ok(evaluations) if evaluations.len() == candidates.len() => {
                        for (record, evaluation) in candidates.iter_mut().zip(evaluations) {
                            record.set_improved_score(evaluation.score);
                            record.improved_critique = Some(evaluation.comment);
                        }
                    }
                    Ok(evaluations) => {
                        tracing::warn!(
                            "[DEGRADED MODE] Re-evaluation returned {} results for {} candidates",
                            evaluations.len(),
                            candidates.len()
                        );
                        substitute_estimated_scores(candidates, "re-evaluation length mismatch");
                    }
                    Err(e) => {
                        tracing::warn!("[DEGRADED MODE] Re-evaluation failed: {e}");
                        substitute_estimated_scores(candidates, &format!("re-evaluation: {e}"));
                    }
                }

                if let Some(multidim_result) = multidim_result {
                    match multidim_result {
                        Ok(evaluations) if evaluations.len() == candidates.len() => {
                            for (record, evaluation) in candidates.iter_mut().zip(evaluations) {
                                record.improved_multi_dimensional_evaluation = Some(evaluation);
                            }
                        }
                        Ok(_) | Err(_) => {
                            tracing::warn!("[DEGRADED MODE] Multi-dimensional re-evaluation failed");
                            for record in candidates.iter_mut() {
                                record
                                    .partial_failures
                                    .push("multi_dimensional_evaluation failed".to_string());
                            }
                        }
                    }
                }
            }
            Err(_) => {
                // Stage timeout: estimate from the initial scores rather
                // than failing the workflow
                tracing::warn!("[DEGRADED MODE] Re-evaluation stage timed out");
                substitute_estimated_scores(candidates, "re-evaluation timed out");
            }
        }
        Ok(())
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn substitute_estimated_scores(candidates: &mut [EnrichedIdea], reason: &str) {
    for record in candidates.iter_mut() {
        record.set_improved_score(record.score);
        record.improved_critique = Some(format!("N/A ({reason})"));
        record.partial_failures.push(reason.to_string());
    }
}

fn attach_outcome<T>(
    candidates: &mut [EnrichedIdea],
    outcome: BatchOutcome<T>,
    label: &str,
    mut attach: impl FnMut(&mut EnrichedIdea, T),
) {
    for (index, (record, item)) in candidates.iter_mut().zip(outcome.results).enumerate() {
        if let Some(error) = &outcome.errors[index] {
            record.partial_failures.push(format!("{label}: {error}"));
        }
        attach(record, item);
    }
}

/// Run a workflow with default monitoring, no cancellation, and no
/// progress callback.
pub async fn run_workflow(
    topic: &str,
    context: &str,
    options: WorkflowOptions,
    agents: Arc<dyn AgentSuite>,
) -> Result<Vec<EnrichedIdea>> {
    WorkflowOrchestrator::new(agents, options)
        .run(topic, context, CancellationToken::new(), None)
        .await
}

/// Streaming variant: progress callback plus external cancellation.
pub async fn run_workflow_with_progress(
    topic: &str,
    context: &str,
    options: WorkflowOptions,
    agents: Arc<dyn AgentSuite>,
    cancel: CancellationToken,
    progress: ProgressCallback,
) -> Result<Vec<EnrichedIdea>> {
    WorkflowOrchestrator::new(agents, options)
        .run(topic, context, cancel, Some(progress))
        .await
}
