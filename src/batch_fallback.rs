//! Fallback from batch API calls to per-item processing.
//!
//! The wrapper guarantees the returned list has exactly `items.len()`
//! entries: real batch results, real per-item results, or degraded
//! placeholders. Callers never see partial batches.

use futures::future::BoxFuture;

use crate::batch_monitor::BatchMonitor;
use crate::errors::{Result, WorkflowError};
use crate::schemas::{AdvocacyItem, ImprovementItem, SkepticismItem};

/// Types that can stand in for a failed per-item call.
pub trait FallbackPlaceholder: Sized {
    /// Degraded placeholder carrying the item index and failure reason.
    fn placeholder(index: usize, batch_type: &str, error: &str) -> Self;

    /// Stamp the item's position so fallback results stay index-aligned.
    fn with_index(self, index: usize) -> Self;
}

impl FallbackPlaceholder for AdvocacyItem {
    fn placeholder(index: usize, batch_type: &str, error: &str) -> Self {
        Self {
            idea_index: index,
            strengths: Vec::new(),
            opportunities: Vec::new(),
            addressing_concerns: Vec::new(),
            formatted: format!("N/A ({batch_type} failed: {error})"),
        }
    }

    fn with_index(mut self, index: usize) -> Self {
        self.idea_index = index;
        self
    }
}

impl FallbackPlaceholder for SkepticismItem {
    fn placeholder(index: usize, batch_type: &str, error: &str) -> Self {
        Self {
            idea_index: index,
            critical_flaws: Vec::new(),
            risks_challenges: Vec::new(),
            questionable_assumptions: Vec::new(),
            missing_considerations: Vec::new(),
            formatted: format!("N/A ({batch_type} failed: {error})"),
        }
    }

    fn with_index(mut self, index: usize) -> Self {
        self.idea_index = index;
        self
    }
}

impl FallbackPlaceholder for ImprovementItem {
    fn placeholder(index: usize, batch_type: &str, error: &str) -> Self {
        Self {
            idea_index: index,
            improved_title: String::new(),
            improved_description: format!("N/A ({batch_type} failed: {error})"),
            key_improvements: Vec::new(),
            implementation_steps: None,
            differentiators: None,
        }
    }

    fn with_index(mut self, index: usize) -> Self {
        self.idea_index = index;
        self
    }
}

/// Outcome of a fallback-wrapped batch call.
pub struct BatchOutcome<R> {
    pub results: Vec<R>,
    pub fallback_used: bool,
    /// Per-item error messages from the fallback path, index-aligned.
    pub errors: Vec<Option<String>>,
}

/// Run a batch function; on failure or length mismatch, degrade to
/// per-item calls with placeholders for items that still fail.
pub async fn batch_with_fallback<'a, I, R, BF, FF>(
    monitor: &'a BatchMonitor,
    batch_type: &str,
    items: &'a [I],
    batch_fn: BF,
    per_item_fn: FF,
) -> BatchOutcome<R>
where
    I: Sync,
    R: FallbackPlaceholder,
    BF: FnOnce(&'a [I]) -> BoxFuture<'a, Result<(Vec<R>, u64)>>,
    FF: Fn(&'a I) -> BoxFuture<'a, Result<(R, u64)>>,
{
    let context = monitor.start_batch_call(batch_type, items.len());

    let batch_error = match batch_fn(items).await {
        Ok((results, tokens)) => {
            if results.len() == items.len() {
                monitor.end_batch_call(context, true, Some(tokens), None, false);
                tracing::info!(
                    "Batch {batch_type}: Successfully processed {} items",
                    items.len()
                );
                return BatchOutcome {
                    results,
                    fallback_used: false,
                    errors: vec![None; items.len()],
                };
            }
            WorkflowError::batch_length_mismatch(batch_type, items.len(), results.len())
        }
        Err(e) => e,
    };

    tracing::warn!(
        "[DEGRADED MODE] Batch {batch_type} failed: {batch_error}. \
         Falling back to individual processing."
    );
    monitor.end_batch_call(context, false, None, Some(batch_error.to_string()), true);

    let fallback_type = format!("{batch_type}_fallback");
    let fallback_context = monitor.start_batch_call(&fallback_type, items.len());

    let mut results: Vec<R> = Vec::with_capacity(items.len());
    let mut errors: Vec<Option<String>> = Vec::with_capacity(items.len());
    let mut total_tokens: u64 = 0;

    for (index, item) in items.iter().enumerate() {
        match per_item_fn(item).await {
            Ok((result, tokens)) => {
                total_tokens += tokens;
                results.push(result.with_index(index));
                errors.push(None);
            }
            Err(e) => {
                tracing::error!("Fallback {batch_type} failed for item {index}: {e}");
                results.push(R::placeholder(index, batch_type, &e.to_string()));
                errors.push(Some(e.to_string()));
            }
        }
    }

    monitor.end_batch_call(fallback_context, true, Some(total_tokens), None, false);
    tracing::info!(
        "[DEGRADED MODE] Fallback {batch_type}: Processed {} items individually",
        results.len()
    );

    BatchOutcome {
        results,
        fallback_used: true,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_successful_batch_skips_fallback() {
        let monitor = BatchMonitor::with_log_path(None);
        let items = vec!["a".to_string(), "b".to_string()];

        let outcome = batch_with_fallback(
            &monitor,
            "advocate",
            &items,
            |items| {
                let n = items.len();
                async move {
                    let results = (0..n)
                        .map(|i| AdvocacyItem {
                            idea_index: i,
                            ..AdvocacyItem::placeholder(i, "x", "y")
                        })
                        .collect();
                    Ok((results, 100u64))
                }
                .boxed()
            },
            |_item| {
                async { Err::<(AdvocacyItem, u64), _>(WorkflowError::validation("unused")) }.boxed()
            },
        )
        .await;

        assert!(!outcome.fallback_used);
        assert_eq!(outcome.results.len(), 2);
        let summary = monitor.get_session_summary();
        assert_eq!(summary.successful_calls, 1);
        assert_eq!(summary.fallback_calls, 0);
    }

    #[tokio::test]
    async fn test_batch_failure_degrades_per_item() {
        let monitor = BatchMonitor::with_log_path(None);
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let outcome = batch_with_fallback(
            &monitor,
            "advocate",
            &items,
            |_items| {
                async { Err(WorkflowError::provider_unavailable("batch exploded")) }.boxed()
            },
            |item| {
                let item = item.clone();
                async move {
                    if item == "b" {
                        Err(WorkflowError::schema_validation("bad item"))
                    } else {
                        Ok((AdvocacyItem::placeholder(0, "n/a", "n/a").with_index(0), 10u64))
                    }
                }
                .boxed()
            },
        )
        .await;

        assert!(outcome.fallback_used);
        assert_eq!(outcome.results.len(), 3);
        // Index alignment survives the mixed success/failure path
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.idea_index, i);
        }
        assert!(outcome.errors[1].is_some());
        assert!(outcome.results[1].formatted.starts_with("N/A (advocate failed"));

        let summary = monitor.get_session_summary();
        assert_eq!(summary.batch_type_breakdown["advocate"].failed_calls, 1);
        assert_eq!(
            summary.batch_type_breakdown["advocate_fallback"].successful_calls,
            1
        );
    }

    #[tokio::test]
    async fn test_length_mismatch_triggers_fallback() {
        let monitor = BatchMonitor::with_log_path(None);
        let items = vec!["a".to_string(), "b".to_string()];

        let outcome = batch_with_fallback(
            &monitor,
            "improve",
            &items,
            |_items| {
                async {
                    // One result for two inputs
                    Ok((vec![ImprovementItem::placeholder(0, "x", "y")], 50u64))
                }
                .boxed()
            },
            |_item| {
                async { Ok((ImprovementItem::placeholder(0, "n/a", "n/a"), 10u64)) }.boxed()
            },
        )
        .await;

        assert!(outcome.fallback_used);
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_all_items_failing_yields_all_placeholders() {
        let monitor = BatchMonitor::with_log_path(None);
        let items = vec!["a".to_string(), "b".to_string()];

        let outcome = batch_with_fallback(
            &monitor,
            "skeptic",
            &items,
            |_items| async { Err(WorkflowError::provider_unavailable("down")) }.boxed(),
            |_item| {
                async { Err::<(SkepticismItem, u64), _>(WorkflowError::provider_unavailable("down")) }
                    .boxed()
            },
        )
        .await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.errors.iter().all(Option::is_some));
        for result in &outcome.results {
            assert!(result.formatted.contains("skeptic failed"));
        }
    }
}
