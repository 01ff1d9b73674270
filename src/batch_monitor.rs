//! Append-only record of every batch API call.
//!
//! Tracks per-call tokens, latency, and success/fallback status; aggregates
//! a session summary and an estimated cost-effectiveness analysis. Records
//! are optionally persisted as line-delimited JSON for the CLI metrics view.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Estimated overhead multiplier of individual calls versus one batch call.
const INDIVIDUAL_CALL_OVERHEAD: f64 = 1.3;

/// Estimated per-item call count the batch pipeline replaces.
const LEGACY_CALLS_PER_ITEM: u64 = 7;

/// One record per batch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub timestamp: String,
    pub batch_type: String,
    pub items_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Handle returned by `start_batch_call`, consumed by `end_batch_call`.
#[derive(Debug)]
pub struct BatchCallContext {
    batch_type: String,
    items_count: usize,
    started: Instant,
}

/// Per-batch-type aggregate in the session summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchTypeStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub items: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub fallback_calls: u64,
    pub total_items: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub batch_type_breakdown: HashMap<String, BatchTypeStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostAnalysis {
    pub batch_cost_usd: f64,
    pub estimated_individual_cost_usd: f64,
    pub savings_usd: f64,
    pub savings_percentage: f64,
    pub estimated_original_calls: u64,
    pub batch_calls: u64,
    pub call_reduction_percentage: f64,
}

/// Records batch call metrics for the session, optionally persisting each
/// record to a JSONL log.
pub struct BatchMonitor {
    session: Mutex<Vec<BatchMetrics>>,
    log_path: Option<PathBuf>,
}

impl BatchMonitor {
    /// Monitor with the default persistence path under the user's data dir.
    pub fn new() -> Self {
        let log_path = dirs::data_dir().map(|dir| dir.join("madspark").join("batch_metrics.jsonl"));
        Self::with_log_path(log_path)
    }

    /// Monitor with an explicit persistence path; `None` keeps records in
    /// memory only.
    pub fn with_log_path(log_path: Option<PathBuf>) -> Self {
        Self {
            session: Mutex::new(Vec::new()),
            log_path,
        }
    }

    pub fn start_batch_call(&self, batch_type: &str, items_count: usize) -> BatchCallContext {
        tracing::debug!(batch_type, items_count, "Starting batch call");
        BatchCallContext {
            batch_type: batch_type.to_string(),
            items_count,
            started: Instant::now(),
        }
    }

    pub fn end_batch_call(
        &self,
        context: BatchCallContext,
        success: bool,
        tokens_used: Option<u64>,
        error_message: Option<String>,
        fallback_used: bool,
    ) -> BatchMetrics {
        let metrics = BatchMetrics {
            timestamp: Utc::now().to_rfc3339(),
            batch_type: context.batch_type,
            items_count: context.items_count,
            tokens_used,
            estimated_cost_usd: tokens_used.map(|t| t as f64 * 0.000_000_3),
            duration_seconds: context.started.elapsed().as_secs_f64(),
            success,
            fallback_used,
            error_message,
        };

        self.persist(&metrics);
        self.session
            .lock()
            .expect("monitor lock poisoned")
            .push(metrics.clone());
        metrics
    }

    fn persist(&self, metrics: &BatchMetrics) {
        let Some(path) = &self.log_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let line = match serde_json::to_string(metrics) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize batch metrics: {e}");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = result {
            tracing::warn!("Failed to persist batch metrics: {e}");
        }
    }

    pub fn get_session_summary(&self) -> SessionSummary {
        let session = self.session.lock().expect("monitor lock poisoned");
        let mut summary = SessionSummary::default();

        for metrics in session.iter() {
            summary.total_calls += 1;
            if metrics.success {
                summary.successful_calls += 1;
                summary.total_items += metrics.items_count as u64;
                summary.total_tokens += metrics.tokens_used.unwrap_or(0);
                summary.total_cost_usd += metrics.estimated_cost_usd.unwrap_or(0.0);
            } else {
                summary.failed_calls += 1;
            }
            if metrics.fallback_used {
                summary.fallback_calls += 1;
            }

            let entry = summary
                .batch_type_breakdown
                .entry(metrics.batch_type.clone())
                .or_default();
            entry.total_calls += 1;
            if metrics.success {
                entry.successful_calls += 1;
                entry.items += metrics.items_count as u64;
                entry.tokens += metrics.tokens_used.unwrap_or(0);
                entry.cost_usd += metrics.estimated_cost_usd.unwrap_or(0.0);
            } else {
                entry.failed_calls += 1;
            }
        }

        summary
    }

    /// Estimate savings of batching versus per-item calls.
    pub fn analyze_cost_effectiveness(&self) -> CostAnalysis {
        let session = self.session.lock().expect("monitor lock poisoned");
        let successful: Vec<&BatchMetrics> = session
            .iter()
            .filter(|m| m.success && !m.fallback_used)
            .collect();

        let total_items: u64 = successful.iter().map(|m| m.items_count as u64).sum();
        let batch_cost: f64 = successful
            .iter()
            .map(|m| m.estimated_cost_usd.unwrap_or(0.0))
            .sum();
        let estimated_individual = batch_cost * INDIVIDUAL_CALL_OVERHEAD;
        let savings = estimated_individual - batch_cost;
        let savings_pct = if estimated_individual > 0.0 {
            savings / estimated_individual * 100.0
        } else {
            0.0
        };

        let original_calls = total_items * LEGACY_CALLS_PER_ITEM;
        let batch_calls = successful.len() as u64;
        let call_reduction = if original_calls > 0 {
            (original_calls.saturating_sub(batch_calls)) as f64 / original_calls as f64 * 100.0
        } else {
            0.0
        };

        CostAnalysis {
            batch_cost_usd: batch_cost,
            estimated_individual_cost_usd: estimated_individual,
            savings_usd: savings,
            savings_percentage: savings_pct,
            estimated_original_calls: original_calls,
            batch_calls,
            call_reduction_percentage: call_reduction,
        }
    }

    /// All session records, oldest first.
    pub fn session_records(&self) -> Vec<BatchMetrics> {
        self.session.lock().expect("monitor lock poisoned").clone()
    }
}

impl Default for BatchMonitor {
    fn default() -> Self {
        Self::new()
    }
}

static MONITOR: Mutex<Option<Arc<BatchMonitor>>> = Mutex::new(None);

/// Get the process-wide batch monitor, lazily initialized.
pub fn get_batch_monitor() -> Arc<BatchMonitor> {
    let mut guard = MONITOR.lock().expect("monitor lock poisoned");
    match guard.as_ref() {
        Some(monitor) => Arc::clone(monitor),
        None => {
            let monitor = Arc::new(BatchMonitor::new());
            *guard = Some(Arc::clone(&monitor));
            monitor
        }
    }
}

/// Reset the monitor singleton (for testing).
pub fn reset_batch_monitor() {
    let mut guard = MONITOR.lock().expect("monitor lock poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_successful_call_recorded() {
        let monitor = BatchMonitor::with_log_path(None);
        let ctx = monitor.start_batch_call("advocate", 3);
        monitor.end_batch_call(ctx, true, Some(450), None, false);

        let summary = monitor.get_session_summary();
        assert_eq!(summary.total_calls, 1);
        assert_eq!(summary.successful_calls, 1);
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.total_tokens, 450);
    }

    #[test]
    fn test_fallback_call_recorded() {
        let monitor = BatchMonitor::with_log_path(None);
        let ctx = monitor.start_batch_call("advocate", 3);
        let metrics =
            monitor.end_batch_call(ctx, false, None, Some("batch exploded".to_string()), true);
        assert!(metrics.fallback_used);
        assert!(!metrics.success);

        let summary = monitor.get_session_summary();
        assert_eq!(summary.failed_calls, 1);
        assert_eq!(summary.fallback_calls, 1);
    }

    #[test]
    fn test_breakdown_by_type() {
        let monitor = BatchMonitor::with_log_path(None);
        let ctx = monitor.start_batch_call("advocate", 3);
        monitor.end_batch_call(ctx, false, None, Some("boom".to_string()), true);
        let ctx = monitor.start_batch_call("advocate_fallback", 3);
        monitor.end_batch_call(ctx, true, Some(100), None, false);

        let summary = monitor.get_session_summary();
        let breakdown = &summary.batch_type_breakdown;
        assert_eq!(breakdown["advocate"].failed_calls, 1);
        assert_eq!(breakdown["advocate_fallback"].successful_calls, 1);
    }

    #[test]
    fn test_jsonl_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch_metrics.jsonl");
        let monitor = BatchMonitor::with_log_path(Some(path.clone()));

        for _ in 0..2 {
            let ctx = monitor.start_batch_call("evaluate", 5);
            monitor.end_batch_call(ctx, true, Some(200), None, false);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let record: BatchMetrics = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.batch_type, "evaluate");
        assert_eq!(record.items_count, 5);
    }

    #[test]
    fn test_cost_analysis_excludes_fallbacks() {
        let monitor = BatchMonitor::with_log_path(None);
        let ctx = monitor.start_batch_call("improve", 4);
        monitor.end_batch_call(ctx, true, Some(1000), None, false);
        let ctx = monitor.start_batch_call("improve", 4);
        monitor.end_batch_call(ctx, true, Some(1000), None, true);

        let analysis = monitor.analyze_cost_effectiveness();
        assert_eq!(analysis.batch_calls, 1);
        assert_eq!(analysis.estimated_original_calls, 4 * 7);
        assert!(analysis.savings_percentage > 0.0);
    }
}
