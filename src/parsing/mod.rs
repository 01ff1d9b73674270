//! JSON parsing with a progressive fallback strategy chain.
//!
//! LLM output *should* be JSON but often isn't. The parser tries strategies
//! from fastest to slowest until one succeeds, recording which strategy won
//! so the telemetry can show where responses degrade.

pub mod patterns;
pub mod strategies;

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

type StrategyFn = fn(&str, Option<usize>) -> Option<Value>;

struct Strategy {
    name: &'static str,
    run: StrategyFn,
}

/// Per-strategy success/failure counts.
#[derive(Debug, Clone, Default)]
pub struct StrategyStats {
    pub successes: u64,
    pub failures: u64,
}

/// Records which strategy succeeded per call. The parser's only state.
#[derive(Debug, Default)]
pub struct ParsingTelemetry {
    stats: Mutex<HashMap<&'static str, StrategyStats>>,
}

impl ParsingTelemetry {
    fn record_success(&self, name: &'static str) {
        let mut stats = self.stats.lock().expect("telemetry lock poisoned");
        stats.entry(name).or_default().successes += 1;
    }

    fn record_failure(&self, name: &'static str) {
        let mut stats = self.stats.lock().expect("telemetry lock poisoned");
        stats.entry(name).or_default().failures += 1;
    }

    pub fn stats(&self) -> HashMap<&'static str, StrategyStats> {
        self.stats.lock().expect("telemetry lock poisoned").clone()
    }
}

/// Orchestrates parsing with progressive fallback.
///
/// Strategy order: DirectJson, ArrayExtraction, LineByLine,
/// RegexObjectExtraction, ScoreComment.
pub struct JsonParser {
    strategies: Vec<Strategy>,
    pub telemetry: ParsingTelemetry,
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonParser {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Strategy {
                    name: "DirectJson",
                    run: strategies::direct_json,
                },
                Strategy {
                    name: "ArrayExtraction",
                    run: strategies::array_extraction,
                },
                Strategy {
                    name: "LineByLine",
                    run: strategies::line_by_line,
                },
                Strategy {
                    name: "RegexObjectExtraction",
                    run: strategies::regex_object_extraction,
                },
                Strategy {
                    name: "ScoreComment",
                    run: strategies::score_comment_extraction,
                },
            ],
            telemetry: ParsingTelemetry::default(),
        }
    }

    /// Parse text, trying each strategy until one returns a value.
    ///
    /// Returns a JSON array for multi-record results, an object for single
    /// records, or `None` when nothing parses (placeholders are emitted by
    /// the last strategy when `expected_count` is provided).
    pub fn parse(&self, text: &str, expected_count: Option<usize>) -> Option<Value> {
        if text.trim().is_empty() {
            tracing::debug!("Empty input, nothing to parse");
            return None;
        }

        for strategy in &self.strategies {
            match (strategy.run)(text, expected_count) {
                Some(result) => {
                    self.telemetry.record_success(strategy.name);
                    tracing::debug!(strategy = strategy.name, "Parsing succeeded");
                    return Some(result);
                }
                None => self.telemetry.record_failure(strategy.name),
            }
        }

        tracing::warn!("All parsing strategies failed");
        None
    }
}
