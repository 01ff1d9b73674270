//! Logical-inference analysis of ideas.
//!
//! Produces causal, constraint, contradiction, or implication analyses (or
//! the full combination) per idea. Batch responses are one free-text body
//! split on `=== ANALYSIS_FOR_IDEA_N ===` delimiters; unparseable sections
//! degrade to placeholders, and API failures never propagate.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::agents::prompts::LANGUAGE_CONSISTENCY_INSTRUCTION;
use crate::providers::StructuredRequest;
use crate::router::LlmRouter;

/// Temperature for analysis calls.
const ANALYSIS_TEMPERATURE: f64 = 0.3;

const UNPARSEABLE_CONCLUSION: &str = "Unable to parse analysis for this idea";

/// The five supported analysis types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceType {
    #[default]
    Full,
    Causal,
    Constraints,
    Contradiction,
    Implications,
}

impl InferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Causal => "causal",
            Self::Constraints => "constraints",
            Self::Contradiction => "contradiction",
            Self::Implications => "implications",
        }
    }
}

impl FromStr for InferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "causal" => Ok(Self::Causal),
            "constraints" => Ok(Self::Constraints),
            "contradiction" => Ok(Self::Contradiction),
            "implications" => Ok(Self::Implications),
            other => Err(format!("unknown analysis type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionPair {
    pub statement1: String,
    pub statement2: String,
    pub severity: String,
}

/// Type-specific analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisDetails {
    Causal {
        #[serde(skip_serializing_if = "Option::is_none")]
        causal_chain: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        feedback_loops: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        root_cause: Option<String>,
    },
    Constraints {
        #[serde(skip_serializing_if = "Option::is_none")]
        constraint_satisfaction: Option<HashMap<String, f64>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        overall_satisfaction: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        trade_offs: Option<Vec<String>>,
    },
    Contradiction {
        #[serde(skip_serializing_if = "Option::is_none")]
        contradictions: Option<Vec<ContradictionPair>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<String>,
    },
    Implications {
        #[serde(skip_serializing_if = "Option::is_none")]
        implications: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        second_order_effects: Option<Vec<String>>,
    },
}

/// Result of one logical-inference analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub analysis_type: InferenceType,
    pub inference_chain: Vec<String>,
    pub conclusion: String,
    /// Confidence in [0, 1], rounded to two decimal places.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<AnalysisDetails>,
}

impl InferenceResult {
    /// Placeholder for a section that was missing or unparseable.
    pub fn unparseable(analysis_type: InferenceType) -> Self {
        Self {
            analysis_type,
            inference_chain: Vec::new(),
            conclusion: UNPARSEABLE_CONCLUSION.to_string(),
            confidence: 0.0,
            improvements: None,
            error: None,
            details: None,
        }
    }

    /// Placeholder carrying an API error.
    pub fn from_error(analysis_type: InferenceType, error: &str) -> Self {
        Self {
            analysis_type,
            inference_chain: Vec::new(),
            conclusion: error.to_string(),
            confidence: 0.0,
            improvements: None,
            error: Some(error.to_string()),
            details: None,
        }
    }
}

/// Display verbosity for rendered analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Brief,
    Standard,
    Detailed,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn delimiter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"===\s*ANALYSIS_FOR_IDEA_(\d+)\s*===").expect("invalid delimiter regex")
    })
}

pub struct LogicalInferenceEngine {
    router: Arc<LlmRouter>,
}

impl LogicalInferenceEngine {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self { router }
    }

    fn type_instructions(analysis_type: InferenceType) -> &'static str {
        match analysis_type {
            InferenceType::Full => {
                "Walk through the logical reasoning step by step, then conclude."
            }
            InferenceType::Causal => {
                "Focus on cause-and-effect. Include CAUSAL_CHAIN, FEEDBACK_LOOPS, \
                 and ROOT_CAUSE sections."
            }
            InferenceType::Constraints => {
                "Focus on constraint satisfaction. Include CONSTRAINT_SATISFACTION \
                 (one 'name: value' line per constraint, values 0.0-1.0), \
                 OVERALL_SATISFACTION, and TRADE_OFFS sections."
            }
            InferenceType::Contradiction => {
                "Focus on internal contradictions. Include a CONTRADICTIONS section \
                 (one 'statement1 | statement2 | severity' line each) and a \
                 RESOLUTION section."
            }
            InferenceType::Implications => {
                "Focus on consequences. Include IMPLICATIONS and \
                 SECOND_ORDER_EFFECTS sections."
            }
        }
    }

    fn single_prompt(idea: &str, topic: &str, context: &str, analysis_type: InferenceType) -> String {
        format!(
            "You are a logical analyst.\nTopic: {topic}\nContext: {context}\n\n\
             Analyze the idea below. {}\n\n\
             Respond in this plain-text format:\n\
             INFERENCE_CHAIN:\n- [Step 1]: ...\n- [Step 2]: ...\n\n\
             CONCLUSION: ...\n\nCONFIDENCE: 0.0-1.0\n\nIMPROVEMENTS: ...\n\n\
             Idea: {idea}\n\n{LANGUAGE_CONSISTENCY_INSTRUCTION}",
            Self::type_instructions(analysis_type)
        )
    }

    fn batch_prompt(
        ideas: &[String],
        topic: &str,
        context: &str,
        analysis_type: InferenceType,
    ) -> String {
        let mut body = String::new();
        for (index, idea) in ideas.iter().enumerate() {
            body.push_str(&format!("IDEA_{}: {idea}\n", index + 1));
        }
        format!(
            "You are a logical analyst.\nTopic: {topic}\nContext: {context}\n\n\
             Analyze each idea below. {}\n\n\
             For idea N, start its section with the exact delimiter line \
             '=== ANALYSIS_FOR_IDEA_N ===' (N starting at 1) followed by:\n\
             INFERENCE_CHAIN:\n- [Step 1]: ...\n\n\
             CONCLUSION: ...\n\nCONFIDENCE: 0.0-1.0\n\nIMPROVEMENTS: ...\n\n\
             {body}\n{LANGUAGE_CONSISTENCY_INSTRUCTION}",
            Self::type_instructions(analysis_type)
        )
    }

    /// Analyze a single idea. API failures degrade to an error placeholder.
    pub async fn analyze(
        &self,
        idea: &str,
        topic: &str,
        context: &str,
        analysis_type: InferenceType,
    ) -> (InferenceResult, u64) {
        let request = StructuredRequest::new(
            Self::single_prompt(idea, topic, context, analysis_type),
            ANALYSIS_TEMPERATURE,
        );
        match self.router.generate(&request).await {
            Ok(response) => {
                let result = parse_analysis_section(&response.text, analysis_type)
                    .unwrap_or_else(|| InferenceResult::unparseable(analysis_type));
                (result, response.tokens_used)
            }
            Err(e) => (InferenceResult::from_error(analysis_type, &e.to_string()), 0),
        }
    }

    /// Analyze all ideas in one call. The returned list always has the
    /// input length; missing or unparseable sections become placeholders.
    pub async fn analyze_batch(
        &self,
        ideas: &[String],
        topic: &str,
        context: &str,
        analysis_type: InferenceType,
    ) -> crate::errors::Result<(Vec<InferenceResult>, u64)> {
        if ideas.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let request = StructuredRequest::new(
            Self::batch_prompt(ideas, topic, context, analysis_type),
            ANALYSIS_TEMPERATURE,
        );
        match self.router.generate(&request).await {
            Ok(response) => {
                let results = split_batch_response(&response.text, ideas.len(), analysis_type);
                Ok((results, response.tokens_used))
            }
            Err(e) => {
                tracing::warn!("Batch logical inference failed: {e}");
                let message = e.to_string();
                Ok((
                    ideas
                        .iter()
                        .map(|_| InferenceResult::from_error(analysis_type, &message))
                        .collect(),
                    0,
                ))
            }
        }
    }
}

/// Split a batch response into per-idea sections keyed by the 1-based
/// delimiter index.
fn split_batch_response(
    text: &str,
    expected: usize,
    analysis_type: InferenceType,
) -> Vec<InferenceResult> {
    let mut sections: HashMap<usize, &str> = HashMap::new();
    let markers: Vec<(usize, usize, usize)> = delimiter_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps[1].parse::<usize>().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    for (i, (number, _, body_start)) in markers.iter().enumerate() {
        let body_end = markers
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(text.len());
        sections.insert(*number, &text[*body_start..body_end]);
    }

    (1..=expected)
        .map(|number| {
            sections
                .get(&number)
                .and_then(|section| parse_analysis_section(section, analysis_type))
                .unwrap_or_else(|| InferenceResult::unparseable(analysis_type))
        })
        .collect()
}

/// Parse one analysis section in the plain-text field format.
fn parse_analysis_section(text: &str, analysis_type: InferenceType) -> Option<InferenceResult> {
    let fields = collect_fields(text);

    let inference_chain = fields
        .get("INFERENCE_CHAIN")
        .map(|body| bullet_lines(body))
        .unwrap_or_default();
    let conclusion = fields
        .get("CONCLUSION")
        .map(|body| body.trim().to_string())
        .unwrap_or_default();
    let confidence = fields
        .get("CONFIDENCE")
        .and_then(|body| body.trim().parse::<f64>().ok())
        .map(|value| round2(value.clamp(0.0, 1.0)))
        .unwrap_or(0.0);
    let improvements = fields
        .get("IMPROVEMENTS")
        .map(|body| body.trim().to_string())
        .filter(|body| !body.is_empty());

    if inference_chain.is_empty() && conclusion.is_empty() {
        return None;
    }

    let details = match analysis_type {
        InferenceType::Full => None,
        InferenceType::Causal => Some(AnalysisDetails::Causal {
            causal_chain: fields.get("CAUSAL_CHAIN").map(|body| bullet_lines(body)),
            feedback_loops: fields.get("FEEDBACK_LOOPS").map(|body| bullet_lines(body)),
            root_cause: fields.get("ROOT_CAUSE").map(|body| body.trim().to_string()),
        }),
        InferenceType::Constraints => Some(AnalysisDetails::Constraints {
            constraint_satisfaction: fields
                .get("CONSTRAINT_SATISFACTION")
                .map(|body| parse_satisfaction_map(body)),
            overall_satisfaction: fields
                .get("OVERALL_SATISFACTION")
                .and_then(|body| body.trim().parse::<f64>().ok()),
            trade_offs: fields.get("TRADE_OFFS").map(|body| bullet_lines(body)),
        }),
        InferenceType::Contradiction => Some(AnalysisDetails::Contradiction {
            contradictions: fields
                .get("CONTRADICTIONS")
                .map(|body| parse_contradictions(body)),
            resolution: fields.get("RESOLUTION").map(|body| body.trim().to_string()),
        }),
        InferenceType::Implications => Some(AnalysisDetails::Implications {
            implications: fields.get("IMPLICATIONS").map(|body| bullet_lines(body)),
            second_order_effects: fields
                .get("SECOND_ORDER_EFFECTS")
                .map(|body| bullet_lines(body)),
        }),
    };

    Some(InferenceResult {
        analysis_type,
        inference_chain,
        conclusion,
        confidence,
        improvements,
        error: None,
        details,
    })
}

const FIELD_NAMES: [&str; 12] = [
    "INFERENCE_CHAIN",
    "CONCLUSION",
    "CONFIDENCE",
    "IMPROVEMENTS",
    "CAUSAL_CHAIN",
    "FEEDBACK_LOOPS",
    "ROOT_CAUSE",
    "CONSTRAINT_SATISFACTION",
    "OVERALL_SATISFACTION",
    "TRADE_OFFS",
    "CONTRADICTIONS",
    "RESOLUTION",
];

const FIELD_NAMES_EXTRA: [&str; 2] = ["IMPLICATIONS", "SECOND_ORDER_EFFECTS"];

fn is_field_heading(line: &str) -> Option<&'static str> {
    let trimmed = line.trim();
    FIELD_NAMES
        .iter()
        .chain(FIELD_NAMES_EXTRA.iter())
        .find(|name| trimmed.starts_with(&format!("{name}:")))
        .copied()
}

/// Collect `FIELD: body` blocks; a field's body runs until the next field
/// heading.
fn collect_fields(text: &str) -> HashMap<&'static str, String> {
    let mut fields: HashMap<&'static str, String> = HashMap::new();
    let mut current: Option<&'static str> = None;

    for line in text.lines() {
        if let Some(name) = is_field_heading(line) {
            current = Some(name);
            let after = line.trim().trim_start_matches(&format!("{name}:")).trim();
            let entry = fields.entry(name).or_default();
            if !after.is_empty() {
                entry.push_str(after);
            }
        } else if let Some(name) = current {
            let entry = fields.entry(name).or_default();
            if !entry.is_empty() {
                entry.push('\n');
            }
            entry.push_str(line);
        }
    }

    fields
}

fn bullet_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-') || line.starts_with('•'))
        .map(|line| line.trim_start_matches(['-', '•']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn parse_satisfaction_map(body: &str) -> HashMap<String, f64> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['-', '•']).trim();
            let (name, value) = line.split_once(':')?;
            let value = value.trim().parse::<f64>().ok()?;
            Some((name.trim().to_string(), value))
        })
        .collect()
}

fn parse_contradictions(body: &str) -> Vec<ContradictionPair> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['-', '•']).trim();
            let mut parts = line.split('|').map(str::trim);
            let statement1 = parts.next()?.to_string();
            let statement2 = parts.next()?.to_string();
            let severity = parts.next().unwrap_or("unknown").to_string();
            if statement1.is_empty() || statement2.is_empty() {
                None
            } else {
                Some(ContradictionPair {
                    statement1,
                    statement2,
                    severity,
                })
            }
        })
        .collect()
}

/// Render an analysis for human consumption.
///
/// Brief: conclusion + confidence percentage. Standard: adds the inference
/// chain. Detailed: adds type-specific fields and improvements.
pub fn format_for_display(result: &InferenceResult, verbosity: Verbosity) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Conclusion: {}\nConfidence: {:.0}%\n",
        result.conclusion,
        result.confidence * 100.0
    ));
    if verbosity == Verbosity::Brief {
        return out;
    }

    if !result.inference_chain.is_empty() {
        out.push_str("\nInference chain:\n");
        for (index, step) in result.inference_chain.iter().enumerate() {
            out.push_str(&format!("  {}. {step}\n", index + 1));
        }
    }
    if verbosity == Verbosity::Standard {
        return out;
    }

    match &result.details {
        Some(AnalysisDetails::Causal {
            causal_chain,
            feedback_loops,
            root_cause,
        }) => {
            if let Some(chain) = causal_chain {
                out.push_str(&format!("\nCausal chain: {}\n", chain.join(" → ")));
            }
            if let Some(loops) = feedback_loops {
                out.push_str(&format!("Feedback loops: {}\n", loops.join("; ")));
            }
            if let Some(root) = root_cause {
                out.push_str(&format!("Root cause: {root}\n"));
            }
        }
        Some(AnalysisDetails::Constraints {
            constraint_satisfaction,
            overall_satisfaction,
            trade_offs,
        }) => {
            if let Some(map) = constraint_satisfaction {
                let mut entries: Vec<String> =
                    map.iter().map(|(k, v)| format!("{k}={v:.2}")).collect();
                entries.sort();
                out.push_str(&format!("\nConstraints: {}\n", entries.join(", ")));
            }
            if let Some(overall) = overall_satisfaction {
                out.push_str(&format!("Overall satisfaction: {overall:.2}\n"));
            }
            if let Some(trade_offs) = trade_offs {
                out.push_str(&format!("Trade-offs: {}\n", trade_offs.join("; ")));
            }
        }
        Some(AnalysisDetails::Contradiction {
            contradictions,
            resolution,
        }) => {
            if let Some(pairs) = contradictions {
                out.push_str("\nContradictions:\n");
                for pair in pairs {
                    out.push_str(&format!(
                        "  '{}' vs '{}' ({})\n",
                        pair.statement1, pair.statement2, pair.severity
                    ));
                }
            }
            if let Some(resolution) = resolution {
                out.push_str(&format!("Resolution: {resolution}\n"));
            }
        }
        Some(AnalysisDetails::Implications {
            implications,
            second_order_effects,
        }) => {
            if let Some(implications) = implications {
                out.push_str(&format!("\nImplications: {}\n", implications.join("; ")));
            }
            if let Some(effects) = second_order_effects {
                out.push_str(&format!("Second-order effects: {}\n", effects.join("; ")));
            }
        }
        None => {}
    }

    if let Some(improvements) = &result.improvements {
        out.push_str(&format!("\nImprovements: {improvements}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BATCH: &str = "=== ANALYSIS_FOR_IDEA_1 ===\n\
INFERENCE_CHAIN:\n\
- [Step 1]: Simple controls address mobile constraints\n\
- [Step 2]: One-button design reduces complexity\n\n\
CONCLUSION: Logically sound for mobile development\n\n\
CONFIDENCE: 0.8\n\n\
IMPROVEMENTS: Add visual feedback for button presses\n\n\
=== ANALYSIS_FOR_IDEA_2 ===\n\
INFERENCE_CHAIN:\n\
- [Step 1]: Color matching is intuitive\n\n\
CONCLUSION: Strong logical foundation\n\n\
CONFIDENCE: 0.9\n";

    #[test]
    fn test_batch_split_basic() {
        let results = split_batch_response(SAMPLE_BATCH, 2, InferenceType::Full);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].confidence, 0.8);
        assert!(results[0].inference_chain[0].contains("Simple controls"));
        assert_eq!(
            results[0].improvements.as_deref(),
            Some("Add visual feedback for button presses")
        );
        assert_eq!(results[1].confidence, 0.9);
    }

    #[test]
    fn test_missing_section_yields_placeholder() {
        let results = split_batch_response(SAMPLE_BATCH, 3, InferenceType::Full);
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].confidence, 0.0);
        assert_eq!(results[2].conclusion, UNPARSEABLE_CONCLUSION);
    }

    #[test]
    fn test_garbage_response_yields_all_placeholders() {
        let results = split_batch_response("no delimiters here", 2, InferenceType::Full);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.confidence == 0.0));
    }

    #[test]
    fn test_confidence_clamped_and_rounded() {
        let text = "CONCLUSION: fine\nCONFIDENCE: 1.567\n";
        let result = parse_analysis_section(text, InferenceType::Full).unwrap();
        assert_eq!(result.confidence, 1.0);

        let text = "CONCLUSION: fine\nCONFIDENCE: 0.876\n";
        let result = parse_analysis_section(text, InferenceType::Full).unwrap();
        assert_eq!(result.confidence, 0.88);
    }

    #[test]
    fn test_causal_details_parsed() {
        let text = "INFERENCE_CHAIN:\n- cause precedes effect\n\
CONCLUSION: causality holds\nCONFIDENCE: 0.7\n\
CAUSAL_CHAIN:\n- cheap transit\n- higher ridership\n\
ROOT_CAUSE: car dependence\n";
        let result = parse_analysis_section(text, InferenceType::Causal).unwrap();
        match result.details {
            Some(AnalysisDetails::Causal {
                causal_chain: Some(chain),
                root_cause: Some(root),
                ..
            }) => {
                assert_eq!(chain.len(), 2);
                assert_eq!(root, "car dependence");
            }
            other => panic!("expected causal details, got {other:?}"),
        }
    }

    #[test]
    fn test_constraint_details_parsed() {
        let text = "CONCLUSION: mostly satisfied\nCONFIDENCE: 0.6\n\
CONSTRAINT_SATISFACTION:\n- budget: 0.9\n- timeline: 0.4\n\
OVERALL_SATISFACTION: 0.65\n";
        let result = parse_analysis_section(text, InferenceType::Constraints).unwrap();
        match result.details {
            Some(AnalysisDetails::Constraints {
                constraint_satisfaction: Some(map),
                overall_satisfaction: Some(overall),
                ..
            }) => {
                assert_eq!(map["budget"], 0.9);
                assert_eq!(map["timeline"], 0.4);
                assert!((overall - 0.65).abs() < 1e-9);
            }
            other => panic!("expected constraint details, got {other:?}"),
        }
    }

    #[test]
    fn test_contradiction_details_parsed() {
        let text = "CONCLUSION: one conflict\nCONFIDENCE: 0.5\n\
CONTRADICTIONS:\n- low cost | premium quality | high\n\
RESOLUTION: tiered offering\n";
        let result = parse_analysis_section(text, InferenceType::Contradiction).unwrap();
        match result.details {
            Some(AnalysisDetails::Contradiction {
                contradictions: Some(pairs),
                resolution: Some(resolution),
            }) => {
                assert_eq!(pairs[0].statement1, "low cost");
                assert_eq!(pairs[0].severity, "high");
                assert_eq!(resolution, "tiered offering");
            }
            other => panic!("expected contradiction details, got {other:?}"),
        }
    }

    #[test]
    fn test_display_verbosity_levels() {
        let result = parse_analysis_section(
            "INFERENCE_CHAIN:\n- step one\nCONCLUSION: solid\nCONFIDENCE: 0.8\nIMPROVEMENTS: add tests\n",
            InferenceType::Full,
        )
        .unwrap();

        let brief = format_for_display(&result, Verbosity::Brief);
        assert!(brief.contains("80%"));
        assert!(!brief.contains("step one"));

        let standard = format_for_display(&result, Verbosity::Standard);
        assert!(standard.contains("step one"));
        assert!(!standard.contains("add tests"));

        let detailed = format_for_display(&result, Verbosity::Detailed);
        assert!(detailed.contains("add tests"));
    }

    #[test]
    fn test_error_placeholder() {
        let result = InferenceResult::from_error(InferenceType::Full, "API Error");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error.as_deref(), Some("API Error"));
        assert_eq!(result.conclusion, "API Error");
    }
}
