//! Structured-output record shapes for the LLM boundary.
//!
//! Every agent call requests JSON constrained by one of these schemas and
//! validates the response into the matching struct. Internal code never
//! touches raw maps; parsing happens here, once, at the boundary.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// A record shape the LLM can be asked to produce.
///
/// `SCHEMA_NAME` is the fully qualified type name; together with the hash of
/// the JSON schema it makes cache keys sensitive to schema changes.
pub trait StructuredSchema: DeserializeOwned + Serialize {
    const SCHEMA_NAME: &'static str;

    /// JSON schema handed to the provider for native schema enforcement.
    fn json_schema() -> Value;

    /// SHA-256 over the canonical schema JSON.
    fn schema_hash() -> String {
        let schema = Self::json_schema();
        // BTreeMap round-trip sorts top-level keys for a stable digest
        let canonical = match serde_json::from_value::<BTreeMap<String, Value>>(schema.clone()) {
            Ok(map) => serde_json::to_string(&map).unwrap_or_else(|_| schema.to_string()),
            Err(_) => schema.to_string(),
        };
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Round a raw critic score half-up and clamp into [0, 10].
///
/// Non-finite input maps to 0.
pub fn clamp_score(raw: f64) -> i32 {
    if !raw.is_finite() {
        return 0;
    }
    let rounded = (raw + 0.5).floor();
    rounded.clamp(0.0, 10.0) as i32
}

/// Round a dimension score half-up and clamp into the given range.
pub fn clamp_dimension(raw: f64, min: i32, max: i32) -> i32 {
    if !raw.is_finite() {
        return min;
    }
    let rounded = (raw + 0.5).floor();
    rounded.clamp(min as f64, max as f64) as i32
}

// ---------------------------------------------------------------------------
// Idea generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaList {
    pub ideas: Vec<String>,
}

impl StructuredSchema for IdeaList {
    const SCHEMA_NAME: &'static str = "madspark::schemas::IdeaList";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideas": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["ideas"]
        })
    }
}

// ---------------------------------------------------------------------------
// Evaluation (critic)
// ---------------------------------------------------------------------------

/// Raw per-idea evaluation as returned by the critic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationItem {
    #[serde(default)]
    pub idea_index: usize,
    pub score: f64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationBatch {
    pub evaluations: Vec<EvaluationItem>,
}

impl StructuredSchema for EvaluationBatch {
    const SCHEMA_NAME: &'static str = "madspark::schemas::EvaluationBatch";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "evaluations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "idea_index": {"type": "integer"},
                            "score": {"type": "number"},
                            "comment": {"type": "string"}
                        },
                        "required": ["idea_index", "score", "comment"]
                    }
                }
            },
            "required": ["evaluations"]
        })
    }
}

/// Validated evaluation: integer score in [0, 10].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: i32,
    pub comment: String,
}

impl From<EvaluationItem> for Evaluation {
    fn from(item: EvaluationItem) -> Self {
        Self {
            score: clamp_score(item.score),
            comment: item.comment,
        }
    }
}

// ---------------------------------------------------------------------------
// Advocacy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitledPoint {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcernResponse {
    pub concern: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvocacyItem {
    #[serde(default)]
    pub idea_index: usize,
    #[serde(default)]
    pub strengths: Vec<TitledPoint>,
    #[serde(default)]
    pub opportunities: Vec<TitledPoint>,
    #[serde(default)]
    pub addressing_concerns: Vec<ConcernResponse>,
    /// Human-readable rendering, populated after validation.
    #[serde(default)]
    pub formatted: String,
}

impl AdvocacyItem {
    /// Render the structured advocacy into display text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("STRENGTHS:\n");
        for point in &self.strengths {
            out.push_str(&format!("• {}: {}\n", point.title, point.description));
        }
        out.push_str("\nOPPORTUNITIES:\n");
        for point in &self.opportunities {
            out.push_str(&format!("• {}: {}\n", point.title, point.description));
        }
        if !self.addressing_concerns.is_empty() {
            out.push_str("\nADDRESSING CONCERNS:\n");
            for entry in &self.addressing_concerns {
                out.push_str(&format!("• {}: {}\n", entry.concern, entry.response));
            }
        }
        out
    }

    pub fn finalize(mut self) -> Self {
        self.formatted = self.render();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvocacyBatch {
    pub advocacies: Vec<AdvocacyItem>,
}

fn titled_point_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "description": {"type": "string"}
        },
        "required": ["title", "description"]
    })
}

impl StructuredSchema for AdvocacyBatch {
    const SCHEMA_NAME: &'static str = "madspark::schemas::AdvocacyBatch";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "advocacies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "idea_index": {"type": "integer"},
                            "strengths": {"type": "array", "items": titled_point_schema()},
                            "opportunities": {"type": "array", "items": titled_point_schema()},
                            "addressing_concerns": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "concern": {"type": "string"},
                                        "response": {"type": "string"}
                                    },
                                    "required": ["concern", "response"]
                                }
                            }
                        },
                        "required": ["idea_index", "strengths", "opportunities"]
                    }
                }
            },
            "required": ["advocacies"]
        })
    }
}

// ---------------------------------------------------------------------------
// Skepticism
// ---------------------------------------------------------------------------

/// Skeptic bullet points arrive either as plain strings or titled entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkepticPoint {
    Titled(TitledPoint),
    Text(String),
}

impl SkepticPoint {
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Titled(point) => format!("{}: {}", point.title, point.description),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkepticismItem {
    #[serde(default)]
    pub idea_index: usize,
    #[serde(default)]
    pub critical_flaws: Vec<SkepticPoint>,
    #[serde(default)]
    pub risks_challenges: Vec<SkepticPoint>,
    #[serde(default)]
    pub questionable_assumptions: Vec<SkepticPoint>,
    #[serde(default)]
    pub missing_considerations: Vec<SkepticPoint>,
    /// Human-readable rendering, populated after validation.
    #[serde(default)]
    pub formatted: String,
}

impl SkepticismItem {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let sections: [(&str, &Vec<SkepticPoint>); 4] = [
            ("CRITICAL FLAWS:", &self.critical_flaws),
            ("RISKS & CHALLENGES:", &self.risks_challenges),
            ("QUESTIONABLE ASSUMPTIONS:", &self.questionable_assumptions),
            ("MISSING CONSIDERATIONS:", &self.missing_considerations),
        ];
        for (heading, points) in sections {
            if points.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(heading);
            out.push('\n');
            for point in points {
                out.push_str(&format!("• {}\n", point.display_text()));
            }
        }
        out
    }

    pub fn finalize(mut self) -> Self {
        self.formatted = self.render();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkepticismBatch {
    pub critiques: Vec<SkepticismItem>,
}

impl StructuredSchema for SkepticismBatch {
    const SCHEMA_NAME: &'static str = "madspark::schemas::SkepticismBatch";

    fn json_schema() -> Value {
        let point_list = json!({
            "type": "array",
            "items": {"type": "string"}
        });
        json!({
            "type": "object",
            "properties": {
                "critiques": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "idea_index": {"type": "integer"},
                            "critical_flaws": point_list.clone(),
                            "risks_challenges": point_list.clone(),
                            "questionable_assumptions": point_list.clone(),
                            "missing_considerations": point_list
                        },
                        "required": [
                            "idea_index",
                            "critical_flaws",
                            "risks_challenges",
                            "questionable_assumptions",
                            "missing_considerations"
                        ]
                    }
                }
            },
            "required": ["critiques"]
        })
    }
}

// ---------------------------------------------------------------------------
// Improvement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementItem {
    #[serde(default)]
    pub idea_index: usize,
    pub improved_title: String,
    pub improved_description: String,
    #[serde(default)]
    pub key_improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentiators: Option<Vec<String>>,
}

impl ImprovementItem {
    /// Title + blank line + description, the display form downstream
    /// consumers expect.
    pub fn combined_text(&self) -> String {
        format!("{}\n\n{}", self.improved_title, self.improved_description)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementBatch {
    pub improvements: Vec<ImprovementItem>,
}

impl StructuredSchema for ImprovementBatch {
    const SCHEMA_NAME: &'static str = "madspark::schemas::ImprovementBatch";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "improvements": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "idea_index": {"type": "integer"},
                            "improved_title": {"type": "string"},
                            "improved_description": {"type": "string"},
                            "key_improvements": {"type": "array", "items": {"type": "string"}},
                            "implementation_steps": {"type": "array", "items": {"type": "string"}},
                            "differentiators": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": [
                            "idea_index",
                            "improved_title",
                            "improved_description",
                            "key_improvements"
                        ]
                    }
                }
            },
            "required": ["improvements"]
        })
    }
}

// ---------------------------------------------------------------------------
// Multi-dimensional evaluation
// ---------------------------------------------------------------------------

/// Raw per-idea dimension scores from the batched evaluator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiDimScores {
    #[serde(default)]
    pub idea_index: usize,
    pub feasibility: f64,
    pub innovation: f64,
    pub impact: f64,
    pub cost_effectiveness: f64,
    pub scalability: f64,
    #[serde(alias = "safety_score")]
    pub risk_assessment: f64,
    pub timeline: f64,
}

impl MultiDimScores {
    pub fn dimension(&self, name: &str) -> Option<f64> {
        match name {
            "feasibility" => Some(self.feasibility),
            "innovation" => Some(self.innovation),
            "impact" => Some(self.impact),
            "cost_effectiveness" => Some(self.cost_effectiveness),
            "scalability" => Some(self.scalability),
            "risk_assessment" => Some(self.risk_assessment),
            "timeline" => Some(self.timeline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiDimBatch {
    pub evaluations: Vec<MultiDimScores>,
}

impl StructuredSchema for MultiDimBatch {
    const SCHEMA_NAME: &'static str = "madspark::schemas::MultiDimBatch";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "evaluations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "idea_index": {"type": "integer"},
                            "feasibility": {"type": "number"},
                            "innovation": {"type": "number"},
                            "impact": {"type": "number"},
                            "cost_effectiveness": {"type": "number"},
                            "scalability": {"type": "number"},
                            "risk_assessment": {"type": "number"},
                            "timeline": {"type": "number"}
                        },
                        "required": [
                            "idea_index", "feasibility", "innovation", "impact",
                            "cost_effectiveness", "scalability", "risk_assessment", "timeline"
                        ]
                    }
                }
            },
            "required": ["evaluations"]
        })
    }
}

/// One dimension judged on its own (single-idea evaluation path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl StructuredSchema for DimensionScore {
    const SCHEMA_NAME: &'static str = "madspark::schemas::DimensionScore";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "score": {"type": "number"},
                "reasoning": {"type": "string"}
            },
            "required": ["score"]
        })
    }
}

/// Free-text summary produced by the evaluator's summary call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryText {
    pub summary: String,
}

impl StructuredSchema for SummaryText {
    const SCHEMA_NAME: &'static str = "madspark::schemas::SummaryText";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"}
            },
            "required": ["summary"]
        })
    }
}

/// Validated multi-dimensional evaluation with derived aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiDimEvaluation {
    pub feasibility: i32,
    pub innovation: i32,
    pub impact: i32,
    pub cost_effectiveness: i32,
    pub scalability: i32,
    pub risk_assessment: i32,
    pub timeline: i32,
    /// Unweighted mean of the seven dimensions.
    pub overall_score: f64,
    /// Weighted mean per the configured dimension weights.
    pub weighted_score: f64,
    pub evaluation_summary: String,
    pub confidence_interval: f64,
}

impl MultiDimEvaluation {
    pub fn dimension_scores(&self) -> [(&'static str, i32); 7] {
        [
            ("feasibility", self.feasibility),
            ("innovation", self.innovation),
            ("impact", self.impact),
            ("cost_effectiveness", self.cost_effectiveness),
            ("scalability", self.scalability),
            ("risk_assessment", self.risk_assessment),
            ("timeline", self.timeline),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_rounds_half_up() {
        assert_eq!(clamp_score(7.6), 8);
        assert_eq!(clamp_score(7.5), 8);
        assert_eq!(clamp_score(7.4), 7);
        assert_eq!(clamp_score(8.0), 8);
    }

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(15.0), 10);
        assert_eq!(clamp_score(f64::NAN), 0);
        assert_eq!(clamp_score(f64::INFINITY), 10);
    }

    #[test]
    fn test_clamp_dimension_range() {
        assert_eq!(clamp_dimension(0.0, 1, 10), 1);
        assert_eq!(clamp_dimension(11.2, 1, 10), 10);
        assert_eq!(clamp_dimension(5.5, 1, 10), 6);
    }

    #[test]
    fn test_evaluation_from_item_clamps() {
        let item = EvaluationItem {
            idea_index: 0,
            score: 7.6,
            comment: "solid".to_string(),
        };
        let evaluation: Evaluation = item.into();
        assert_eq!(evaluation.score, 8);
    }

    #[test]
    fn test_advocacy_render_contains_sections() {
        let advocacy = AdvocacyItem {
            idea_index: 0,
            strengths: vec![TitledPoint {
                title: "Low cost".to_string(),
                description: "Runs on existing infrastructure".to_string(),
            }],
            opportunities: vec![TitledPoint {
                title: "Partnerships".to_string(),
                description: "Cities seek pilot programs".to_string(),
            }],
            addressing_concerns: vec![ConcernResponse {
                concern: "Adoption".to_string(),
                response: "Start with a single district".to_string(),
            }],
            formatted: String::new(),
        }
        .finalize();

        assert!(advocacy.formatted.contains("STRENGTHS:"));
        assert!(advocacy.formatted.contains("Low cost"));
        assert!(advocacy.formatted.contains("ADDRESSING CONCERNS:"));
    }

    #[test]
    fn test_skeptic_point_union_deserializes() {
        let raw = r#"{
            "idea_index": 1,
            "critical_flaws": ["too expensive", {"title": "Scale", "description": "hard to grow"}],
            "risks_challenges": [],
            "questionable_assumptions": [],
            "missing_considerations": []
        }"#;
        let item: SkepticismItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.critical_flaws.len(), 2);
        assert_eq!(item.critical_flaws[0].display_text(), "too expensive");
        assert_eq!(item.critical_flaws[1].display_text(), "Scale: hard to grow");
    }

    #[test]
    fn test_improvement_combined_text() {
        let item = ImprovementItem {
            idea_index: 0,
            improved_title: "Modular bike stations".to_string(),
            improved_description: "Prefab stations deployable in a weekend".to_string(),
            key_improvements: vec!["lower install cost".to_string()],
            implementation_steps: None,
            differentiators: None,
        };
        assert_eq!(
            item.combined_text(),
            "Modular bike stations\n\nPrefab stations deployable in a weekend"
        );
    }

    #[test]
    fn test_multidim_safety_score_alias() {
        let raw = r#"{
            "idea_index": 0,
            "feasibility": 8, "innovation": 7, "impact": 6,
            "cost_effectiveness": 5, "scalability": 6,
            "safety_score": 7, "timeline": 5
        }"#;
        let scores: MultiDimScores = serde_json::from_str(raw).unwrap();
        assert_eq!(scores.risk_assessment, 7.0);
    }

    #[test]
    fn test_schema_hash_is_stable_and_distinct() {
        assert_eq!(EvaluationBatch::schema_hash(), EvaluationBatch::schema_hash());
        assert_ne!(EvaluationBatch::schema_hash(), AdvocacyBatch::schema_hash());
    }
}
