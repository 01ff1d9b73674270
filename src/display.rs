//! Terminal rendering of workflow results.
//!
//! The CLI prints the enriched ideas at one of three verbosity levels;
//! everything here is formatting only.

use colored::Colorize;

use crate::inference::{format_for_display, Verbosity};
use crate::types::{EnrichedIdea, OutputMode};

fn use_color() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn heading(text: &str) -> String {
    if use_color() {
        text.bold().cyan().to_string()
    } else {
        text.to_string()
    }
}

fn score_line(record: &EnrichedIdea) -> String {
    match (record.improved_score, record.score_delta) {
        (Some(improved), Some(delta)) => {
            let sign = if delta >= 0 { "+" } else { "" };
            format!(
                "Score: {} → {} ({sign}{delta})",
                record.score, improved
            )
        }
        _ => format!("Score: {}", record.score),
    }
}

/// Render the final idea list for the chosen output mode.
pub fn format_results(records: &[EnrichedIdea], mode: OutputMode) -> String {
    if records.is_empty() {
        return "No ideas were produced.".to_string();
    }

    let mut out = String::new();
    for (rank, record) in records.iter().enumerate() {
        out.push_str(&heading(&format!("Idea #{}\n", rank + 1)));

        let display_text = record.improved_idea.as_deref().unwrap_or(&record.text);
        out.push_str(display_text);
        out.push('\n');
        out.push_str(&score_line(record));
        out.push('\n');

        if mode == OutputMode::Brief {
            out.push('\n');
            continue;
        }

        if !record.critique.is_empty() {
            out.push_str(&format!("Critique: {}\n", record.critique));
        }
        if let Some(improved_critique) = &record.improved_critique {
            out.push_str(&format!("Re-evaluation: {improved_critique}\n"));
        }

        if mode == OutputMode::Detailed {
            if let Some(advocacy) = &record.advocacy {
                out.push_str(&heading("\nAdvocacy\n"));
                out.push_str(&advocacy.formatted);
            }
            if let Some(skepticism) = &record.skepticism {
                out.push_str(&heading("\nSkepticism\n"));
                out.push_str(&skepticism.formatted);
            }
            if let Some(evaluation) = &record.improved_multi_dimensional_evaluation {
                out.push_str(&heading("\nMulti-dimensional evaluation\n"));
                for (name, score) in evaluation.dimension_scores() {
                    out.push_str(&format!("  {name}: {score}\n"));
                }
                out.push_str(&format!(
                    "  overall: {:.1}, weighted: {:.2}\n  {}\n",
                    evaluation.overall_score, evaluation.weighted_score, evaluation.evaluation_summary
                ));
            }
            if let Some(inference) = &record.logical_inference {
                out.push_str(&heading("\nLogical inference\n"));
                out.push_str(&format_for_display(inference, Verbosity::Detailed));
            }
            if !record.partial_failures.is_empty() {
                out.push_str(&heading("\nPartial failures\n"));
                for failure in &record.partial_failures {
                    out.push_str(&format!("  • {failure}\n"));
                }
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> EnrichedIdea {
        let mut record = EnrichedIdea::new("Solar powered bus network");
        record.score = 6;
        record.critique = "Feasible but needs funding".to_string();
        record.improved_idea = Some("Modular solar bus network\n\nPhased rollout".to_string());
        record.set_improved_score(9);
        record.improved_critique = Some("Much stronger".to_string());
        record
    }

    #[test]
    fn test_brief_mode_omits_critique() {
        let output = format_results(&[sample_record()], OutputMode::Brief);
        assert!(output.contains("Modular solar bus network"));
        assert!(output.contains("6 → 9 (+3)"));
        assert!(!output.contains("Feasible but needs funding"));
    }

    #[test]
    fn test_simple_mode_includes_critiques() {
        let output = format_results(&[sample_record()], OutputMode::Simple);
        assert!(output.contains("Feasible but needs funding"));
        assert!(output.contains("Much stronger"));
    }

    #[test]
    fn test_detailed_mode_includes_partial_failures() {
        let mut record = sample_record();
        record.partial_failures.push("advocate: timed out".to_string());
        let output = format_results(&[record], OutputMode::Detailed);
        assert!(output.contains("advocate: timed out"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(format_results(&[], OutputMode::Simple), "No ideas were produced.");
    }
}
