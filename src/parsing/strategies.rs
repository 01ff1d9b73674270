//! Parsing strategy implementations.
//!
//! Each strategy is a plain function returning `Option`; the parser chains
//! them and short-circuits on the first non-empty result. No errors cross
//! strategy boundaries.
//!
//! Execution order (fast to slow):
//! 1. `direct_json` - parse as complete valid JSON
//! 2. `array_extraction` - bracket-matching array scan
//! 3. `line_by_line` - one JSON object per line
//! 4. `regex_object_extraction` - regex `{...}` blocks
//! 5. `score_comment_extraction` - legacy text format fallback

use serde_json::{json, Value};

use crate::parsing::patterns;

/// Placeholder record emitted when nothing parses but a count is expected.
pub fn placeholder_evaluation() -> Value {
    json!({"score": 0, "comment": "Failed to parse evaluation"})
}

/// Strategy 1: parse the entire text as JSON.
///
/// Succeeds on roughly 80% of well-formed LLM output. Only arrays and
/// objects count; bare scalars are rejected.
pub fn direct_json(text: &str, _expected_count: Option<usize>) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Array(_)) | Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Strategy 2: extract top-level `[...]` arrays with manual bracket
/// counting that respects string literals and escapes, then concatenate
/// the object elements of every array found.
pub fn array_extraction(text: &str, _expected_count: Option<usize>) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    let mut results: Vec<Value> = Vec::new();
    for array in extract_json_arrays(text) {
        if let Value::Array(items) = array {
            for item in items {
                if item.is_object() {
                    results.push(item);
                }
            }
        }
    }

    if results.is_empty() {
        None
    } else {
        Some(Value::Array(results))
    }
}

fn extract_json_arrays(text: &str) -> Vec<Value> {
    let bytes = text.as_bytes();
    let mut arrays = Vec::new();
    let mut search_from = 0usize;

    while let Some(offset) = text[search_from..].find('[') {
        let array_start = search_from + offset;
        let mut bracket_count = 0i32;
        let mut in_string = false;
        let mut escape_next = false;
        let mut pos = array_start;
        let mut closed_at: Option<usize> = None;

        while pos < bytes.len() {
            let ch = bytes[pos];
            if escape_next {
                escape_next = false;
            } else if ch == b'\\' && in_string {
                escape_next = true;
            } else if ch == b'"' {
                in_string = !in_string;
            } else if !in_string {
                if ch == b'[' {
                    bracket_count += 1;
                } else if ch == b']' {
                    bracket_count -= 1;
                    if bracket_count == 0 {
                        closed_at = Some(pos);
                        break;
                    }
                }
            }
            pos += 1;
        }

        match closed_at {
            Some(end) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text[array_start..=end]) {
                    if value.is_array() {
                        arrays.push(value);
                    }
                }
                search_from = end + 1;
            }
            None => {
                search_from = array_start + 1;
            }
        }
        if search_from >= text.len() {
            break;
        }
    }

    arrays
}

/// Strategy 3: parse each non-blank line as a standalone JSON object.
pub fn line_by_line(text: &str, _expected_count: Option<usize>) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    let results: Vec<Value> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
        .collect();

    if results.is_empty() {
        None
    } else {
        Some(Value::Array(results))
    }
}

/// Strategy 4: extract `{...}` blocks with a pre-compiled pattern,
/// retrying with raw newlines escaped inside string literals.
pub fn regex_object_extraction(text: &str, _expected_count: Option<usize>) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    let mut results: Vec<Value> = Vec::new();
    for candidate in patterns::json_object_pattern().find_iter(text) {
        let raw = candidate.as_str();
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if value.is_object() {
                results.push(value);
                continue;
            }
        }
        // Retry with newlines escaped inside string literals
        let cleaned = patterns::newline_in_string_pattern()
            .replace_all(raw, |caps: &regex::Captures| caps[0].replace('\n', "\\n"));
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            if value.is_object() {
                results.push(value);
            }
        }
    }

    if results.is_empty() {
        None
    } else {
        Some(Value::Array(results))
    }
}

/// Strategy 5: legacy score/comment extraction (last resort).
///
/// Matches `Score: N ... Comment: ...` plus narrative phrasings. When
/// nothing matches and `expected_count` is provided, emits placeholder
/// records so callers can keep list alignment.
pub fn score_comment_extraction(text: &str, expected_count: Option<usize>) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    let mut results: Vec<Value> = Vec::new();

    for caps in patterns::score_comment_standard().captures_iter(text) {
        if let Ok(score) = caps[1].parse::<f64>() {
            results.push(json!({
                "score": score,
                "comment": caps[2].trim().trim_matches(&['"', '\''][..]),
            }));
        }
    }

    if results.is_empty() {
        for pattern in patterns::score_narrative_patterns() {
            for caps in pattern.captures_iter(text) {
                if let Ok(score) = caps[1].parse::<f64>() {
                    results.push(json!({
                        "score": score,
                        "comment": caps[2].trim().trim_matches(&['"', '\'', '.'][..]),
                    }));
                }
            }
            if !results.is_empty() {
                break;
            }
        }
    }

    if !results.is_empty() {
        return Some(match expected_count {
            None if results.len() == 1 => results.remove(0),
            None => Value::Array(results),
            Some(count) => {
                while results.len() < count {
                    results.push(placeholder_evaluation());
                }
                results.truncate(count);
                Value::Array(results)
            }
        });
    }

    // Nothing matched at all; emit placeholders if a count was requested
    match expected_count {
        Some(count) if count > 0 => {
            tracing::warn!("Creating {} placeholder evaluation entries", count);
            Some(Value::Array(
                (0..count).map(|_| placeholder_evaluation()).collect(),
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json_array() {
        let result = direct_json(r#"[{"id": 1}, {"id": 2}]"#, None).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_direct_json_rejects_scalars() {
        assert!(direct_json("42", None).is_none());
        assert!(direct_json(r#""hello""#, None).is_none());
        assert!(direct_json("", None).is_none());
    }

    #[test]
    fn test_array_extraction_from_mixed_content() {
        let text = r#"Here are results: [{"score": 8, "comment": "good"}] hope that helps"#;
        let result = array_extraction(text, None).unwrap();
        let items = result.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["score"], 8);
    }

    #[test]
    fn test_array_extraction_respects_strings_with_brackets() {
        let text = r#"[{"comment": "uses [markdown] syntax", "score": 5}]"#;
        let result = array_extraction(text, None).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_array_extraction_multiple_arrays() {
        let text = r#"[{"a": 1}] and also [{"b": 2}]"#;
        let result = array_extraction(text, None).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_line_by_line() {
        let text = "{\"id\": 1}\n\n{\"id\": 2}\nnot json\n{\"id\": 3}";
        let result = line_by_line(text, None).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_regex_object_extraction_with_newline_in_string() {
        let text = "Result: {\"comment\": \"line one\nline two\", \"score\": 6}";
        let result = regex_object_extraction(text, None).unwrap();
        let items = result.as_array().unwrap();
        assert_eq!(items[0]["score"], 6);
        assert!(items[0]["comment"].as_str().unwrap().contains("line one"));
    }

    #[test]
    fn test_score_comment_single() {
        let result = score_comment_extraction("Score: 8 Comment: Good idea", None).unwrap();
        assert_eq!(result["score"], 8.0);
        assert_eq!(result["comment"], "Good idea");
    }

    #[test]
    fn test_score_comment_narrative() {
        let result =
            score_comment_extraction("I think this deserves a 9 for creativity", None).unwrap();
        assert_eq!(result["score"], 9.0);
    }

    #[test]
    fn test_score_comment_placeholders_on_no_match() {
        let result = score_comment_extraction("totally unparseable prose", Some(3)).unwrap();
        let items = result.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["score"], 0);
        assert_eq!(items[0]["comment"], "Failed to parse evaluation");
    }

    #[test]
    fn test_score_comment_pads_to_expected_count() {
        let result = score_comment_extraction("Score: 7 Comment: only one", Some(2)).unwrap();
        let items = result.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["score"], 7.0);
        assert_eq!(items[1]["comment"], "Failed to parse evaluation");
    }
}
