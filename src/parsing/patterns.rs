//! Pre-compiled regex patterns for the parsing strategies.
//!
//! Comment-capture groups are bounded to 500 characters so a hostile
//! response cannot trigger catastrophic backtracking.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum characters captured for a free-text comment.
pub const MAX_COMMENT_LENGTH: usize = 500;

/// Matches `{…}` blocks with one level of nested braces.
pub fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").expect("invalid json object regex")
    })
}

/// Matches double-quoted strings that contain a raw newline.
pub fn newline_in_string_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""[^"]{0,2000}\n[^"]{0,2000}""#).expect("invalid newline-in-string regex")
    })
}

/// Standard `Score: N ... Comment: ...` format.
pub fn score_comment_standard() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)score[:\s]+(\d+(?:\.\d+)?)[\s,;.]*comment[:\s]+([^\n]{1,500})")
            .expect("invalid score/comment regex")
    })
}

/// Narrative score phrasings: "scores an 8", "give it a score of 7",
/// "deserves a 9".
pub fn score_narrative_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)scores?\s+an?\s+(\d+(?:\.\d+)?)\b[\s:.,-]*([^\n]{0,500})",
            r"(?i)give\s+it\s+a\s+score\s+of\s+(\d+(?:\.\d+)?)\b[\s:.,-]*([^\n]{0,500})",
            r"(?i)deserves\s+an?\s+(\d+(?:\.\d+)?)\b[\s:.,-]*([^\n]{0,500})",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("invalid narrative regex"))
        .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_pattern_matches_nested() {
        let text = r#"before {"a": 1, "b": {"c": 2}} after"#;
        let matches: Vec<_> = json_object_pattern().find_iter(text).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].as_str(), r#"{"a": 1, "b": {"c": 2}}"#);
    }

    #[test]
    fn test_standard_score_comment() {
        let caps = score_comment_standard()
            .captures("Score: 8 Comment: strong concept")
            .unwrap();
        assert_eq!(&caps[1], "8");
        assert_eq!(caps[2].trim(), "strong concept");
    }

    #[test]
    fn test_narrative_patterns() {
        let text = "This idea scores an 7 because it is practical.";
        let caps = score_narrative_patterns()[0].captures(text).unwrap();
        assert_eq!(&caps[1], "7");
    }

    #[test]
    fn test_comment_capture_is_bounded() {
        let long_comment = "x".repeat(5000);
        let text = format!("Score: 5 Comment: {long_comment}");
        let caps = score_comment_standard().captures(&text).unwrap();
        assert!(caps[2].len() <= MAX_COMMENT_LENGTH);
    }
}
