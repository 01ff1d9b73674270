//! Pre-evaluation deduplication of generated ideas.
//!
//! Pairwise Jaccard similarity over lowercase token sets; ideas at or above
//! the threshold are duplicates and the first occurrence wins.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

fn word_regex() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("invalid word regex"))
}

fn token_set(text: &str) -> HashSet<String> {
    word_regex()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity between two texts' token sets.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Textual-similarity dedupe with a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct NoveltyFilter {
    threshold: f64,
}

impl NoveltyFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Remove ideas whose similarity to an earlier idea is at or above the
    /// threshold. Deterministic: the first occurrence is kept.
    pub fn filter(&self, ideas: Vec<String>) -> Vec<String> {
        let mut kept: Vec<String> = Vec::with_capacity(ideas.len());
        for idea in ideas {
            let duplicate = kept
                .iter()
                .any(|existing| jaccard_similarity(existing, &idea) >= self.threshold);
            if duplicate {
                tracing::debug!("Novelty filter dropped near-duplicate idea: {idea}");
            } else {
                kept.push(idea);
            }
        }
        kept
    }
}

impl Default for NoveltyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_are_fully_similar() {
        assert_eq!(jaccard_similarity("solar powered bus", "solar powered bus"), 1.0);
    }

    #[test]
    fn test_disjoint_texts_have_zero_similarity() {
        assert_eq!(jaccard_similarity("solar bus", "quantum cheese"), 0.0);
    }

    #[test]
    fn test_filter_drops_duplicates_keeps_first() {
        let filter = NoveltyFilter::new(0.8);
        let ideas = vec![
            "Solar powered electric bus network".to_string(),
            "Solar powered electric bus network!".to_string(),
            "Underground freight tunnels".to_string(),
        ];
        let kept = filter.filter(ideas);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], "Solar powered electric bus network");
        assert_eq!(kept[1], "Underground freight tunnels");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // "a b" vs "a b" similarity 1.0; with threshold 1.0 it still drops
        let filter = NoveltyFilter::new(1.0);
        let kept = filter.filter(vec!["a b".to_string(), "b a".to_string()]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_low_threshold_keeps_distinct_ideas() {
        let filter = NoveltyFilter::new(0.8);
        let ideas = vec![
            "Community bike sharing stations".to_string(),
            "Electric ferry routes on the river".to_string(),
        ];
        assert_eq!(filter.filter(ideas).len(), 2);
    }

    #[test]
    fn test_unicode_tokens() {
        let sim = jaccard_similarity("都市の再生計画", "都市の再生計画");
        assert_eq!(sim, 1.0);
    }
}
