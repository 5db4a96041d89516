//! String normalization and similarity scoring.
//!
//! Everything here is pure and allocation-light; the matcher and the
//! extractor's deduplication both score through these functions so that
//! "same provider" means the same thing everywhere.

use std::collections::HashSet;

use strsim::normalized_levenshtein;

/// Normalize for comparison: lowercase, trim, collapse inner whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized edit similarity in [0, 1] over normalized inputs.
/// 1.0 means identical after normalization, including two empty strings.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize(a), &normalize(b))
}

/// Jaccard-style word-set overlap in [0, 1] over normalized inputs.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Containment either direction over normalized inputs.
pub fn contains_either(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  John   SMITH  Plumbing "), "john smith plumbing");
    }

    #[test]
    fn edit_similarity_bounds() {
        assert!((edit_similarity("plumber", "plumber") - 1.0).abs() < f64::EPSILON);
        let sim = edit_similarity("plumber", "plumer");
        // one deletion over seven characters
        assert!((sim - (1.0 - 1.0 / 7.0)).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&edit_similarity("abc", "xyz")));
    }

    #[test]
    fn edit_similarity_normalizes_before_scoring() {
        assert!((edit_similarity("  JOHN  Smith ", "john smith") - 1.0).abs() < f64::EPSILON);
        assert!((edit_similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(edit_similarity("", "plumber") < f64::EPSILON);
    }

    #[test]
    fn word_overlap_partial() {
        let overlap = word_overlap("john smith plumbing", "smith plumbing services");
        // intersection {smith, plumbing} = 2, union = 4
        assert!((overlap - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn containment_is_case_insensitive() {
        assert!(contains_either("JOHN Smith Plumbing", "smith plumbing"));
        assert!(contains_either("smith", "John Smith Plumbing"));
        assert!(!contains_either("", "anything"));
    }
}
