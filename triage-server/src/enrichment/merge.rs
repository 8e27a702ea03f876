//! Keyword/description merge
//!
//! Merging is commutative with user edits: existing keywords are never
//! removed or rewritten, and `description` is only filled when empty.

use std::collections::HashSet;

use shared::models::ImageRecord;

use super::analyzer::Analysis;

/// Existing keywords verbatim, then every candidate not already present
/// (case-insensitively). Blank candidates are dropped.
pub fn merge_keywords(existing: &[String], candidates: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = existing.iter().map(|k| k.trim().to_lowercase()).collect();
    let mut merged = existing.to_vec();

    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if seen.insert(candidate.to_lowercase()) {
            merged.push(candidate.to_string());
        }
    }
    merged
}

/// Merge `analysis` into `record`; returns whether anything changed
pub fn apply_analysis(record: &mut ImageRecord, analysis: &Analysis) -> bool {
    let keywords = merge_keywords(&record.keywords, &analysis.keywords);
    let mut changed = keywords.len() != record.keywords.len();
    record.keywords = keywords;

    let description = analysis.description.trim();
    if record.description.trim().is_empty() && !description.is_empty() {
        record.description = description.to_string();
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_is_case_insensitive() {
        let merged = merge_keywords(
            &strings(&["beach", "sunset"]),
            &strings(&["Beach", "ocean", "SUNSET"]),
        );
        assert_eq!(merged, strings(&["beach", "sunset", "ocean"]));
    }

    #[test]
    fn test_merge_drops_blank_and_repeated_candidates() {
        let merged = merge_keywords(&[], &strings(&["", "  ", "Dog", "dog", " cat "]));
        assert_eq!(merged, strings(&["Dog", "cat"]));
    }

    #[test]
    fn test_description_only_when_empty() {
        let mut record =
            ImageRecord::new_ingested("img", "a/x.jpg", "a/x_s.jpg", "a/x_l.jpg", 0);
        record.description = "User text".into();
        let analysis = Analysis {
            keywords: vec![],
            description: "Model text".into(),
        };
        assert!(!apply_analysis(&mut record, &analysis));
        assert_eq!(record.description, "User text");

        record.description.clear();
        assert!(apply_analysis(&mut record, &analysis));
        assert_eq!(record.description, "Model text");
    }
}
