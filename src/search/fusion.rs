//! Reciprocal Rank Fusion: fused = Σ 1/(rank + k)
//!
//! Combines the rank-ordered result lists of independent retrieval
//! modalities into one ranking without normalizing scores across them.
//! An item's raw modality score contributes only once, weighted low, the
//! first time its id is seen; every further appearance adds only the
//! rank term. First writer wins for content, source and kind.

use crate::types::SearchResult;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Damping constant: how much rank position matters vs. raw score
pub const RRF_K: f64 = 60.0;

/// Weight of the raw modality score, applied once per item
pub const ORIGINAL_SCORE_WEIGHT: f64 = 0.1;

/// Fuse rank-ordered modality result lists into a single ranking
///
/// Each list must already be ordered best-first; the zero-based position
/// within its list is the rank. Output is sorted by fused score
/// descending, ties broken by id for determinism.
pub fn fuse(result_sets: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut fused: HashMap<String, SearchResult> = HashMap::new();

    for result_set in result_sets {
        for (rank, result) in result_set.into_iter().enumerate() {
            let rrf = 1.0 / (rank as f64 + RRF_K);

            match fused.entry(result.id.clone()) {
                Entry::Occupied(mut seen) => {
                    seen.get_mut().score += rrf;
                }
                Entry::Vacant(slot) => {
                    let mut first = result;
                    first.score = rrf + first.score * ORIGINAL_SCORE_WEIGHT;
                    slot.insert(first);
                }
            }
        }
    }

    let mut ranked: Vec<SearchResult> = fused.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultKind;
    use quickcheck_macros::quickcheck;
    use serde_json::json;

    fn result(id: &str, score: f64, source: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            kind: ResultKind::Memory,
            score,
            content: json!({ "id": id }),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_single_list_keeps_rank_order() {
        let ranked = fuse(vec![vec![
            result("a", 0.9, "keyword"),
            result("b", 0.8, "keyword"),
            result("c", 0.7, "keyword"),
        ]]);

        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_item_in_two_modalities_outranks_single_modality() {
        // Same raw score, same rank; "both" appears in two lists
        let ranked = fuse(vec![
            vec![result("both", 0.5, "keyword"), result("only", 0.5, "keyword")],
            vec![result("both", 0.5, "semantic")],
        ]);

        assert_eq!(ranked[0].id, "both");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_original_score_added_once() {
        let ranked = fuse(vec![
            vec![result("a", 1.0, "keyword")],
            vec![result("a", 1.0, "semantic")],
        ]);

        // rank 0 in both lists plus a single weighted original score
        let expected = 1.0 / RRF_K + 1.0 / RRF_K + 1.0 * ORIGINAL_SCORE_WEIGHT;
        assert!((ranked[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_first_writer_wins_for_content_and_source() {
        let ranked = fuse(vec![
            vec![result("a", 0.4, "keyword")],
            vec![result("a", 0.9, "semantic")],
        ]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source, "keyword");
    }

    #[test]
    fn test_score_ties_break_by_id() {
        let ranked = fuse(vec![vec![
            result("b", 0.0, "keyword"),
            result("a", 0.0, "keyword"),
        ]]);
        // Different ranks, so no tie here; force one with equal positions
        // across separate lists instead.
        let tied = fuse(vec![
            vec![result("b", 0.0, "keyword")],
            vec![result("a", 0.0, "semantic")],
        ]);
        assert_eq!(tied[0].id, "a");
        assert_eq!(tied[1].id, "b");
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn test_empty_input() {
        assert!(fuse(vec![]).is_empty());
        assert!(fuse(vec![vec![], vec![], vec![]]).is_empty());
    }

    #[quickcheck]
    fn prop_fusion_invariant_under_list_order(lists: Vec<Vec<u8>>) -> bool {
        // Build modality lists with per-id deterministic raw scores so
        // reordering the lists cannot change any input rank list.
        let build = |ids: &[u8], source: &str| -> Vec<SearchResult> {
            let mut seen = std::collections::HashSet::new();
            ids.iter()
                .filter(|id| seen.insert(**id))
                .map(|id| result(&format!("item-{id}"), f64::from(*id) / 255.0, source))
                .collect()
        };

        let forward: Vec<Vec<SearchResult>> = lists
            .iter()
            .map(|ids| build(ids, "modality"))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        let forward_ids: Vec<String> = fuse(forward).into_iter().map(|r| r.id).collect();
        let backward_ids: Vec<String> = fuse(backward).into_iter().map(|r| r.id).collect();

        forward_ids == backward_ids
    }
}
