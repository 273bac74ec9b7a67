//! In-memory semantic index
//!
//! Nearest-neighbor lookup over bag-of-tokens hashing vectors with
//! cosine similarity. This is deterministic bookkeeping, not a learned
//! embedding model; the vector dimension is intentionally small.

use crate::errors::SourceError;
use crate::search::SemanticProvider;
use crate::types::{ResultKind, SearchContext, SearchResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hashing-vector dimension
const EMBEDDING_DIM: usize = 64;

/// A document indexed with its hashing vector
#[derive(Debug, Clone)]
struct IndexedDoc {
    id: String,
    kind: ResultKind,
    content: Value,
    vector: Vec<f64>,
}

/// Cosine-similarity index over stored documents
pub struct SemanticIndex {
    docs: Vec<IndexedDoc>,
}

impl SemanticIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self { docs: Vec::new() }
    }

    /// Index a document's text under an id
    pub fn insert(&mut self, id: impl Into<String>, kind: ResultKind, text: &str, content: Value) {
        let doc = IndexedDoc {
            id: id.into(),
            kind,
            content,
            vector: embed(text),
        };
        if let Some(existing) = self.docs.iter_mut().find(|d| d.id == doc.id) {
            *existing = doc;
        } else {
            self.docs.push(doc);
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents nearest to the query, with similarity in [0, 1]
    pub fn nearest(&self, query: &str, limit: usize) -> Vec<(f64, &str, ResultKind, &Value)> {
        let query_vector = embed(query);
        if query_vector.iter().all(|v| *v == 0.0) {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &IndexedDoc)> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let similarity = cosine(&query_vector, &doc.vector);
                (similarity > 0.0).then_some((similarity, doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(sim, doc)| (sim, doc.id.as_str(), doc.kind, &doc.content))
            .collect()
    }
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticProvider for SemanticIndex {
    async fn semantic_search(
        &self,
        query: &str,
        _ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        let results = self
            .nearest(query, limit)
            .into_iter()
            .map(|(similarity, id, kind, content)| SearchResult {
                id: id.to_string(),
                kind,
                score: similarity,
                content: content.clone(),
                source: "semantic_index".to_string(),
            })
            .collect();

        Ok(results)
    }
}

/// Map text onto a fixed-dimension token-count vector, L2-normalized
fn embed(text: &str) -> Vec<f64> {
    let mut vector = vec![0.0f64; EMBEDDING_DIM];

    for token in tokenize(text) {
        let bucket = (hash_token(&token) as usize) % EMBEDDING_DIM;
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

/// Cosine similarity of two normalized vectors
///
/// Token-count vectors are nonnegative, so the result lies in [0, 1].
fn cosine(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.to_lowercase()
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .into_iter()
}

fn hash_token(token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index_with_docs() -> SemanticIndex {
        let mut index = SemanticIndex::new();
        index.insert(
            "sec-1",
            ResultKind::Memory,
            "brute force attack detection on authentication endpoints",
            json!({"title": "attack note"}),
        );
        index.insert(
            "misc-1",
            ResultKind::Memory,
            "quarterly budget planning meeting notes",
            json!({"title": "budget"}),
        );
        index
    }

    #[test]
    fn test_identical_text_has_similarity_one() {
        let index = index_with_docs();
        let hits = index.nearest("quarterly budget planning meeting notes", 10);
        assert!((hits[0].0 - 1.0).abs() < 1e-9);
        assert_eq!(hits[0].1, "misc-1");
    }

    #[test]
    fn test_related_text_ranks_above_unrelated() {
        let index = index_with_docs();
        let hits = index.nearest("attack detection", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].1, "sec-1");
    }

    #[test]
    fn test_similarity_bounded() {
        let index = index_with_docs();
        for (similarity, _, _, _) in index.nearest("attack budget notes", 10) {
            assert!((0.0..=1.0 + 1e-9).contains(&similarity));
        }
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let index = index_with_docs();
        assert!(index.nearest("", 10).is_empty());
        assert!(index.nearest("a an", 10).is_empty());
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut index = index_with_docs();
        index.insert("sec-1", ResultKind::Document, "completely new text", json!({}));
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_semantic_search_scores_are_similarities() {
        let index = index_with_docs();
        let ctx = SearchContext::new("org", "user");
        let results = index
            .semantic_search("brute force attack", &ctx, 10)
            .await
            .unwrap();

        assert_eq!(results[0].id, "sec-1");
        assert!(results[0].score > 0.0 && results[0].score <= 1.0);
    }
}
