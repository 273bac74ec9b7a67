//! Associative pattern graph
//!
//! Derives keyword patterns from observed text and matches them against
//! query tokens, weighted by how often each pattern has been seen.

use crate::errors::SourceError;
use crate::search::PatternProvider;
use crate::types::{ResultKind, SearchContext, SearchResult};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

/// A derived associative pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Anchor keyword of the pattern
    pub keyword: String,
    /// How many times this pattern has been observed
    pub frequency: f64,
    /// Keywords co-occurring with the anchor
    pub associations: BTreeSet<String>,
}

/// Frequency-weighted keyword pattern graph
pub struct PatternGraph {
    patterns: HashMap<String, Pattern>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl PatternGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            patterns: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Derive patterns from a piece of text
    ///
    /// Every extracted keyword becomes (or reinforces) a pattern; the
    /// other keywords in the same text become its associations.
    pub fn observe(&mut self, text: &str) {
        let keywords = extract_keywords(text);

        for keyword in &keywords {
            if !self.patterns.contains_key(keyword) {
                self.order.push(keyword.clone());
            }
            let pattern = self
                .patterns
                .entry(keyword.clone())
                .or_insert_with(|| Pattern {
                    keyword: keyword.clone(),
                    frequency: 0.0,
                    associations: BTreeSet::new(),
                });
            pattern.frequency += 1.0;
            pattern
                .associations
                .extend(keywords.iter().filter(|k| *k != keyword).cloned());
        }
    }

    /// Number of distinct patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the graph holds no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Look up a pattern by its anchor keyword
    pub fn get(&self, keyword: &str) -> Option<&Pattern> {
        self.patterns.get(keyword)
    }

    /// Patterns matching the query's tokens, best first
    ///
    /// Score = (matched tokens / total query tokens) * pattern frequency.
    pub fn match_query(&self, query: &str, limit: usize) -> Vec<(f64, &Pattern)> {
        let tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();

        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Pattern)> = self
            .order
            .iter()
            .filter_map(|keyword| self.patterns.get(keyword))
            .filter_map(|pattern| {
                let matched = tokens
                    .iter()
                    .filter(|t| {
                        pattern.keyword.contains(t.as_str())
                            || pattern.associations.iter().any(|a| a.contains(t.as_str()))
                    })
                    .count();
                if matched == 0 {
                    return None;
                }
                let score = (matched as f64 / tokens.len() as f64) * pattern.frequency;
                Some((score, pattern))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

impl Default for PatternGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatternProvider for PatternGraph {
    async fn pattern_search(
        &self,
        query: &str,
        _ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        let results = self
            .match_query(query, limit)
            .into_iter()
            .map(|(score, pattern)| SearchResult {
                id: format!("pattern-{}", pattern.keyword),
                kind: ResultKind::Pattern,
                score,
                content: json!({
                    "keyword": pattern.keyword,
                    "frequency": pattern.frequency,
                    "associations": pattern.associations,
                }),
                source: "pattern_graph".to_string(),
            })
            .collect();

        Ok(results)
    }
}

/// Extract keywords from text
fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    text.to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|word| word.len() > 3)
        .filter(|word| !is_stopword(word))
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

/// Check if word is a stopword
fn is_stopword(word: &str) -> bool {
    matches!(
        word,
        "this" | "that" | "these" | "those" | "with" | "from" | "have" | "been" | "were"
    )
}
