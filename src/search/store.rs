//! In-memory entity store with keyword and tag lookup
//!
//! Reference implementation of the keyword modality: exact/substring
//! matching over normalized entities, scored purely by rank.

use crate::errors::SourceError;
use crate::registry::DataSourceAdapter;
use crate::search::KeywordProvider;
use crate::types::{Entity, SearchContext, SearchResult};
use async_trait::async_trait;
use serde_json::json;

/// Minimum keyword length considered for matching
const MIN_KEYWORD_LEN: usize = 2;

/// Insertion-ordered entity store
pub struct EntityStore {
    entities: Vec<Entity>,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    /// Insert an entity, replacing any existing one with the same id
    pub fn insert(&mut self, entity: Entity) {
        if let Some(existing) = self.entities.iter_mut().find(|e| e.id == entity.id) {
            *existing = entity;
        } else {
            self.entities.push(entity);
        }
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity by id
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Pull, transform and store everything an adapter currently holds
    pub async fn ingest_adapter(
        &mut self,
        adapter: &dyn DataSourceAdapter,
    ) -> Result<usize, SourceError> {
        let raw = adapter.fetch().await?;
        let entities = adapter.transform(raw);
        let count = entities.len();
        for entity in entities {
            self.insert(entity);
        }
        Ok(count)
    }

    /// Entities matching any query keyword, best match first
    ///
    /// A keyword matches when it is a substring of the entity's title or
    /// content, or equals one of its tags. Ranking is by matched-keyword
    /// count; insertion order breaks ties.
    pub fn search_keywords(&self, keywords: &[String], limit: usize) -> Vec<&Entity> {
        let keywords: Vec<String> = keywords
            .iter()
            .filter(|k| k.len() > MIN_KEYWORD_LEN)
            .map(|k| k.to_lowercase())
            .collect();

        if keywords.is_empty() {
            return Vec::new();
        }

        let mut matched: Vec<(usize, &Entity)> = self
            .entities
            .iter()
            .filter_map(|entity| {
                let text = entity.searchable_text();
                let hits = keywords
                    .iter()
                    .filter(|k| {
                        text.contains(k.as_str())
                            || entity.tags.iter().any(|t| t.eq_ignore_ascii_case(k.as_str()))
                    })
                    .count();
                (hits > 0).then_some((hits, entity))
            })
            .collect();

        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().take(limit).map(|(_, e)| e).collect()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeywordProvider for EntityStore {
    async fn keyword_search(
        &self,
        query: &str,
        _ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        let keywords: Vec<String> = query.split_whitespace().map(|w| w.to_string()).collect();

        let results = self
            .search_keywords(&keywords, limit)
            .into_iter()
            .enumerate()
            .map(|(rank, entity)| SearchResult {
                id: entity.id.clone(),
                kind: entity.kind,
                // Rank-based score, highest first
                score: 1.0 - (rank as f64 / limit as f64),
                content: json!(entity),
                source: "entity_store".to_string(),
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultKind;

    fn store_with_docs() -> EntityStore {
        let mut store = EntityStore::new();
        store.insert(
            Entity::new("doc-1", ResultKind::Document, "files")
                .with_title("Incident report")
                .with_content("A brute force attack was detected on the login endpoint")
                .with_tags(vec!["security".to_string()]),
        );
        store.insert(
            Entity::new("doc-2", ResultKind::Document, "files")
                .with_title("Lunch menu")
                .with_content("Soup of the day"),
        );
        store
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut store = store_with_docs();
        store.insert(Entity::new("doc-1", ResultKind::Memory, "notes").with_title("Replaced"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("doc-1").unwrap().title.as_deref(), Some("Replaced"));
    }

    #[test]
    fn test_keyword_substring_match() {
        let store = store_with_docs();
        let hits = store.search_keywords(&["attack".to_string()], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc-1");
    }

    #[test]
    fn test_tag_match() {
        let store = store_with_docs();
        let hits = store.search_keywords(&["security".to_string()], 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_short_keywords_ignored() {
        let store = store_with_docs();
        assert!(store.search_keywords(&["of".to_string()], 10).is_empty());
    }

    #[test]
    fn test_more_matches_rank_higher() {
        let store = store_with_docs();
        let hits = store.search_keywords(
            &["brute".to_string(), "force".to_string(), "soup".to_string()],
            10,
        );
        assert_eq!(hits[0].id, "doc-1");
        assert_eq!(hits[1].id, "doc-2");
    }

    #[tokio::test]
    async fn test_keyword_search_scores_by_rank() {
        let store = store_with_docs();
        let ctx = SearchContext::new("org", "user");
        let results = store
            .keyword_search("brute force soup", &ctx, 10)
            .await
            .unwrap();

        assert_eq!(results[0].id, "doc-1");
        assert!((results[0].score - 1.0).abs() < 1e-9);
        assert!((results[1].score - 0.9).abs() < 1e-9);
    }
}
