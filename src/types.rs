//! Core data types shared across the routing and search layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of underlying item a search result refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Memory,
    Document,
    Graph,
    Pattern,
}

/// Flat search result produced by a retrieval modality
///
/// The `id` is the fusion key: the same `id` reported by different
/// modalities refers to the same underlying item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub kind: ResultKind,
    pub score: f64,
    pub content: Value,
    /// Which modality produced the content
    pub source: String,
}

/// Normalized record produced by an adapter's `transform` step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier across modalities
    pub id: String,
    pub kind: ResultKind,
    /// Backend that produced this entity
    pub source: String,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl Entity {
    /// Create a minimal entity
    pub fn new(id: impl Into<String>, kind: ResultKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            title: None,
            content: None,
            tags: Vec::new(),
            metadata: Value::Null,
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the content body
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the tag list
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// All searchable text of this entity, lowercased
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        if let Some(title) = &self.title {
            text.push_str(&title.to_lowercase());
            text.push(' ');
        }
        if let Some(content) = &self.content {
            text.push_str(&content.to_lowercase());
        }
        text
    }
}

/// Query priority hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Data freshness requirement hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Stale,
    #[default]
    Normal,
    Realtime,
}

/// Options accepted on the public query surface
///
/// Hints only: routing stays deterministic regardless of priority.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub freshness: Freshness,
}

/// Response envelope for routed queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Value,
    /// Name of the source that served the query
    pub source: String,
    pub latency_ms: u64,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

/// Caller context threaded through search modalities
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    pub org_id: String,
    pub user_id: String,
    /// Maximum fused results to return (default 20)
    pub limit: Option<usize>,
}

impl SearchContext {
    /// Create a context for an org/user pair
    pub fn new(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
            limit: None,
        }
    }

    /// Cap the number of fused results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Overall system health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallHealth {
    /// No tracked service is unhealthy
    Healthy,
    /// Some tracked services are unhealthy
    Degraded,
    /// Every tracked service is unhealthy
    Critical,
}

/// Health of a single registered source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub name: String,
    pub healthy: bool,
}

/// Aggregate system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: OverallHealth,
    pub per_source: Vec<SourceHealth>,
    pub uptime_ms: u64,
    /// Last transition of any tracked service into unhealthy
    pub last_incident_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ResultKind::Memory).unwrap(), "\"memory\"");
        assert_eq!(serde_json::to_string(&ResultKind::Pattern).unwrap(), "\"pattern\"");
    }

    #[test]
    fn test_query_options_defaults() {
        let opts = QueryOptions::default();
        assert_eq!(opts.priority, Priority::Normal);
        assert_eq!(opts.freshness, Freshness::Normal);
    }

    #[test]
    fn test_entity_searchable_text() {
        let entity = Entity::new("e1", ResultKind::Document, "files")
            .with_title("Quarterly Report")
            .with_content("Revenue grew");
        let text = entity.searchable_text();
        assert!(text.contains("quarterly report"));
        assert!(text.contains("revenue grew"));
    }

    #[test]
    fn test_search_result_roundtrip() {
        let result = SearchResult {
            id: "memory-1".to_string(),
            kind: ResultKind::Memory,
            score: 0.42,
            content: json!({"title": "note"}),
            source: "keyword".to_string(),
        };
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: SearchResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, "memory-1");
        assert_eq!(decoded.kind, ResultKind::Memory);
    }
}
