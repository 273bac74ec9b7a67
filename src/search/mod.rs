//! Hybrid Search Engine
//!
//! Fans a query out to three independent retrieval modalities — keyword,
//! semantic and pattern — then fuses their rankings with Reciprocal Rank
//! Fusion. A failure in one modality is isolated: it contributes an
//! empty list instead of failing the whole search.
//!
//! Components:
//! - Fusion: RRF rank aggregation with deterministic tie-breaking
//! - Entity Store: keyword/tag retrieval over normalized entities
//! - Semantic Index: cosine-similarity nearest-neighbor lookup
//! - Pattern Graph: frequency-weighted associative keyword patterns

pub mod fusion;
pub mod patterns;
pub mod semantic;
pub mod store;

pub use patterns::PatternGraph;
pub use semantic::SemanticIndex;
pub use store::EntityStore;

use crate::errors::SourceError;
use crate::types::{SearchContext, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Default number of fused results returned
const DEFAULT_LIMIT: usize = 20;

/// Keyword modality: exact/substring and tag matching
///
/// Results must be rank-ordered best first, scored `1.0 - rank/limit`.
#[async_trait]
pub trait KeywordProvider: Send + Sync {
    async fn keyword_search(
        &self,
        query: &str,
        ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError>;
}

/// Semantic modality: nearest-neighbor lookup
///
/// Scores are similarities in [0, 1]; implementations without a
/// similarity score fall back to the keyword modality's rank-based
/// scoring.
#[async_trait]
pub trait SemanticProvider: Send + Sync {
    async fn semantic_search(
        &self,
        query: &str,
        ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError>;
}

/// Pattern modality: associative patterns matched against query tokens
#[async_trait]
pub trait PatternProvider: Send + Sync {
    async fn pattern_search(
        &self,
        query: &str,
        ctx: &SearchContext,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError>;
}

/// Three-modality search with RRF fusion
///
/// Modality calls run concurrently and join before fusion; there is no
/// per-modality timeout, so a slow provider delays the join.
pub struct HybridSearchEngine {
    keyword: Arc<dyn KeywordProvider>,
    semantic: Arc<dyn SemanticProvider>,
    pattern: Arc<dyn PatternProvider>,
}

impl HybridSearchEngine {
    /// Create an engine over the three modality providers
    pub fn new(
        keyword: Arc<dyn KeywordProvider>,
        semantic: Arc<dyn SemanticProvider>,
        pattern: Arc<dyn PatternProvider>,
    ) -> Self {
        Self {
            keyword,
            semantic,
            pattern,
        }
    }

    /// Search all modalities and fuse their rankings
    ///
    /// Each modality is bounded to `limit * 2` raw candidates. Never
    /// fails: when every modality errors the result is simply empty.
    pub async fn search(&self, query: &str, ctx: &SearchContext) -> Vec<SearchResult> {
        let limit = ctx.limit.unwrap_or(DEFAULT_LIMIT);
        let raw_limit = limit * 2;

        let (keyword, semantic, pattern) = tokio::join!(
            self.keyword.keyword_search(query, ctx, raw_limit),
            self.semantic.semantic_search(query, ctx, raw_limit),
            self.pattern.pattern_search(query, ctx, raw_limit),
        );

        let mut fused = fusion::fuse(vec![
            isolate("keyword", keyword),
            isolate("semantic", semantic),
            isolate("pattern", pattern),
        ]);

        fused.truncate(limit);
        fused
    }
}

/// Swallow a modality failure, logging it and yielding an empty list
fn isolate(
    modality: &str,
    outcome: Result<Vec<SearchResult>, SourceError>,
) -> Vec<SearchResult> {
    match outcome {
        Ok(results) => results,
        Err(error) => {
            warn!(modality, %error, "search modality failed, continuing without it");
            Vec::new()
        }
    }
}
