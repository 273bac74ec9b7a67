//! Query Router: deterministic healthy-source selection
//!
//! Given a requested capability, the router filters registered sources,
//! re-probes their health at call time, and picks the winner by lowest
//! declared latency, then lowest cost, then registration order. It does
//! not retry across sources unless the caller asks for fallback: a
//! failure surfacing here has already passed through self-healing once.

use crate::errors::{ErrorKind, MeshError, Result};
use crate::healing::status::overall_of;
use crate::registry::{DataSource, HealedSource, SourceRegistry};
use crate::types::{QueryOptions, QueryResponse, SystemHealth};
use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Routes capability-addressed queries to the best healthy source
pub struct Router {
    registry: SourceRegistry,
}

impl Router {
    /// Create a router over a populated registry
    pub fn new(registry: SourceRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Mutable access for late registration
    pub fn registry_mut(&mut self) -> &mut SourceRegistry {
        &mut self.registry
    }

    /// Execute an operation on the best healthy source for a capability
    ///
    /// The chosen source has already been wrapped in self-healing; if its
    /// query still fails the error is surfaced as-is, with no automatic
    /// cross-source retry.
    pub async fn route(&self, capability: &str, operation: &str, params: Value) -> Result<Value> {
        let ranked = self.ranked_candidates(capability).await?;
        let source = ranked.first().expect("ranked candidates are never empty");

        source
            .query(operation, params)
            .await
            .map_err(|err| Self::surface(err, operation))
    }

    /// Like `route`, but walks the ranked candidate list on failure
    pub async fn route_with_fallback(
        &self,
        capability: &str,
        operation: &str,
        params: Value,
    ) -> Result<Value> {
        let ranked = self.ranked_candidates(capability).await?;

        let mut last_error = None;
        for source in &ranked {
            match source.query(operation, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        source = source.name(),
                        capability,
                        error = %err,
                        "candidate failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(Self::surface(
            last_error.expect("at least one candidate was tried"),
            operation,
        ))
    }

    /// Public query surface: route and wrap the result in an envelope
    pub async fn query(
        &self,
        capability: &str,
        operation: &str,
        params: Value,
        opts: QueryOptions,
    ) -> Result<QueryResponse> {
        debug!(
            capability,
            operation,
            priority = ?opts.priority,
            freshness = ?opts.freshness,
            "routing query"
        );

        let ranked = self.ranked_candidates(capability).await?;
        let source = ranked.first().expect("ranked candidates are never empty");

        let started = Instant::now();
        let data = source
            .query(operation, params)
            .await
            .map_err(|err| Self::surface(err, operation))?;

        Ok(QueryResponse {
            data,
            source: source.name().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            cached: false,
            timestamp: Utc::now(),
        })
    }

    /// Aggregate health across all registered sources
    pub async fn system_health(&self) -> SystemHealth {
        let per_source = self.registry.probe_all().await;
        let board = self.registry.board();

        SystemHealth {
            overall: overall_of(&per_source),
            per_source,
            uptime_ms: board.uptime_ms(),
            last_incident_at: board.last_incident_at(),
        }
    }

    /// Healthy candidates for a capability, best first
    ///
    /// Health probes run at call time, never cached. Ranking is lowest
    /// declared latency, ties broken by lowest cost, further ties by
    /// registration order (the sort is stable over an insertion-ordered
    /// candidate list), so routing is deterministic.
    async fn ranked_candidates(&self, capability: &str) -> Result<Vec<Arc<HealedSource>>> {
        let candidates = self.registry.candidates(capability);

        let probes = join_all(candidates.iter().map(|s| s.health_probe())).await;

        let mut healthy: Vec<Arc<HealedSource>> = candidates
            .into_iter()
            .zip(probes)
            .filter_map(|(source, ok)| ok.then_some(source))
            .collect();

        if healthy.is_empty() {
            return Err(MeshError::NoHealthySource {
                capability: capability.to_string(),
            });
        }

        healthy.sort_by(|a, b| {
            a.estimated_latency_ms()
                .cmp(&b.estimated_latency_ms())
                .then_with(|| {
                    a.cost_per_query()
                        .partial_cmp(&b.cost_per_query())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        Ok(healthy)
    }

    /// Map a surviving backend error onto the router's error surface
    fn surface(err: crate::errors::SourceError, operation: &str) -> MeshError {
        if err.kind == ErrorKind::NotImplemented {
            MeshError::NotImplemented {
                source_name: err.source_name,
                operation: operation.to_string(),
            }
        } else {
            MeshError::Source(err)
        }
    }
}
