//! Source Registry: named, capability-tagged backends behind healing
//!
//! Every registered source has its `query` and `health_probe` wrapped by
//! the self-healing circuit before being exposed, so a failing backend
//! call always passes through healing before the failure surfaces to the
//! router. Registration order is preserved; it is the final routing
//! tie-break.

use crate::errors::{ErrorKind, MeshError, Result, SourceError};
use crate::healing::{SelfHealing, ServiceBoard};
use crate::types::{Entity, SourceHealth};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// A queryable backend with declared capabilities and cost profile
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Immutable identity of this source
    fn name(&self) -> &str;

    /// Capability strings this source serves (exact, `domain.*`, or `*`)
    fn capabilities(&self) -> &[String];

    /// Declared typical latency, used for routing
    fn estimated_latency_ms(&self) -> u64;

    /// Declared per-query cost, used as the first routing tie-break
    fn cost_per_query(&self) -> f64;

    /// Live health check; results are never cached
    async fn health_probe(&self) -> bool;

    /// Execute an operation against the backend
    async fn query(&self, operation: &str, params: Value) -> std::result::Result<Value, SourceError>;
}

/// Contract implemented by every concrete backend adapter
///
/// Graph stores, vector stores, mail/file adapters and tool-call
/// backends all normalize through this seam.
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Whether the backing service is reachable right now
    async fn is_available(&self) -> bool;

    /// Pull the backend-specific raw payload
    async fn fetch(&self) -> std::result::Result<Vec<Value>, SourceError>;

    /// Normalize raw payloads into entities
    fn transform(&self, raw: Vec<Value>) -> Vec<Entity>;

    /// Execute a registry-routed operation
    async fn query(&self, operation: &str, params: Value) -> std::result::Result<Value, SourceError>;
}

/// Whether a declared capability matches a requested one
///
/// Honors `domain.*` namespace wildcards and the global `*`.
pub fn capability_matches(declared: &str, requested: &str) -> bool {
    if declared == "*" || declared == requested {
        return true;
    }
    if let Some(namespace) = declared.strip_suffix(".*") {
        return requested.split('.').next() == Some(namespace);
    }
    false
}

/// A registered source wrapped in the self-healing circuit
///
/// On a failed query the wrapper attempts healing once; when the
/// strategy absorbs the condition the original call is retried a single
/// time. A failed probe likewise passes through healing before being
/// reported, and every probe result lands on the shared health board.
pub struct HealedSource {
    inner: Arc<dyn DataSource>,
    healing: Arc<SelfHealing>,
    board: Arc<ServiceBoard>,
}

impl HealedSource {
    fn new(inner: Arc<dyn DataSource>, healing: Arc<SelfHealing>, board: Arc<ServiceBoard>) -> Self {
        Self {
            inner,
            healing,
            board,
        }
    }
}

#[async_trait]
impl DataSource for HealedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> &[String] {
        self.inner.capabilities()
    }

    fn estimated_latency_ms(&self) -> u64 {
        self.inner.estimated_latency_ms()
    }

    fn cost_per_query(&self) -> f64 {
        self.inner.cost_per_query()
    }

    async fn health_probe(&self) -> bool {
        let mut healthy = self.inner.health_probe().await;

        if !healthy {
            let error = SourceError::new(
                self.name(),
                ErrorKind::ServiceUnavailable,
                "health probe failed",
            );
            let context = format!("{}::health_probe", self.name());
            if self.healing.attempt_healing(&error, &context).await {
                healthy = self.inner.health_probe().await;
            }
        }

        self.board.set_status(self.name(), healthy);
        healthy
    }

    async fn query(&self, operation: &str, params: Value) -> std::result::Result<Value, SourceError> {
        match self.inner.query(operation, params.clone()).await {
            Ok(value) => Ok(value),
            Err(error) => {
                let context = format!("{}::{}", self.name(), operation);
                if self.healing.attempt_healing(&error, &context).await {
                    // The transient condition was absorbed; retry the
                    // original operation once.
                    self.inner.query(operation, params).await
                } else {
                    Err(error)
                }
            }
        }
    }
}

/// Insertion-ordered registry of healing-wrapped sources
pub struct SourceRegistry {
    sources: Vec<Arc<HealedSource>>,
    healing: Arc<SelfHealing>,
    board: Arc<ServiceBoard>,
}

impl SourceRegistry {
    /// Create a registry that wraps sources with the given healing engine
    pub fn new(healing: Arc<SelfHealing>) -> Self {
        Self {
            sources: Vec::new(),
            healing,
            board: Arc::new(ServiceBoard::new()),
        }
    }

    /// Register a source under its unique name
    pub fn register_source(&mut self, source: Arc<dyn DataSource>) -> Result<()> {
        if self.sources.iter().any(|s| s.name() == source.name()) {
            return Err(MeshError::DuplicateSource {
                name: source.name().to_string(),
            });
        }

        let wrapped = HealedSource::new(
            source,
            Arc::clone(&self.healing),
            Arc::clone(&self.board),
        );
        self.sources.push(Arc::new(wrapped));
        Ok(())
    }

    /// Register a backend adapter as a queryable source
    pub fn register_adapter(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn DataSourceAdapter>,
        capabilities: Vec<String>,
        estimated_latency_ms: u64,
        cost_per_query: f64,
    ) -> Result<()> {
        let source = AdapterSource {
            name: name.into(),
            capabilities,
            estimated_latency_ms,
            cost_per_query,
            adapter,
        };
        self.register_source(Arc::new(source))
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Look up a source by name
    pub fn get(&self, name: &str) -> Option<Arc<HealedSource>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    /// All sources in registration order
    pub fn sources(&self) -> &[Arc<HealedSource>] {
        &self.sources
    }

    /// Sources declaring the capability, in registration order
    pub fn candidates(&self, capability: &str) -> Vec<Arc<HealedSource>> {
        self.sources
            .iter()
            .filter(|s| {
                s.capabilities()
                    .iter()
                    .any(|declared| capability_matches(declared, capability))
            })
            .cloned()
            .collect()
    }

    /// Probe every source concurrently, in registration order
    ///
    /// Probes are live (uncached) and results land on the health board.
    pub async fn probe_all(&self) -> Vec<SourceHealth> {
        let probes = join_all(self.sources.iter().map(|s| s.health_probe())).await;

        self.sources
            .iter()
            .zip(probes)
            .map(|(source, healthy)| {
                if !healthy {
                    warn!(source = source.name(), "source failed health probe");
                }
                SourceHealth {
                    name: source.name().to_string(),
                    healthy,
                }
            })
            .collect()
    }

    /// The shared health board updated by wrapped probes
    pub fn board(&self) -> Arc<ServiceBoard> {
        Arc::clone(&self.board)
    }
}

/// Adapter-backed source registered through `register_adapter`
struct AdapterSource {
    name: String,
    capabilities: Vec<String>,
    estimated_latency_ms: u64,
    cost_per_query: f64,
    adapter: Arc<dyn DataSourceAdapter>,
}

#[async_trait]
impl DataSource for AdapterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn estimated_latency_ms(&self) -> u64 {
        self.estimated_latency_ms
    }

    fn cost_per_query(&self) -> f64 {
        self.cost_per_query
    }

    async fn health_probe(&self) -> bool {
        self.adapter.is_available().await
    }

    async fn query(&self, operation: &str, params: Value) -> std::result::Result<Value, SourceError> {
        self.adapter.query(operation, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FailureLedger;
    use std::sync::Mutex;

    fn registry() -> SourceRegistry {
        let ledger = Arc::new(Mutex::new(FailureLedger::new()));
        SourceRegistry::new(Arc::new(SelfHealing::new(ledger)))
    }

    struct StaticSource {
        name: String,
        capabilities: Vec<String>,
    }

    #[async_trait]
    impl DataSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> &[String] {
            &self.capabilities
        }

        fn estimated_latency_ms(&self) -> u64 {
            10
        }

        fn cost_per_query(&self) -> f64 {
            0.0
        }

        async fn health_probe(&self) -> bool {
            true
        }

        async fn query(&self, _operation: &str, _params: Value) -> std::result::Result<Value, SourceError> {
            Ok(Value::Null)
        }
    }

    fn static_source(name: &str, capabilities: &[&str]) -> Arc<dyn DataSource> {
        Arc::new(StaticSource {
            name: name.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        })
    }

    #[test]
    fn test_capability_exact_match() {
        assert!(capability_matches("memory.read", "memory.read"));
        assert!(!capability_matches("memory.read", "memory.write"));
    }

    #[test]
    fn test_capability_namespace_wildcard() {
        assert!(capability_matches("memory.*", "memory.read"));
        assert!(capability_matches("memory.*", "memory.write"));
        assert!(!capability_matches("memory.*", "email.search"));
    }

    #[test]
    fn test_capability_global_wildcard() {
        assert!(capability_matches("*", "anything.at.all"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = registry();
        registry
            .register_source(static_source("db", &["memory.read"]))
            .unwrap();
        let err = registry
            .register_source(static_source("db", &["email.search"]))
            .unwrap_err();
        assert!(matches!(err, MeshError::DuplicateSource { .. }));
    }

    #[test]
    fn test_candidates_preserve_registration_order() {
        let mut registry = registry();
        registry
            .register_source(static_source("first", &["memory.*"]))
            .unwrap();
        registry
            .register_source(static_source("second", &["memory.read"]))
            .unwrap();
        registry
            .register_source(static_source("other", &["email.search"]))
            .unwrap();

        let candidates = registry.candidates("memory.read");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name(), "first");
        assert_eq!(candidates[1].name(), "second");
    }

    #[tokio::test]
    async fn test_probe_all_updates_board() {
        let mut registry = registry();
        registry
            .register_source(static_source("db", &["memory.read"]))
            .unwrap();

        let health = registry.probe_all().await;
        assert_eq!(health.len(), 1);
        assert!(health[0].healthy);
        assert_eq!(registry.board().is_healthy("db"), Some(true));
    }
}
