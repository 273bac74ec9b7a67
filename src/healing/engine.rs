//! Self-healing engine with a bounded reentrancy guard
//!
//! Intercepts classified backend failures, executes the registered
//! recovery strategy for the error kind, and records every outcome to
//! the failure ledger. A recovery action that itself fails must never
//! trigger another healing attempt: the depth counter is checked before
//! any attempt and released on every exit path.

use crate::config::HealingConfig;
use crate::errors::{ErrorKind, MeshError, Result, SourceError};
use crate::healing::types::{RecoveryFn, RecoveryStrategy};
use crate::ledger::{Failure, FailureLedger};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// Reentrancy limit: one healing attempt may be in flight at a time
const MAX_DEPTH: usize = 1;

/// Learned recovery paths above this success rate are surfaced
const LEARNED_PATH_THRESHOLD: f64 = 0.7;

/// RAII slot on the healing depth counter
///
/// Acquired after the guard check passes; released on drop so the
/// counter cannot drift even when a strategy panics mid-flight.
struct DepthSlot<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> DepthSlot<'a> {
    fn acquire(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self { depth }
    }
}

impl Drop for DepthSlot<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Recursion-safe healing circuit around backend calls
pub struct SelfHealing {
    strategies: Mutex<HashMap<ErrorKind, RecoveryStrategy>>,
    depth: AtomicUsize,
    ledger: Arc<Mutex<FailureLedger>>,
}

impl SelfHealing {
    /// Create an engine seeded with the default strategy table
    pub fn new(ledger: Arc<Mutex<FailureLedger>>) -> Self {
        Self::with_config(ledger, &HealingConfig::default())
    }

    /// Create an engine with a custom delay table
    pub fn with_config(ledger: Arc<Mutex<FailureLedger>>, config: &HealingConfig) -> Self {
        let engine = Self {
            strategies: Mutex::new(HashMap::new()),
            depth: AtomicUsize::new(0),
            ledger,
        };
        engine.seed_default_strategies(config);
        engine
    }

    /// Register a strategy for an error kind, replacing any existing one
    pub fn register_strategy(
        &self,
        kind: ErrorKind,
        description: impl Into<String>,
        action: RecoveryFn,
    ) {
        let strategy = RecoveryStrategy::new(kind, description, action);
        info!(kind = kind.as_str(), description = %strategy.description, "healing strategy registered");
        self.strategies.lock().unwrap().insert(kind, strategy);
    }

    /// Number of registered strategies
    pub fn strategy_count(&self) -> usize {
        self.strategies.lock().unwrap().len()
    }

    /// Current healing depth (0 when idle)
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// The ledger this engine records to
    pub fn ledger(&self) -> Arc<Mutex<FailureLedger>> {
        Arc::clone(&self.ledger)
    }

    /// Attempt to heal a classified backend failure
    ///
    /// Returns `true` when a strategy existed and reported the condition
    /// absorbed. Returns `false` when the reentrancy guard fired, no
    /// strategy matched, or the strategy itself reported failure.
    pub async fn attempt_healing(&self, error: &SourceError, context: &str) -> bool {
        self.try_healing(error, context).await.unwrap_or(false)
    }

    /// Like `attempt_healing`, but a fired reentrancy guard surfaces as
    /// a typed `HealingLoop` error instead of a bare `false`
    ///
    /// Every path except the guard records a `Failure` to the ledger.
    pub async fn try_healing(&self, error: &SourceError, context: &str) -> Result<bool> {
        // Reentrancy guard: a strategy that raises its own failure must
        // not re-enter healing and loop indefinitely.
        if self.depth.load(Ordering::SeqCst) >= MAX_DEPTH {
            error!(
                context,
                source = %error.source_name,
                original_error = %error.message,
                "recursive healing loop detected, breaking out"
            );
            return Err(MeshError::HealingLoop {
                context: context.to_string(),
            });
        }

        let _slot = DepthSlot::acquire(&self.depth);

        let kind = error.kind;
        warn!(
            kind = kind.as_str(),
            context,
            source = %error.source_name,
            "self-healing triggered"
        );

        // Surface a learned path with a strong track record before
        // running the table strategy.
        if let Some(path) = self.best_learned_path(&error.source_name, kind) {
            info!(
                action = %path.action,
                success_rate = path.success_rate,
                "learned recovery path available"
            );
        }

        let strategy = self.strategies.lock().unwrap().get(&kind).cloned();

        let Some(strategy) = strategy else {
            error!(kind = kind.as_str(), "no healing strategy found, escalating");
            self.record_failure(error, context, None);
            return Ok(false);
        };

        info!(strategy = %strategy.description, "executing healing strategy");
        let started = Instant::now();
        let success = (strategy.action)().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.record_failure(
            error,
            context,
            Some((strategy.description.as_str(), success, elapsed_ms)),
        );

        if success {
            info!(kind = kind.as_str(), elapsed_ms, "healed successfully");
        } else {
            warn!(kind = kind.as_str(), "strategy executed but failed to resolve");
        }

        Ok(success)
    }

    /// Default strategies for transient backend conditions
    ///
    /// "Success" here means the wait was absorbed; the caller is
    /// expected to retry the original operation afterward.
    fn seed_default_strategies(&self, config: &HealingConfig) {
        let table = [
            (
                ErrorKind::ConnectionReset,
                "Wait and Retry Connection",
                config.connection_reset_delay_ms,
            ),
            (ErrorKind::Timeout, "Quick Retry", config.timeout_delay_ms),
            (
                ErrorKind::ServiceUnavailable,
                "Backend Reconnect Backoff",
                config.unavailable_delay_ms,
            ),
            (
                ErrorKind::RateLimited,
                "Throttle Cooldown",
                config.rate_limit_delay_ms,
            ),
        ];

        let mut strategies = self.strategies.lock().unwrap();
        for (kind, description, delay_ms) in table {
            strategies.insert(kind, RecoveryStrategy::fixed_delay(kind, description, delay_ms));
        }
    }

    fn best_learned_path(
        &self,
        source_name: &str,
        kind: ErrorKind,
    ) -> Option<crate::ledger::RecoveryPath> {
        let ledger = self.ledger.lock().unwrap();
        ledger
            .recovery_paths(source_name, kind)
            .into_iter()
            .next()
            .filter(|path| path.success_rate > LEARNED_PATH_THRESHOLD)
    }

    fn record_failure(
        &self,
        error: &SourceError,
        context: &str,
        recovery: Option<(&str, bool, u64)>,
    ) {
        let mut failure = Failure::new(error.source_name.clone(), error.kind, error.message.clone())
            .with_error_context(error.context_value())
            .with_query_context(json!({ "context": context }));

        if let Some((action, success, elapsed_ms)) = recovery {
            failure = failure.with_recovery(action, success, elapsed_ms);
        }

        self.ledger.lock().unwrap().record(failure);
    }
}
