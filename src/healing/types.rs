//! Healing strategy types

use crate::errors::ErrorKind;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Async remedial action
///
/// Returns `true` when the action absorbed the condition. For delay-based
/// strategies this means "the wait completed", not that the backend is
/// confirmed healthy; the caller is expected to retry the original
/// operation afterward.
pub type RecoveryFn = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// A registered remedial action for one classified error kind
///
/// Strategies are registered once at startup and live for the process
/// lifetime; new ones may be added, none removed.
#[derive(Clone)]
pub struct RecoveryStrategy {
    pub kind: ErrorKind,
    pub description: String,
    pub action: RecoveryFn,
}

impl RecoveryStrategy {
    /// Create a strategy from an arbitrary async action
    pub fn new(kind: ErrorKind, description: impl Into<String>, action: RecoveryFn) -> Self {
        Self {
            kind,
            description: description.into(),
            action,
        }
    }

    /// Fixed-delay strategy: wait, then report the condition absorbed
    pub fn fixed_delay(kind: ErrorKind, description: impl Into<String>, delay_ms: u64) -> Self {
        let action: RecoveryFn = Arc::new(move || {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                true
            })
        });
        Self::new(kind, description, action)
    }
}

impl fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryStrategy")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish()
    }
}
