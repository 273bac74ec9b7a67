//! Failure Ledger: capped history of failures and recovery outcomes
//!
//! Append-only bookkeeping consumed by the self-healing layer. Grouping
//! entries by recovery action yields a per-(source, kind) track record,
//! so healing improves as outcomes accumulate. No operation here fails;
//! absence is represented by empty collections or `None`.

use crate::errors::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Maximum retained failures before oldest entries are evicted
pub const DEFAULT_CAPACITY: usize = 5000;

/// Matching entries within the window needed to call a failure recurring
const RECURRENCE_THRESHOLD: usize = 3;

/// Trailing window for aggregate statistics
const STATS_WINDOW_DAYS: i64 = 7;

/// A single recorded failure and its recovery outcome
///
/// Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub id: Uuid,
    pub source_name: String,
    pub error_kind: ErrorKind,
    pub message: String,
    /// Structured context extracted from the error (code, status)
    pub error_context: Value,
    /// What the caller was doing when the failure occurred
    pub query_context: Value,
    /// Description of the recovery action attempted, if any
    pub recovery_action: Option<String>,
    pub recovery_success: Option<bool>,
    pub recovery_time_ms: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

impl Failure {
    /// Create a failure record with no recovery attempt attached
    pub fn new(
        source_name: impl Into<String>,
        error_kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: source_name.into(),
            error_kind,
            message: message.into(),
            error_context: Value::Null,
            query_context: Value::Null,
            recovery_action: None,
            recovery_success: None,
            recovery_time_ms: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attach structured error context
    pub fn with_error_context(mut self, context: Value) -> Self {
        self.error_context = context;
        self
    }

    /// Attach the query context active when the failure occurred
    pub fn with_query_context(mut self, context: Value) -> Self {
        self.query_context = context;
        self
    }

    /// Attach a recovery attempt and its outcome
    pub fn with_recovery(mut self, action: impl Into<String>, success: bool, elapsed_ms: u64) -> Self {
        self.recovery_action = Some(action.into());
        self.recovery_success = Some(success);
        self.recovery_time_ms = Some(elapsed_ms);
        self
    }

    /// Override the occurrence timestamp (used when backfilling history)
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Aggregated track record of one recovery action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPath {
    pub action: String,
    /// Successes over occurrences, in [0, 1]
    pub success_rate: f64,
    /// Mean recovery time over entries that recorded a timing
    pub average_recovery_time_ms: f64,
    pub occurrences: usize,
}

/// Failure statistics over the trailing seven days
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureStats {
    pub total_failures: usize,
    pub unique_error_kinds: usize,
    /// Success rate among attempts that had a recovery action
    pub recovery_success_rate: f64,
    /// Mean recovery time over successful recoveries with a timing
    pub average_recovery_time_ms: f64,
}

/// In-memory failure ledger with oldest-first eviction
pub struct FailureLedger {
    /// Most recent entry at the front
    entries: VecDeque<Failure>,
    capacity: usize,
}

impl FailureLedger {
    /// Create a ledger with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a ledger with a custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Record a failure, evicting the oldest entry when over capacity
    pub fn record(&mut self, failure: Failure) {
        self.entries.push_front(failure);
        self.entries.truncate(self.capacity);
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most-recent-first failure history for a source
    pub fn history(&self, source_name: &str, limit: usize) -> Vec<Failure> {
        self.entries
            .iter()
            .filter(|f| f.source_name == source_name)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Recovery actions attempted for this (source, kind), best first
    ///
    /// Groups matching entries with a recorded action, computes each
    /// action's success rate and mean recovery time, and sorts by
    /// success rate descending.
    pub fn recovery_paths(&self, source_name: &str, error_kind: ErrorKind) -> Vec<RecoveryPath> {
        struct Tally {
            occurrences: usize,
            successes: usize,
            time_sum: u64,
            timed: usize,
        }

        let mut groups: HashMap<&str, Tally> = HashMap::new();

        for failure in self.matching(source_name, error_kind) {
            let Some(action) = failure.recovery_action.as_deref() else {
                continue;
            };
            let tally = groups.entry(action).or_insert(Tally {
                occurrences: 0,
                successes: 0,
                time_sum: 0,
                timed: 0,
            });
            tally.occurrences += 1;
            if failure.recovery_success == Some(true) {
                tally.successes += 1;
            }
            if let Some(ms) = failure.recovery_time_ms {
                tally.time_sum += ms;
                tally.timed += 1;
            }
        }

        let mut paths: Vec<RecoveryPath> = groups
            .into_iter()
            .map(|(action, tally)| RecoveryPath {
                action: action.to_string(),
                success_rate: tally.successes as f64 / tally.occurrences as f64,
                average_recovery_time_ms: if tally.timed > 0 {
                    tally.time_sum as f64 / tally.timed as f64
                } else {
                    0.0
                },
                occurrences: tally.occurrences,
            })
            .collect();

        paths.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
        });

        paths
    }

    /// Most recent successful recovery for this (source, kind)
    ///
    /// Returns a synthetic single-occurrence path, or `None` if no
    /// recovery ever succeeded.
    pub fn last_successful_recovery(
        &self,
        source_name: &str,
        error_kind: ErrorKind,
    ) -> Option<RecoveryPath> {
        self.matching(source_name, error_kind)
            .find(|f| f.recovery_success == Some(true) && f.recovery_action.is_some())
            .map(|f| RecoveryPath {
                action: f.recovery_action.clone().unwrap_or_default(),
                success_rate: 1.0,
                average_recovery_time_ms: f.recovery_time_ms.unwrap_or(0) as f64,
                occurrences: 1,
            })
    }

    /// Whether this (source, kind) failed at least three times in the window
    pub fn is_recurring(&self, source_name: &str, error_kind: ErrorKind, within_minutes: i64) -> bool {
        let cutoff = Utc::now() - Duration::minutes(within_minutes);
        let count = self
            .matching(source_name, error_kind)
            .filter(|f| f.occurred_at > cutoff)
            .count();
        count >= RECURRENCE_THRESHOLD
    }

    /// Aggregate statistics for a source over the trailing seven days
    pub fn stats(&self, source_name: &str) -> FailureStats {
        let cutoff = Utc::now() - Duration::days(STATS_WINDOW_DAYS);

        let mut total = 0usize;
        let mut kinds: HashSet<ErrorKind> = HashSet::new();
        let mut attempts = 0usize;
        let mut successes = 0usize;
        let mut time_sum = 0u64;
        let mut timed = 0usize;

        for failure in self
            .entries
            .iter()
            .filter(|f| f.source_name == source_name && f.occurred_at > cutoff)
        {
            total += 1;
            kinds.insert(failure.error_kind);
            if failure.recovery_action.is_some() {
                attempts += 1;
                if failure.recovery_success == Some(true) {
                    successes += 1;
                    if let Some(ms) = failure.recovery_time_ms {
                        time_sum += ms;
                        timed += 1;
                    }
                }
            }
        }

        FailureStats {
            total_failures: total,
            unique_error_kinds: kinds.len(),
            recovery_success_rate: if attempts > 0 {
                successes as f64 / attempts as f64
            } else {
                0.0
            },
            average_recovery_time_ms: if timed > 0 {
                time_sum as f64 / timed as f64
            } else {
                0.0
            },
        }
    }

    fn matching<'a>(
        &'a self,
        source_name: &'a str,
        error_kind: ErrorKind,
    ) -> impl Iterator<Item = &'a Failure> {
        self.entries
            .iter()
            .filter(move |f| f.source_name == source_name && f.error_kind == error_kind)
    }
}

impl Default for FailureLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_failure(source: &str) -> Failure {
        Failure::new(source, ErrorKind::ConnectionReset, "connection reset by peer")
    }

    #[test]
    fn test_record_then_history_returns_entry() {
        let mut ledger = FailureLedger::new();
        let failure = reset_failure("neo4j");
        let id = failure.id;

        ledger.record(failure);

        let history = ledger.history("neo4j", 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let mut ledger = FailureLedger::new();
        ledger.record(Failure::new("db", ErrorKind::Timeout, "first"));
        ledger.record(Failure::new("db", ErrorKind::Timeout, "second"));

        let history = ledger.history("db", 10);
        assert_eq!(history[0].message, "second");
        assert_eq!(history[1].message, "first");
    }

    #[test]
    fn test_history_filters_by_source() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j"));
        ledger.record(reset_failure("postgres"));

        assert_eq!(ledger.history("neo4j", 10).len(), 1);
        assert_eq!(ledger.history("elastic", 10).len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut ledger = FailureLedger::with_capacity(3);
        for i in 0..4 {
            ledger.record(Failure::new("db", ErrorKind::Timeout, format!("failure {}", i)));
        }

        assert_eq!(ledger.len(), 3);
        let history = ledger.history("db", 10);
        assert!(history.iter().all(|f| f.message != "failure 0"));
        assert_eq!(history[0].message, "failure 3");
    }

    #[test]
    fn test_default_capacity_holds_5000() {
        let mut ledger = FailureLedger::new();
        for i in 0..5001 {
            ledger.record(Failure::new("db", ErrorKind::Timeout, format!("failure {}", i)));
        }

        assert_eq!(ledger.len(), 5000);
        // The very first entry is the one evicted
        assert!(ledger
            .history("db", 5000)
            .iter()
            .all(|f| f.message != "failure 0"));
    }

    #[test]
    fn test_is_recurring_needs_three_matches() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j"));
        ledger.record(reset_failure("neo4j"));
        assert!(!ledger.is_recurring("neo4j", ErrorKind::ConnectionReset, 60));

        ledger.record(reset_failure("neo4j"));
        assert!(ledger.is_recurring("neo4j", ErrorKind::ConnectionReset, 60));
    }

    #[test]
    fn test_is_recurring_ignores_entries_outside_window() {
        let mut ledger = FailureLedger::new();
        for _ in 0..3 {
            ledger.record(
                reset_failure("neo4j").with_occurred_at(Utc::now() - Duration::minutes(90)),
            );
        }
        assert!(!ledger.is_recurring("neo4j", ErrorKind::ConnectionReset, 60));
    }

    #[test]
    fn test_recurring_burst_scenario() {
        // 15 consecutive connection resets within 10 minutes
        let mut ledger = FailureLedger::new();
        for i in 0..15 {
            ledger.record(
                reset_failure("neo4j")
                    .with_occurred_at(Utc::now() - Duration::seconds(i * 30)),
            );
        }

        assert!(ledger.is_recurring("neo4j", ErrorKind::ConnectionReset, 60));
        assert_eq!(ledger.stats("neo4j").unique_error_kinds, 1);
        assert_eq!(ledger.stats("neo4j").total_failures, 15);
    }

    #[test]
    fn test_recovery_paths_sorted_by_success_rate() {
        let mut ledger = FailureLedger::new();
        // "reconnect" succeeds twice, fails once; "wait" fails twice
        ledger.record(reset_failure("neo4j").with_recovery("reconnect", true, 100));
        ledger.record(reset_failure("neo4j").with_recovery("reconnect", true, 200));
        ledger.record(reset_failure("neo4j").with_recovery("reconnect", false, 50));
        ledger.record(reset_failure("neo4j").with_recovery("wait", false, 10));
        ledger.record(reset_failure("neo4j").with_recovery("wait", false, 10));

        let paths = ledger.recovery_paths("neo4j", ErrorKind::ConnectionReset);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].action, "reconnect");
        assert!((paths[0].success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(paths[0].occurrences, 3);
        assert!((paths[0].average_recovery_time_ms - 350.0 / 3.0).abs() < 1e-9);
        assert_eq!(paths[1].action, "wait");
        assert_eq!(paths[1].success_rate, 0.0);
    }

    #[test]
    fn test_recovery_paths_skip_entries_without_action() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j"));
        assert!(ledger.recovery_paths("neo4j", ErrorKind::ConnectionReset).is_empty());
    }

    #[test]
    fn test_last_successful_recovery_is_synthetic_path() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j").with_recovery("reconnect", true, 150));
        ledger.record(reset_failure("neo4j").with_recovery("wait", false, 10));

        let path = ledger
            .last_successful_recovery("neo4j", ErrorKind::ConnectionReset)
            .unwrap();
        assert_eq!(path.action, "reconnect");
        assert_eq!(path.success_rate, 1.0);
        assert_eq!(path.occurrences, 1);
        assert_eq!(path.average_recovery_time_ms, 150.0);
    }

    #[test]
    fn test_last_successful_recovery_none_without_success() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j").with_recovery("wait", false, 10));
        assert!(ledger
            .last_successful_recovery("neo4j", ErrorKind::ConnectionReset)
            .is_none());
    }

    #[test]
    fn test_stats_over_trailing_window() {
        let mut ledger = FailureLedger::new();
        ledger.record(reset_failure("neo4j").with_recovery("reconnect", true, 100));
        ledger.record(Failure::new("neo4j", ErrorKind::Timeout, "slow"));
        // Older than seven days, excluded
        ledger.record(
            Failure::new("neo4j", ErrorKind::RateLimited, "throttled")
                .with_occurred_at(Utc::now() - Duration::days(8)),
        );

        let stats = ledger.stats("neo4j");
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.unique_error_kinds, 2);
        assert_eq!(stats.recovery_success_rate, 1.0);
        assert_eq!(stats.average_recovery_time_ms, 100.0);
    }

    #[test]
    fn test_stats_empty_source() {
        let ledger = FailureLedger::new();
        let stats = ledger.stats("unknown");
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.recovery_success_rate, 0.0);
    }
}
