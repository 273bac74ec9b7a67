//! Aggregate service health board
//!
//! Tracks named sub-services and derives an overall health state:
//! HEALTHY when none are unhealthy, CRITICAL when all are, DEGRADED
//! otherwise. Also exposes process uptime and the last transition of
//! any service into unhealthy.

use crate::types::{OverallHealth, SourceHealth, SystemHealth};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Status of one tracked sub-service
#[derive(Debug, Clone)]
struct ServiceStatus {
    healthy: bool,
    last_check: DateTime<Utc>,
}

/// Shared health board for named sub-services
pub struct ServiceBoard {
    started: Instant,
    inner: Mutex<BoardInner>,
}

struct BoardInner {
    /// Insertion-ordered service names for stable reporting
    order: Vec<String>,
    services: HashMap<String, ServiceStatus>,
    last_incident: Option<DateTime<Utc>>,
}

impl ServiceBoard {
    /// Create an empty board; uptime starts now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(BoardInner {
                order: Vec::new(),
                services: HashMap::new(),
                last_incident: None,
            }),
        }
    }

    /// Record the latest health observation for a service
    ///
    /// A transition into unhealthy stamps the incident clock.
    pub fn set_status(&self, name: &str, healthy: bool) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.services.contains_key(name) {
            inner.order.push(name.to_string());
        }
        if !healthy {
            inner.last_incident = Some(Utc::now());
        }
        inner.services.insert(
            name.to_string(),
            ServiceStatus {
                healthy,
                last_check: Utc::now(),
            },
        );
    }

    /// Milliseconds since the board was created
    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Last transition of any tracked service into unhealthy
    pub fn last_incident_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().last_incident
    }

    /// Whether a tracked service is currently healthy
    pub fn is_healthy(&self, name: &str) -> Option<bool> {
        self.inner
            .lock()
            .unwrap()
            .services
            .get(name)
            .map(|s| s.healthy)
    }

    /// Aggregate health over all tracked services
    pub fn system_status(&self) -> SystemHealth {
        let inner = self.inner.lock().unwrap();

        let per_source: Vec<SourceHealth> = inner
            .order
            .iter()
            .filter_map(|name| {
                inner.services.get(name).map(|status| SourceHealth {
                    name: name.clone(),
                    healthy: status.healthy,
                })
            })
            .collect();

        SystemHealth {
            overall: overall_of(&per_source),
            per_source,
            uptime_ms: self.uptime_ms(),
            last_incident_at: inner.last_incident,
        }
    }
}

impl Default for ServiceBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the overall state from per-service health
pub fn overall_of(per_source: &[SourceHealth]) -> OverallHealth {
    let unhealthy = per_source.iter().filter(|s| !s.healthy).count();
    if unhealthy == 0 {
        OverallHealth::Healthy
    } else if unhealthy == per_source.len() {
        OverallHealth::Critical
    } else {
        OverallHealth::Degraded
    }
}
