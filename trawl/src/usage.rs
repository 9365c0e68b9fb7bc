// Per-endpoint request counters for the HTTP API

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;

use crate::server::AppState;

/// Monotonic request counters keyed by `"METHOD /route/:pattern"`.
///
/// Keys come from matched route patterns, so the map never grows past the
/// number of registered routes.
#[derive(Debug)]
pub struct UsageCounters {
    started: Instant,
    total: AtomicU64,
    endpoints: Mutex<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub endpoints: BTreeMap<String, u64>,
}

impl Default for UsageCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            endpoints: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, endpoint: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match self.endpoints.lock() {
            Ok(mut endpoints) => *endpoints.entry(endpoint.to_string()).or_insert(0) += 1,
            Err(_) => warn!("Usage counters lock poisoned, dropping {}", endpoint),
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let endpoints = self
            .endpoints
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default();

        UsageSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            total_requests: self.total.load(Ordering::Relaxed),
            endpoints,
        }
    }
}

/// Count the request against its matched route, then pass it on.
pub async fn track(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if let Some(path) = request.extensions().get::<MatchedPath>() {
        state
            .usage
            .record(&format!("{} {}", request.method(), path.as_str()));
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_endpoint() {
        let usage = UsageCounters::new();
        usage.record("GET /api/v1/entities");
        usage.record("GET /api/v1/entities");
        usage.record("POST /api/v1/verify");

        let snapshot = usage.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.endpoints["GET /api/v1/entities"], 2);
        assert_eq!(snapshot.endpoints["POST /api/v1/verify"], 1);
        assert_eq!(snapshot.endpoints.len(), 2);
    }
}
