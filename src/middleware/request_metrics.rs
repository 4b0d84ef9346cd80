use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    active_connections: AtomicU64,
}

/// Process-wide request counters reported by `/api/metrics`.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    counters: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub active_connections: u64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.counters.requests_total.load(Ordering::Relaxed),
            errors_total: self.counters.errors_total.load(Ordering::Relaxed),
            active_connections: self.counters.active_connections.load(Ordering::Relaxed),
        }
    }

    fn start(&self) -> InFlight {
        self.counters.requests_total.fetch_add(1, Ordering::Relaxed);
        self.counters.active_connections.fetch_add(1, Ordering::Relaxed);
        InFlight(self.counters.clone())
    }

    fn record_error(&self) {
        self.counters.errors_total.fetch_add(1, Ordering::Relaxed);
    }
}

// Decrements the in-flight gauge even when the request future is dropped.
struct InFlight(Arc<Counters>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

pub async fn track_requests(
    State(metrics): State<RequestMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let _in_flight = metrics.start();
    let response = next.run(request).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        metrics.record_error();
    }

    response
}
