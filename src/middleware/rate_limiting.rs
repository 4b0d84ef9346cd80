use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiError;

const WINDOW: Duration = Duration::from_secs(60);
const RETRY_AFTER_SECS: u64 = 60;

/// Sliding one-minute window per client key.
#[derive(Clone)]
pub struct RateLimiter {
    requests_per_minute: usize,
    store: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute as usize,
            store: Arc::new(DashMap::new()),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        let mut requests = self.store.entry(key.to_string()).or_default();

        // Drop requests outside the window
        requests.retain(|&at| now.duration_since(at) < WINDOW);

        if requests.len() >= self.requests_per_minute {
            return Err(ApiError::RateLimited {
                retry_after: RETRY_AFTER_SECS,
            });
        }

        requests.push(now);
        Ok(())
    }

    /// Forgets clients with no request inside the window.
    pub fn cleanup_old_entries(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.store
            .retain(|_, requests| requests.iter().any(|&at| now.duration_since(at) < WINDOW));
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }

    /// Runs `cleanup_old_entries` every `period` on the current runtime.
    pub fn spawn_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                limiter.cleanup_old_entries();
                debug!("Rate limiter tracking {} clients", limiter.tracked_clients());
            }
        })
    }
}

/// Extract client identifier for rate limiting
fn get_client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    // Proxies put the original client first
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    if let Some(addr) = remote_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    headers: HeaderMap,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let remote_addr = req
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client_key = get_client_key(&headers, remote_addr);

    if let Err(err) = rate_limiter.check_rate_limit(&client_key) {
        warn!("Rate limit exceeded for client {}", client_key);
        return Err(err);
    }

    Ok(next.run(req).await)
}
