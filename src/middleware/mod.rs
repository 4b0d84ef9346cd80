pub mod rate_limiting;
pub mod request_metrics;
pub mod security;

pub use rate_limiting::{rate_limit_middleware, RateLimiter};
pub use request_metrics::{track_requests, MetricsSnapshot, RequestMetrics};
pub use security::{cors_layer, security_headers_layer};
