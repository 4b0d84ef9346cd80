use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::{RateLimiter, RequestMetrics};
use crate::services::{CheckoutUrls, HealthService, PaymentProvider, PlanCatalog, SubscriptionService};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscriptions: SubscriptionService,
    pub health: Arc<HealthService>,
    pub metrics: RequestMetrics,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, payments: Option<Arc<dyn PaymentProvider>>) -> Self {
        let checkout_urls = CheckoutUrls {
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        };
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| RateLimiter::new(config.rate_limit.per_minute));

        Self {
            health: Arc::new(HealthService::new(config.environment.as_str())),
            subscriptions: SubscriptionService::new(PlanCatalog::standard(), payments, checkout_urls),
            metrics: RequestMetrics::new(),
            rate_limiter,
            config: Arc::new(config),
        }
    }
}
