use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::errors::not_found;
use super::health::{health_routes, root};
use super::state::AppState;
use super::subscription::subscription_routes;
use crate::middleware::{
    cors_layer, rate_limit_middleware, security_headers_layer, track_requests,
};

pub fn create_routes(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .nest("/api", health_routes())
        .nest("/subscription", subscription_routes())
        .fallback(not_found)
        .with_state(state.clone());

    if let Some(rate_limiter) = state.rate_limiter.clone() {
        router = router.layer(from_fn_with_state(rate_limiter, rate_limit_middleware));
    }

    router = router.layer(from_fn_with_state(state.metrics.clone(), track_requests));

    if state.config.security_headers_enabled {
        router = router.layer(security_headers_layer());
    }

    router
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
}
