use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use super::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/info", get(service_info))
        .route("/metrics", get(metrics))
        .route("/status", get(detailed_status))
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "AEGIS FIT API",
        "version": state.health.version(),
        "status": "running",
        "environment": state.health.environment(),
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    info!("Health check requested");
    let report = state.health.report(state.subscriptions.payments_configured());

    Json(json!(report))
}

/// Readiness check
pub async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ready": true,
        "checks": {
            "catalog": if state.subscriptions.catalog().is_empty() { "empty" } else { "ready" },
            "payment_provider": if state.subscriptions.payments_configured() { "ready" } else { "not_configured" },
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Liveness check
pub async fn liveness_check() -> Json<Value> {
    Json(json!({
        "alive": true,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn service_info(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;

    Json(json!({
        "service": state.health.service_name(),
        "version": state.health.version(),
        "environment": config.environment.as_str(),
        "configuration": {
            "stripe_configured": config.is_stripe_configured(),
            "webhook_secret_configured": config.webhook_secret().is_some(),
            "email_configured": config.is_email_configured(),
            "database_configured": !config.database_url.is_empty(),
            "cors_origins": config.cors_origins,
        },
        "plans_available": state.subscriptions.catalog().len(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": state.health.service_name(),
        "version": state.health.version(),
        "uptime_seconds": state.health.uptime().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
        "metrics": state.metrics.snapshot(),
        "subscriptions": state.subscriptions.metrics().await,
    }))
}

/// Health payload plus host and configuration details.
pub async fn detailed_status(State(state): State<AppState>) -> Json<Value> {
    info!("Detailed status requested");
    let config = &state.config;

    let mut status = json!(state.health.report(state.subscriptions.payments_configured()));
    status["system_info"] = json!({
        "rust_version": option_env!("CARGO_PKG_RUST_VERSION").filter(|v| !v.is_empty()).unwrap_or("unknown"),
        "os": std::env::consts::OS,
        "architecture": std::env::consts::ARCH,
        "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        "environment": config.environment.as_str(),
    });
    status["configuration"] = json!({
        "debug_mode": config.debug,
        "log_level": config.log_level.as_str(),
        "structured_logging": config.structured_logging,
        "cors_enabled": !config.cors_origins.is_empty(),
        "rate_limiting_enabled": config.rate_limit.enabled,
        "security_headers_enabled": config.security_headers_enabled,
    });

    Json(status)
}
