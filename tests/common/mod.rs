#![allow(dead_code)]

use aegis_fit::api::{create_routes, AppState};
use aegis_fit::config::{AppConfig, StripeConfig};
use aegis_fit::services::PaymentProvider;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Once};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret_for_webhooks";

static INIT: Once = Once::new();

/// Initialize test logging
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Config with Stripe credentials pointing at `api_base`.
pub fn stripe_config(api_base: &str) -> AppConfig {
    AppConfig {
        stripe: Some(StripeConfig {
            secret_key: "sk_test_123".to_string(),
            api_base: api_base.to_string(),
        }),
        stripe_publishable_key: Some("pk_test_123".to_string()),
        ..webhook_only_config()
    }
}

/// Webhook secret set without any Stripe API credentials.
pub fn webhook_only_config() -> AppConfig {
    AppConfig {
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..AppConfig::default()
    }
}

pub fn test_app(config: AppConfig) -> Router {
    test_app_with_payments(config, None)
}

pub fn test_app_with_payments(
    config: AppConfig,
    payments: Option<Arc<dyn PaymentProvider>>,
) -> Router {
    init_test_logging();
    create_routes(AppState::new(config, payments))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw(uri: &str, headers: &[(&str, &str)], body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body.into()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
