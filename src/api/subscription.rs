use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use super::state::AppState;
use crate::models::{
    CancelSubscriptionResponse, CreateSubscriptionRequest, SubscriptionMetrics, SubscriptionPlan,
    SubscriptionResponse, SubscriptionStatusResponse, WebhookEvent, WebhookResponse,
};
use crate::services::webhook_signature::DEFAULT_TOLERANCE_SECS;
use crate::services::{verify_stripe_signature, PlanChangeQuote};

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct ProrationQuery {
    pub new_plan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    /// Defaults to cancelling at the end of the current period.
    pub at_period_end: Option<bool>,
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/create", post(create_subscription))
        .route("/status/:user_id", get(subscription_status))
        .route("/webhook", post(stripe_webhook))
        .route("/cancel/:subscription_id", post(cancel_subscription))
        .route("/proration/:user_id", get(proration_quote))
        .route("/metrics", get(subscription_metrics))
}

pub async fn list_plans(State(state): State<AppState>) -> Json<Vec<SubscriptionPlan>> {
    info!("Retrieving subscription plans");
    Json(state.subscriptions.list_plans())
}

pub async fn create_subscription(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateSubscriptionRequest>, ApiError>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    info!(
        "Creating subscription on plan {} for user {}",
        request.plan_id, request.user_id
    );

    let response = state.subscriptions.create_subscription(request).await?;
    Ok(Json(response))
}

pub async fn subscription_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<SubscriptionStatusResponse> {
    info!("Retrieving subscription status for user {}", user_id);

    Json(SubscriptionStatusResponse {
        success: true,
        subscription: state.subscriptions.get_status(&user_id).await,
        timestamp: Utc::now(),
    })
}

/// Payment provider event ingestion
///
/// The signature header is always required. It is verified against the
/// webhook secret when one is configured.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing stripe-signature header".to_string()))?;

    match state.config.webhook_secret() {
        Some(secret) => verify_stripe_signature(
            &body,
            signature,
            secret,
            Utc::now().timestamp(),
            DEFAULT_TOLERANCE_SECS,
        )?,
        None => warn!("Webhook secret not configured, accepting unverified event"),
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))?;
    info!(
        "Received webhook event {} of type {} (livemode: {}, created: {:?})",
        event.id, event.event_type, event.livemode, event.created
    );

    let outcome = state.subscriptions.apply_webhook_event(&event).await;
    debug!("Webhook {} outcome: {:?}", event.id, outcome);

    Ok(Json(WebhookResponse {
        success: true,
        message: format!("Webhook {} processed successfully", event.event_type),
        event_id: event.id,
    }))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<CancelQuery>, ApiError>,
) -> Result<Json<CancelSubscriptionResponse>, ApiError> {
    let at_period_end = query.at_period_end.unwrap_or(true);
    info!(
        "Cancelling subscription {} (at period end: {})",
        subscription_id, at_period_end
    );

    let response = state
        .subscriptions
        .cancel_subscription(&subscription_id, at_period_end)
        .await?;
    Ok(Json(response))
}

pub async fn proration_quote(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<ProrationQuery>, ApiError>,
) -> Result<Json<PlanChangeQuote>, ApiError> {
    let quote = state
        .subscriptions
        .quote_plan_change(&user_id, &query.new_plan_id)
        .await?;
    Ok(Json(quote))
}

pub async fn subscription_metrics(State(state): State<AppState>) -> Json<SubscriptionMetrics> {
    Json(state.subscriptions.metrics().await)
}
