use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::{SignatureError, SubscriptionError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("{0}")]
    PaymentProvider(String),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_label = match &self {
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::Validation(_) => "Validation Error",
            ApiError::NotFound(_) => "Not Found",
            ApiError::RateLimited { .. } => "Too Many Requests",
            ApiError::PaymentProvider(_) => "Payment Provider Error",
            ApiError::Internal(err) => {
                error!("Internal error: {:?}", err);
                "Internal Server Error"
            }
        };

        let body = Json(json!({
            "error": error_label,
            "message": self.to_string(),
            "status_code": status.as_u16(),
        }));

        match self {
            ApiError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::PlanNotFound(_)
            | SubscriptionError::SubscriptionNotFound(_)
            | SubscriptionError::NoSubscription(_) => ApiError::NotFound(err.to_string()),
            SubscriptionError::Validation(message) => ApiError::Validation(message),
            SubscriptionError::Payment(err) => {
                error!("Payment provider failure: {}", err);
                ApiError::PaymentProvider(err.to_string())
            }
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        warn!("Rejected webhook signature: {}", err);
        ApiError::BadRequest(format!("Invalid webhook signature: {}", err))
    }
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PaymentError;

    #[test]
    fn test_subscription_errors_map_to_statuses() {
        let not_found: ApiError = SubscriptionError::PlanNotFound("gold".to_string()).into();
        let invalid: ApiError = SubscriptionError::Validation("User ID is required".to_string()).into();
        let upstream: ApiError = SubscriptionError::Payment(PaymentError::Api {
            status: 500,
            message: "boom".to_string(),
        })
        .into();

        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }
}
