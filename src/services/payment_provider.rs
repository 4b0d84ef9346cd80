use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::SubscriptionPlan;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Payment provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid payment provider response: {0}")]
    InvalidResponse(String),
}

/// Everything a provider needs to open a hosted checkout for one plan.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub plan: SubscriptionPlan,
    pub user_id: String,
    pub subscription_id: String,
    pub customer_email: Option<String>,
    /// Payment method the client already collected, passed along as metadata.
    pub payment_method_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub canceled_at: Option<i64>,
}

/// Seam between subscription handling and a hosted payment provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
        at_period_end: bool,
    ) -> Result<ProviderSubscription, PaymentError>;
}
