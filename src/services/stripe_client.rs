use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, info};

use super::payment_provider::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, ProviderSubscription,
};
use crate::config::StripeConfig;

/// Stripe REST client
///
/// Talks to the v1 API with form-encoded bodies and the secret key as bearer
/// token. Checkout sessions are priced inline from the catalog plan so no
/// price objects need to exist in the Stripe account.
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let plan = &request.plan;
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.subscription_id.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                plan.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                plan.price_minor_units().to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]".to_string(),
                plan.interval.as_str().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                plan.name.clone(),
            ),
        ];

        let metadata = [
            ("user_id", &request.user_id),
            ("plan_id", &plan.id),
            ("subscription_id", &request.subscription_id),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
            form.push((format!("subscription_data[metadata][{}]", key), value.clone()));
        }

        if let Some(email) = &request.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }
        if let Some(payment_method_id) = &request.payment_method_id {
            form.push((
                "metadata[payment_method_id]".to_string(),
                payment_method_id.clone(),
            ));
        }

        form
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            error!("Stripe request failed: {} - {}", status, message);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&Self::checkout_form(&request))
            .send()
            .await?;

        let session: CheckoutSession = Self::parse(response).await?;
        info!(
            "Created Stripe checkout session {} for subscription {}",
            session.id, request.subscription_id
        );

        Ok(session)
    }

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
        at_period_end: bool,
    ) -> Result<ProviderSubscription, PaymentError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.base_url, provider_subscription_id
        );

        let response = if at_period_end {
            self.client
                .post(&url)
                .bearer_auth(&self.secret_key)
                .form(&[
                    ("cancel_at_period_end", "true"),
                    ("metadata[cancelled_by]", "aegis-fit-backend"),
                ])
                .send()
                .await?
        } else {
            self.client
                .delete(&url)
                .bearer_auth(&self.secret_key)
                .send()
                .await?
        };

        let subscription: ProviderSubscription = Self::parse(response).await?;
        info!("Cancelled Stripe subscription {}", subscription.id);

        Ok(subscription)
    }
}
