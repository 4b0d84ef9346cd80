use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use validator::Validate;

use super::billing::{
    calculate_proration, format_currency, generate_subscription_id, monthly_equivalent,
    period_end, round2, ProrationQuote,
};
use super::payment_provider::{CheckoutRequest, PaymentError, PaymentProvider};
use super::plan_catalog::PlanCatalog;
use crate::models::{
    normalize_plan_id, validate_email, validate_user_id, CancelSubscriptionResponse,
    CreateSubscriptionRequest, PaymentStatus, Subscription, SubscriptionPlan,
    SubscriptionMetrics, SubscriptionResponse, SubscriptionStatus, UserSubscription,
    WebhookEvent,
};

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Plan '{0}' not found")]
    PlanNotFound(String),
    #[error("Subscription '{0}' not found")]
    SubscriptionNotFound(String),
    #[error("User '{0}' has no subscription")]
    NoSubscription(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Where the hosted checkout sends the customer afterwards.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied {
        subscription_id: String,
        status: SubscriptionStatus,
        payment_status: PaymentStatus,
    },
    /// A lifecycle event that refers to no subscription we hold.
    Unmatched,
    /// An event type we do not act on.
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanChangeQuote {
    pub user_id: String,
    pub current_plan_id: String,
    pub new_plan_id: String,
    #[serde(flatten)]
    pub quote: ProrationQuote,
}

#[derive(Clone)]
pub struct SubscriptionService {
    catalog: PlanCatalog,
    payments: Option<Arc<dyn PaymentProvider>>,
    checkout_urls: CheckoutUrls,
    // Current subscription per user id.
    ledger: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl SubscriptionService {
    pub fn new(
        catalog: PlanCatalog,
        payments: Option<Arc<dyn PaymentProvider>>,
        checkout_urls: CheckoutUrls,
    ) -> Self {
        Self {
            catalog,
            payments,
            checkout_urls,
            ledger: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn payments_configured(&self) -> bool {
        self.payments.is_some()
    }

    pub fn list_plans(&self) -> Vec<SubscriptionPlan> {
        self.catalog.plans().to_vec()
    }

    /// Creates a subscription for `user_id` on `plan_id` and records it as the
    /// user's current one. Paid plans open a checkout session when a payment
    /// provider is configured.
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionResponse, SubscriptionError> {
        request
            .validate()
            .map_err(|e| SubscriptionError::Validation(e.to_string()))?;
        validate_user_id(&request.user_id)
            .map_err(|e| SubscriptionError::Validation(e.to_string()))?;
        let plan_id = normalize_plan_id(&request.plan_id)
            .map_err(|e| SubscriptionError::Validation(e.to_string()))?;
        let email = request.email.as_deref().map(str::trim).map(str::to_string);
        if let Some(email) = &email {
            validate_email(email).map_err(|e| SubscriptionError::Validation(e.to_string()))?;
        }

        let plan = self
            .catalog
            .find(&plan_id)
            .cloned()
            .ok_or_else(|| SubscriptionError::PlanNotFound(plan_id.clone()))?;

        let now = Utc::now();
        let subscription_id = generate_subscription_id(&request.user_id, &plan.id, now);

        let mut subscription = Subscription {
            id: subscription_id.clone(),
            plan_id: plan.id.clone(),
            user_id: request.user_id.clone(),
            status: SubscriptionStatus::Active,
            payment_status: if plan.is_free() {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            created_at: now,
            updated_at: now,
            current_period_start: now,
            current_period_end: period_end(now, plan.interval),
            cancelled_at: None,
            checkout_url: None,
            checkout_session_id: None,
            provider_subscription_id: None,
            provider_customer_id: None,
        };

        if !plan.is_free() {
            match &self.payments {
                Some(payments) => {
                    let session = payments
                        .create_checkout_session(CheckoutRequest {
                            plan: plan.clone(),
                            user_id: request.user_id.clone(),
                            subscription_id: subscription_id.clone(),
                            customer_email: email.clone(),
                            payment_method_id: request.payment_method_id.clone(),
                            success_url: self.checkout_urls.success_url.clone(),
                            cancel_url: self.checkout_urls.cancel_url.clone(),
                        })
                        .await?;
                    subscription.checkout_url = session.url;
                    subscription.checkout_session_id = Some(session.id);
                    subscription.provider_customer_id = session.customer;
                }
                None => warn!(
                    "Payment provider not configured, recording {} subscription {} without checkout",
                    plan.id, subscription_id
                ),
            }
        }

        self.ledger
            .write()
            .await
            .insert(subscription.user_id.clone(), subscription.clone());

        info!(
            "Created subscription {} on plan {} for user {}",
            subscription.id, plan.id, subscription.user_id
        );

        let message = if plan.is_free() {
            "Free subscription activated successfully".to_string()
        } else {
            format!(
                "Subscription created successfully - {} per {}",
                format_currency(plan.price, &plan.currency),
                plan.interval.as_str()
            )
        };

        Ok(SubscriptionResponse::new(&subscription, &plan, message))
    }

    pub async fn get_status(&self, user_id: &str) -> UserSubscription {
        self.ledger
            .read()
            .await
            .get(user_id)
            .map(UserSubscription::from)
            .unwrap_or_else(|| UserSubscription::none(user_id))
    }

    pub async fn get_subscription(&self, user_id: &str) -> Option<Subscription> {
        self.ledger.read().await.get(user_id).cloned()
    }

    /// Cancels a subscription by id. Provider-linked subscriptions are also
    /// cancelled upstream, either at the end of the current period or at once.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<CancelSubscriptionResponse, SubscriptionError> {
        let existing = self
            .ledger
            .read()
            .await
            .values()
            .find(|s| s.id == subscription_id)
            .cloned()
            .ok_or_else(|| SubscriptionError::SubscriptionNotFound(subscription_id.to_string()))?;

        if existing.status != SubscriptionStatus::Cancelled {
            if let (Some(payments), Some(provider_id)) =
                (&self.payments, &existing.provider_subscription_id)
            {
                payments.cancel_subscription(provider_id, at_period_end).await?;
            }
        }

        let now = Utc::now();
        let mut ledger = self.ledger.write().await;
        let subscription = ledger
            .get_mut(&existing.user_id)
            .filter(|s| s.id == subscription_id)
            .ok_or_else(|| SubscriptionError::SubscriptionNotFound(subscription_id.to_string()))?;

        if subscription.status != SubscriptionStatus::Cancelled {
            subscription.status = SubscriptionStatus::Cancelled;
            subscription.cancelled_at = Some(now);
            subscription.updated_at = now;
            if !at_period_end {
                subscription.current_period_end = now;
            }
            info!("Cancelled subscription {}", subscription_id);
        }

        Ok(CancelSubscriptionResponse {
            success: true,
            message: format!("Subscription {} cancelled successfully", subscription_id),
            subscription_id: subscription_id.to_string(),
            cancelled_at: subscription.cancelled_at.unwrap_or(now),
            effective_date: subscription.current_period_end,
        })
    }

    /// Applies a payment-provider lifecycle event to the matching subscription.
    pub async fn apply_webhook_event(&self, event: &WebhookEvent) -> WebhookOutcome {
        let kind = event.event_type.as_str();
        if !matches!(
            kind,
            "checkout.session.completed"
                | "customer.subscription.created"
                | "customer.subscription.updated"
                | "customer.subscription.deleted"
                | "invoice.payment_succeeded"
                | "invoice.payment_failed"
        ) {
            info!("Unhandled webhook event type: {}", kind);
            return WebhookOutcome::Ignored;
        }

        let mut ledger = self.ledger.write().await;
        let Some(key) = ledger_key(&ledger, event) else {
            warn!("Webhook event {} ({}) matches no subscription", event.id, kind);
            return WebhookOutcome::Unmatched;
        };
        let Some(subscription) = ledger.get_mut(&key) else {
            return WebhookOutcome::Unmatched;
        };

        let now = Utc::now();
        if let Some(provider_id) = event.provider_subscription_id() {
            subscription.provider_subscription_id = Some(provider_id.to_string());
        }
        if let Some(customer_id) = event.provider_customer_id() {
            subscription.provider_customer_id = Some(customer_id.to_string());
        }

        match kind {
            "checkout.session.completed" => {
                subscription.payment_status = PaymentStatus::Paid;
            }
            "customer.subscription.created" => {
                subscription.status = SubscriptionStatus::Active;
            }
            "customer.subscription.updated" => {
                let provider_status = event.object()["status"].as_str().unwrap_or_default();
                match SubscriptionStatus::from_provider(provider_status) {
                    Some(status) => subscription.status = status,
                    None => warn!("Unknown provider subscription status '{}'", provider_status),
                }
            }
            "customer.subscription.deleted" => {
                subscription.status = SubscriptionStatus::Cancelled;
                subscription.cancelled_at.get_or_insert(now);
            }
            "invoice.payment_succeeded" => {
                subscription.payment_status = PaymentStatus::Paid;
                subscription.status = SubscriptionStatus::Active;
            }
            "invoice.payment_failed" => {
                subscription.payment_status = PaymentStatus::Failed;
                subscription.status = SubscriptionStatus::PastDue;
            }
            _ => {}
        }
        subscription.updated_at = now;

        info!(
            "Webhook {} moved subscription {} to {:?}/{:?}",
            kind, subscription.id, subscription.status, subscription.payment_status
        );

        WebhookOutcome::Applied {
            subscription_id: subscription.id.clone(),
            status: subscription.status,
            payment_status: subscription.payment_status,
        }
    }

    /// Counts, revenue and churn over every subscription in the ledger.
    ///
    /// Revenue counts active subscriptions at their plan's monthly price;
    /// ARPU divides it across all active subscriptions, free ones included.
    pub async fn metrics(&self) -> SubscriptionMetrics {
        let ledger = self.ledger.read().await;

        let mut plan_breakdown = BTreeMap::new();
        let mut status_breakdown = BTreeMap::new();
        let mut active = 0;
        let mut cancelled = 0;
        let mut revenue = 0.0;

        for subscription in ledger.values() {
            *plan_breakdown.entry(subscription.plan_id.clone()).or_insert(0) += 1;
            *status_breakdown
                .entry(subscription.status.as_str().to_string())
                .or_insert(0) += 1;

            match subscription.status {
                SubscriptionStatus::Active => {
                    active += 1;
                    if let Some(plan) = self.catalog.find(&subscription.plan_id) {
                        revenue += monthly_equivalent(plan.price, plan.interval);
                    }
                }
                SubscriptionStatus::Cancelled => cancelled += 1,
                _ => {}
            }
        }

        let total = ledger.len();
        let monthly_recurring_revenue = round2(revenue);

        SubscriptionMetrics {
            total_subscriptions: total,
            active_subscriptions: active,
            cancelled_subscriptions: cancelled,
            monthly_recurring_revenue,
            average_revenue_per_user: if active > 0 {
                round2(monthly_recurring_revenue / active as f64)
            } else {
                0.0
            },
            churn_rate: if total > 0 {
                (cancelled as f64 / total as f64 * 10_000.0).round() / 10_000.0
            } else {
                0.0
            },
            plan_breakdown,
            status_breakdown,
            calculated_at: Utc::now(),
        }
    }

    /// Prices a switch of the user's current subscription to `new_plan_id`.
    pub async fn quote_plan_change(
        &self,
        user_id: &str,
        new_plan_id: &str,
    ) -> Result<PlanChangeQuote, SubscriptionError> {
        let new_plan_id = normalize_plan_id(new_plan_id)
            .map_err(|e| SubscriptionError::Validation(e.to_string()))?;
        let new_plan = self
            .catalog
            .find(&new_plan_id)
            .ok_or_else(|| SubscriptionError::PlanNotFound(new_plan_id.clone()))?;

        let current = self
            .get_subscription(user_id)
            .await
            .filter(|s| s.status != SubscriptionStatus::Cancelled)
            .ok_or_else(|| SubscriptionError::NoSubscription(user_id.to_string()))?;
        let current_price = self
            .catalog
            .find(&current.plan_id)
            .map(|plan| plan.price)
            .unwrap_or(0.0);

        Ok(PlanChangeQuote {
            user_id: user_id.to_string(),
            current_plan_id: current.plan_id.clone(),
            new_plan_id: new_plan.id.clone(),
            quote: calculate_proration(
                current_price,
                new_plan.price,
                current.current_period_end,
                Utc::now(),
            ),
        })
    }
}

/// Finds the ledger key (user id) an event refers to.
fn ledger_key(ledger: &HashMap<String, Subscription>, event: &WebhookEvent) -> Option<String> {
    if let Some(subscription_id) = event.metadata("subscription_id") {
        if let Some(s) = ledger.values().find(|s| s.id == subscription_id) {
            return Some(s.user_id.clone());
        }
    }

    if let Some(user_id) = event.metadata("user_id") {
        if ledger.contains_key(user_id) {
            return Some(user_id.to_string());
        }
    }

    let provider_id = event.provider_subscription_id()?;
    ledger
        .values()
        .find(|s| s.provider_subscription_id.as_deref() == Some(provider_id))
        .map(|s| s.user_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payment_provider::{CheckoutSession, MockPaymentProvider, ProviderSubscription};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn urls() -> CheckoutUrls {
        CheckoutUrls {
            success_url: "https://app.example/ok".to_string(),
            cancel_url: "https://app.example/cancel".to_string(),
        }
    }

    fn service(payments: Option<Arc<dyn PaymentProvider>>) -> SubscriptionService {
        SubscriptionService::new(PlanCatalog::standard(), payments, urls())
    }

    fn request(plan_id: &str, user_id: &str) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            plan_id: plan_id.to_string(),
            user_id: user_id.to_string(),
            email: None,
            payment_method_id: None,
        }
    }

    fn event(value: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_every_plan_creates_active_subscription() {
        let service = service(None);

        for plan in PlanCatalog::standard().plans() {
            let response = service
                .create_subscription(request(&plan.id, "user_1"))
                .await
                .unwrap();

            assert_eq!(response.status, SubscriptionStatus::Active);
            assert_eq!(response.plan_id, plan.id);
            assert_eq!(response.amount, plan.price);
        }
    }

    #[tokio::test]
    async fn test_unknown_plan_is_not_found() {
        let result = service(None)
            .create_subscription(request("platinum", "user_1"))
            .await;

        assert_matches!(result, Err(SubscriptionError::PlanNotFound(id)) if id == "platinum");
    }

    #[tokio::test]
    async fn test_plan_id_is_normalized() {
        let response = service(None)
            .create_subscription(request("  PREMIUM ", "user_1"))
            .await
            .unwrap();

        assert_eq!(response.plan_id, "premium");
        assert_eq!(response.payment_status, PaymentStatus::Pending);
        assert!(response.message.contains("$9.99 per month"));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let service = service(None);

        assert_matches!(
            service.create_subscription(request("free", "")).await,
            Err(SubscriptionError::Validation(_))
        );
        assert_matches!(
            service.create_subscription(request("   ", "user_1")).await,
            Err(SubscriptionError::Validation(_))
        );

        let mut bad_email = request("free", "user_1");
        bad_email.email = Some("not-an-email".to_string());
        assert_matches!(
            service.create_subscription(bad_email).await,
            Err(SubscriptionError::Validation(_))
        );
    }

    #[tokio::test]
    async fn test_repeated_creation_yields_distinct_ids() {
        let service = service(None);
        let first = service.create_subscription(request("free", "user_1")).await.unwrap();
        let second = service.create_subscription(request("free", "user_1")).await.unwrap();

        assert_ne!(first.subscription_id, second.subscription_id);
        let status = service.get_status("user_1").await;
        assert_eq!(status.subscription_id, Some(second.subscription_id));
    }

    #[tokio::test]
    async fn test_status_for_unknown_user_is_inactive_free() {
        let status = service(None).get_status("nobody").await;

        assert_eq!(status, UserSubscription::none("nobody"));
        assert_eq!(status.status, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn test_paid_plan_opens_checkout() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_checkout_session()
            .withf(|req| req.plan.id == "pro" && req.user_id == "user_9")
            .times(1)
            .returning(|req| {
                Ok(CheckoutSession {
                    id: "cs_test_1".to_string(),
                    url: Some(format!("https://checkout.example/{}", req.subscription_id)),
                    customer: None,
                    payment_status: Some("unpaid".to_string()),
                    status: Some("open".to_string()),
                })
            });

        let service = service(Some(Arc::new(provider)));
        let response = service.create_subscription(request("pro", "user_9")).await.unwrap();

        assert_eq!(response.stripe_session_id.as_deref(), Some("cs_test_1"));
        assert_eq!(
            response.checkout_url,
            Some(format!("https://checkout.example/{}", response.subscription_id))
        );
    }

    #[tokio::test]
    async fn test_checkout_receives_trimmed_email_and_payment_method() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_checkout_session()
            .withf(|req| {
                req.customer_email.as_deref() == Some("athlete@example.com")
                    && req.payment_method_id.as_deref() == Some("pm_card_visa")
            })
            .times(1)
            .returning(|_| {
                Ok(CheckoutSession {
                    id: "cs_test_2".to_string(),
                    url: None,
                    customer: None,
                    payment_status: None,
                    status: None,
                })
            });

        let mut create = request("premium", "user_11");
        create.email = Some("  athlete@example.com ".to_string());
        create.payment_method_id = Some("pm_card_visa".to_string());

        let response = service(Some(Arc::new(provider)))
            .create_subscription(create)
            .await
            .unwrap();
        assert_eq!(response.stripe_session_id.as_deref(), Some("cs_test_2"));
    }

    #[tokio::test]
    async fn test_free_plan_skips_provider() {
        let mut provider = MockPaymentProvider::new();
        provider.expect_create_checkout_session().times(0);

        let service = service(Some(Arc::new(provider)));
        let response = service.create_subscription(request("free", "user_2")).await.unwrap();

        assert_eq!(response.payment_status, PaymentStatus::Paid);
        assert!(response.checkout_url.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_no_record() {
        let mut provider = MockPaymentProvider::new();
        provider.expect_create_checkout_session().returning(|_| {
            Err(PaymentError::Api {
                status: 402,
                message: "card declined".to_string(),
            })
        });

        let service = service(Some(Arc::new(provider)));
        let result = service.create_subscription(request("premium", "user_3")).await;

        assert_matches!(result, Err(SubscriptionError::Payment(_)));
        assert!(service.get_subscription("user_3").await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_marks_cancelled_and_is_repeatable() {
        let service = service(None);
        let created = service.create_subscription(request("premium", "user_4")).await.unwrap();

        let first = service.cancel_subscription(&created.subscription_id, true).await.unwrap();
        let second = service.cancel_subscription(&created.subscription_id, true).await.unwrap();

        assert_eq!(first.cancelled_at, second.cancelled_at);
        assert_eq!(first.effective_date, created.expires_at);
        assert_eq!(
            service.get_status("user_4").await.status,
            SubscriptionStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_subscription() {
        let result = service(None).cancel_subscription("sub_missing_0", true).await;
        assert_matches!(result, Err(SubscriptionError::SubscriptionNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_forwards_linked_subscription_to_provider() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_checkout_session()
            .returning(|_| {
                Ok(CheckoutSession {
                    id: "cs_1".to_string(),
                    url: None,
                    customer: Some("cus_1".to_string()),
                    payment_status: None,
                    status: None,
                })
            });
        provider
            .expect_cancel_subscription()
            .withf(|id, at_period_end| id == "sub_provider_1" && *at_period_end)
            .times(1)
            .returning(|id, _| {
                Ok(ProviderSubscription {
                    id: id.to_string(),
                    status: "active".to_string(),
                    cancel_at_period_end: true,
                    canceled_at: None,
                })
            });

        let service = service(Some(Arc::new(provider)));
        let created = service.create_subscription(request("pro", "user_5")).await.unwrap();
        service
            .apply_webhook_event(&event(json!({
                "id": "evt_link",
                "type": "customer.subscription.created",
                "data": { "object": {
                    "object": "subscription",
                    "id": "sub_provider_1",
                    "customer": "cus_1",
                    "metadata": { "subscription_id": created.subscription_id }
                } }
            })))
            .await;

        service.cancel_subscription(&created.subscription_id, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_immediate_cancel_ends_period_now() {
        let mut provider = MockPaymentProvider::new();
        provider.expect_create_checkout_session().returning(|_| {
            Ok(CheckoutSession {
                id: "cs_2".to_string(),
                url: None,
                customer: None,
                payment_status: None,
                status: None,
            })
        });
        provider
            .expect_cancel_subscription()
            .withf(|id, at_period_end| id == "sub_provider_2" && !*at_period_end)
            .times(1)
            .returning(|id, _| {
                Ok(ProviderSubscription {
                    id: id.to_string(),
                    status: "canceled".to_string(),
                    cancel_at_period_end: false,
                    canceled_at: Some(1_700_000_000),
                })
            });

        let service = service(Some(Arc::new(provider)));
        let created = service.create_subscription(request("premium", "user_12")).await.unwrap();
        service
            .apply_webhook_event(&event(json!({
                "id": "evt_link_2",
                "type": "customer.subscription.created",
                "data": { "object": {
                    "object": "subscription",
                    "id": "sub_provider_2",
                    "metadata": { "subscription_id": created.subscription_id }
                } }
            })))
            .await;

        let cancelled = service
            .cancel_subscription(&created.subscription_id, false)
            .await
            .unwrap();

        assert!(cancelled.effective_date < created.expires_at);
        assert_eq!(cancelled.effective_date, cancelled.cancelled_at);
    }

    #[tokio::test]
    async fn test_metrics_over_ledger() {
        let service = service(None);
        for (plan_id, user_id) in [
            ("premium", "user_a"),
            ("pro", "user_b"),
            ("free", "user_c"),
            ("premium", "user_d"),
        ] {
            service.create_subscription(request(plan_id, user_id)).await.unwrap();
        }
        let cancelled = service.get_subscription("user_d").await.unwrap();
        service.cancel_subscription(&cancelled.id, true).await.unwrap();

        let metrics = service.metrics().await;

        assert_eq!(metrics.total_subscriptions, 4);
        assert_eq!(metrics.active_subscriptions, 3);
        assert_eq!(metrics.cancelled_subscriptions, 1);
        assert_eq!(metrics.monthly_recurring_revenue, 29.98);
        assert_eq!(metrics.average_revenue_per_user, 9.99);
        assert_eq!(metrics.churn_rate, 0.25);
        assert_eq!(metrics.plan_breakdown.get("premium"), Some(&2));
        assert_eq!(metrics.plan_breakdown.get("enterprise"), None);
        assert_eq!(metrics.status_breakdown.get("active"), Some(&3));
        assert_eq!(metrics.status_breakdown.get("cancelled"), Some(&1));
    }

    #[tokio::test]
    async fn test_metrics_on_empty_ledger() {
        let metrics = service(None).metrics().await;

        assert_eq!(metrics.total_subscriptions, 0);
        assert_eq!(metrics.monthly_recurring_revenue, 0.0);
        assert_eq!(metrics.average_revenue_per_user, 0.0);
        assert_eq!(metrics.churn_rate, 0.0);
        assert!(metrics.plan_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_webhook_payment_lifecycle() {
        let service = service(None);
        let created = service.create_subscription(request("premium", "user_6")).await.unwrap();

        let outcome = service
            .apply_webhook_event(&event(json!({
                "id": "evt_1",
                "type": "invoice.payment_failed",
                "data": { "object": { "object": "invoice", "metadata": { "user_id": "user_6" } } }
            })))
            .await;
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                subscription_id: created.subscription_id.clone(),
                status: SubscriptionStatus::PastDue,
                payment_status: PaymentStatus::Failed,
            }
        );

        service
            .apply_webhook_event(&event(json!({
                "id": "evt_2",
                "type": "invoice.payment_succeeded",
                "data": { "object": { "object": "invoice", "metadata": { "user_id": "user_6" } } }
            })))
            .await;
        let status = service.get_status("user_6").await;
        assert_eq!(status.status, SubscriptionStatus::Active);
        assert_eq!(status.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_webhook_matches_by_provider_subscription_id() {
        let service = service(None);
        let created = service.create_subscription(request("pro", "user_7")).await.unwrap();

        service
            .apply_webhook_event(&event(json!({
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": { "object": {
                    "object": "checkout.session",
                    "subscription": "sub_provider_7",
                    "customer": "cus_7",
                    "metadata": { "subscription_id": created.subscription_id }
                } }
            })))
            .await;

        let outcome = service
            .apply_webhook_event(&event(json!({
                "id": "evt_2",
                "type": "customer.subscription.deleted",
                "data": { "object": { "object": "subscription", "id": "sub_provider_7" } }
            })))
            .await;

        assert_matches!(outcome, WebhookOutcome::Applied { status: SubscriptionStatus::Cancelled, .. });
        let stored = service.get_subscription("user_7").await.unwrap();
        assert_eq!(stored.provider_customer_id.as_deref(), Some("cus_7"));
        assert!(stored.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_webhook_updated_maps_provider_status() {
        let service = service(None);
        service.create_subscription(request("premium", "user_8")).await.unwrap();

        let outcome = service
            .apply_webhook_event(&event(json!({
                "id": "evt_1",
                "type": "customer.subscription.updated",
                "data": { "object": {
                    "object": "subscription",
                    "id": "sub_provider_8",
                    "status": "past_due",
                    "metadata": { "user_id": "user_8" }
                } }
            })))
            .await;

        assert_matches!(outcome, WebhookOutcome::Applied { status: SubscriptionStatus::PastDue, .. });
    }

    #[tokio::test]
    async fn test_webhook_unmatched_and_ignored() {
        let service = service(None);

        let unmatched = service
            .apply_webhook_event(&event(json!({
                "id": "evt_1",
                "type": "invoice.payment_succeeded",
                "data": { "object": { "object": "invoice", "subscription": "sub_unknown" } }
            })))
            .await;
        let ignored = service
            .apply_webhook_event(&event(json!({ "id": "evt_2", "type": "charge.refunded" })))
            .await;

        assert_eq!(unmatched, WebhookOutcome::Unmatched);
        assert_eq!(ignored, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_quote_plan_change() {
        let service = service(None);
        service.create_subscription(request("premium", "user_10")).await.unwrap();

        let quote = service.quote_plan_change("user_10", "Enterprise").await.unwrap();
        assert_eq!(quote.current_plan_id, "premium");
        assert_eq!(quote.new_plan_id, "enterprise");
        assert_eq!(quote.quote.immediate_charge, 99.99);
        assert!(quote.quote.credit_amount > 0.0);

        assert_matches!(
            service.quote_plan_change("nobody", "pro").await,
            Err(SubscriptionError::NoSubscription(_))
        );
        assert_matches!(
            service.quote_plan_change("user_10", "platinum").await,
            Err(SubscriptionError::PlanNotFound(_))
        );
    }
}
