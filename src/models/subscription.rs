use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
    PastDue,
    Pending,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Pending => "pending",
        }
    }

    /// Maps a Stripe subscription status onto ours.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "active" | "trialing" => Some(SubscriptionStatus::Active),
            "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Cancelled),
            "incomplete" => Some(SubscriptionStatus::Pending),
            "incomplete_expired" => Some(SubscriptionStatus::Expired),
            "paused" => Some(SubscriptionStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Month => 1,
            BillingInterval::Year => 12,
        }
    }
}

/// A subscription tier offered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub interval: BillingInterval,
    pub features: Vec<String>,
    pub is_popular: bool,
    /// `-1` means unlimited.
    pub max_users: i32,
    /// `-1` means unlimited.
    pub max_projects: i32,
}

impl SubscriptionPlan {
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    /// Price in the currency's minor unit, as payment providers expect it.
    pub fn price_minor_units(&self) -> i64 {
        (self.price * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, message = "Plan ID is required"))]
    pub plan_id: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    pub email: Option<String>,
    pub payment_method_id: Option<String>,
}

/// A user's subscription as held in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: String,
    pub plan_id: String,
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checkout_url: Option<String>,
    pub checkout_session_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub provider_customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: String,
    pub plan_id: String,
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub checkout_url: Option<String>,
    pub stripe_session_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionResponse {
    pub fn new(subscription: &Subscription, plan: &SubscriptionPlan, message: String) -> Self {
        Self {
            success: true,
            message,
            subscription_id: subscription.id.clone(),
            plan_id: plan.id.clone(),
            user_id: subscription.user_id.clone(),
            status: subscription.status,
            payment_status: subscription.payment_status,
            amount: plan.price,
            currency: plan.currency.clone(),
            billing_interval: plan.interval,
            checkout_url: subscription.checkout_url.clone(),
            stripe_session_id: subscription.checkout_session_id.clone(),
            expires_at: subscription.current_period_end,
            created_at: subscription.created_at,
        }
    }
}

/// Status view returned by the lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSubscription {
    pub user_id: String,
    pub subscription_id: Option<String>,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserSubscription {
    /// View for a user who never subscribed.
    pub fn none(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            subscription_id: None,
            plan_id: "free".to_string(),
            status: SubscriptionStatus::Inactive,
            payment_status: PaymentStatus::Pending,
            current_period_start: None,
            current_period_end: None,
            cancelled_at: None,
            created_at: None,
        }
    }
}

impl From<&Subscription> for UserSubscription {
    fn from(subscription: &Subscription) -> Self {
        Self {
            user_id: subscription.user_id.clone(),
            subscription_id: Some(subscription.id.clone()),
            plan_id: subscription.plan_id.clone(),
            status: subscription.status,
            payment_status: subscription.payment_status,
            current_period_start: Some(subscription.current_period_start),
            current_period_end: Some(subscription.current_period_end),
            cancelled_at: subscription.cancelled_at,
            created_at: Some(subscription.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub success: bool,
    pub subscription: UserSubscription,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates over the subscription ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionMetrics {
    pub total_subscriptions: usize,
    pub active_subscriptions: usize,
    pub cancelled_subscriptions: usize,
    pub monthly_recurring_revenue: f64,
    pub average_revenue_per_user: f64,
    /// Cancelled share of all subscriptions.
    pub churn_rate: f64,
    pub plan_breakdown: BTreeMap<String, usize>,
    pub status_breakdown: BTreeMap<String, usize>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: String,
    pub cancelled_at: DateTime<Utc>,
    pub effective_date: DateTime<Utc>,
}

/// Inbound payment-provider event. Only `id` and `type` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// The `data.object` payload of the event.
    pub fn object(&self) -> &Value {
        &self.data["object"]
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.object()["metadata"][key].as_str()
    }

    /// Provider subscription id referenced by the event, if any.
    pub fn provider_subscription_id(&self) -> Option<&str> {
        let object = self.object();
        match object["object"].as_str() {
            Some("subscription") => object["id"].as_str(),
            _ => object["subscription"].as_str(),
        }
    }

    pub fn provider_customer_id(&self) -> Option<&str> {
        self.object()["customer"].as_str()
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub event_id: String,
}
