// Business logic services

pub mod billing;
pub mod health_service;
pub mod payment_provider;
pub mod plan_catalog;
pub mod stripe_client;
pub mod subscription_service;
pub mod webhook_signature;

pub use billing::{calculate_proration, format_currency, generate_subscription_id, ProrationQuote};
pub use health_service::{HealthReport, HealthService};
pub use payment_provider::{CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider};
pub use plan_catalog::PlanCatalog;
pub use stripe_client::StripeClient;
pub use subscription_service::{
    CheckoutUrls, PlanChangeQuote, SubscriptionError, SubscriptionService, WebhookOutcome,
};
pub use webhook_signature::{sign_payload, verify_stripe_signature, SignatureError};
