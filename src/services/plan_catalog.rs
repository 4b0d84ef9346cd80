use std::sync::Arc;

use crate::models::{BillingInterval, SubscriptionPlan};

/// Read-only catalog of the plans on offer, built once at startup.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Arc<Vec<SubscriptionPlan>>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<SubscriptionPlan>) -> Self {
        Self {
            plans: Arc::new(plans),
        }
    }

    /// The free, premium, pro and enterprise tiers.
    pub fn standard() -> Self {
        Self::new(vec![
            plan(
                "free",
                "Free Plan",
                "Basic fitness tracking with limited features",
                0.0,
                &[
                    "Basic workout tracking",
                    "Limited progress analytics",
                    "Community access",
                    "Mobile app access",
                ],
                false,
                1,
                3,
            ),
            plan(
                "premium",
                "Premium Plan",
                "Full fitness tracking with advanced analytics",
                9.99,
                &[
                    "Unlimited workout tracking",
                    "Advanced progress analytics",
                    "Personalized workout plans",
                    "Nutrition tracking",
                    "Priority support",
                    "Export data",
                    "Multiple device sync",
                ],
                true,
                5,
                10,
            ),
            plan(
                "pro",
                "Professional Plan",
                "Complete fitness solution for serious athletes",
                19.99,
                &[
                    "Everything in Premium",
                    "Personal trainer consultations",
                    "Custom meal plans",
                    "Advanced body composition analysis",
                    "API access for integrations",
                    "Team/coach dashboard",
                    "White-label options",
                ],
                false,
                50,
                100,
            ),
            plan(
                "enterprise",
                "Enterprise Plan",
                "Scalable solution for large organizations",
                99.99,
                &[
                    "Everything in Professional",
                    "Unlimited users and projects",
                    "Custom integrations",
                    "Dedicated support",
                    "SSO integration",
                    "Advanced analytics",
                    "Custom reporting",
                    "White-label dashboard",
                ],
                false,
                -1,
                -1,
            ),
        ])
    }

    pub fn plans(&self) -> &[SubscriptionPlan] {
        &self.plans
    }

    pub fn find(&self, plan_id: &str) -> Option<&SubscriptionPlan> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn plan(
    id: &str,
    name: &str,
    description: &str,
    price: f64,
    features: &[&str],
    is_popular: bool,
    max_users: i32,
    max_projects: i32,
) -> SubscriptionPlan {
    SubscriptionPlan {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        price,
        currency: "USD".to_string(),
        interval: BillingInterval::Month,
        features: features.iter().map(|f| f.to_string()).collect(),
        is_popular,
        max_users,
        max_projects,
    }
}
