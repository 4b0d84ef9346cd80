use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::BillingInterval;

/// Generates a subscription id of the form `sub_<hash>_<unix seconds>`.
///
/// The hash covers user, plan, the timestamp and a random nonce, so two calls
/// in the same second still produce different ids.
pub fn generate_subscription_id(user_id: &str, plan_id: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.timestamp();
    let combined = format!(
        "{}_{}_{}_{}",
        user_id,
        plan_id,
        at.timestamp_nanos_opt().unwrap_or(timestamp),
        Uuid::new_v4()
    );
    let digest = format!("{:x}", md5::compute(combined.as_bytes()));

    format!("sub_{}_{}", &digest[..8], timestamp)
}

/// End of the billing period that starts at `start`.
pub fn period_end(start: DateTime<Utc>, interval: BillingInterval) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(interval.months()))
        .unwrap_or_else(|| start + Duration::days(30 * i64::from(interval.months())))
}

pub fn format_currency(amount: f64, currency: &str) -> String {
    let code = currency.to_uppercase();
    let symbol = match code.as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "THB" => Some("฿"),
        _ => None,
    };

    match symbol {
        Some(symbol) => format!("{}{:.2}", symbol, amount),
        None => format!("{:.2} {}", amount, code),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEffective {
    Immediate,
    NextPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProrationQuote {
    pub proration_amount: f64,
    pub credit_amount: f64,
    pub immediate_charge: f64,
    pub remaining_days: i64,
    pub current_period_end: DateTime<Utc>,
    pub next_billing_date: DateTime<Utc>,
    pub change_effective: ChangeEffective,
}

/// Prices a switch from the current plan to a new one.
///
/// Unused time on the current plan is credited at a 30-day month; a period
/// that has already ended earns no credit.
pub fn calculate_proration(
    current_monthly_price: f64,
    new_monthly_price: f64,
    current_period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ProrationQuote {
    let next_billing_date = current_period_end + Duration::days(30);
    let remaining = current_period_end - now;

    if remaining.num_days() <= 0 {
        return ProrationQuote {
            proration_amount: 0.0,
            credit_amount: 0.0,
            immediate_charge: round2(new_monthly_price),
            remaining_days: 0,
            current_period_end,
            next_billing_date,
            change_effective: ChangeEffective::Immediate,
        };
    }

    let remaining_days = remaining.num_seconds() as f64 / 86_400.0;
    let credit_amount = current_monthly_price * (remaining_days / 30.0);
    let proration_amount = new_monthly_price - credit_amount;
    let change_effective = if proration_amount > 0.0 {
        ChangeEffective::NextPeriod
    } else {
        ChangeEffective::Immediate
    };

    ProrationQuote {
        proration_amount: round2(proration_amount),
        credit_amount: round2(credit_amount),
        immediate_charge: round2(new_monthly_price),
        remaining_days: remaining_days.round() as i64,
        current_period_end,
        next_billing_date,
        change_effective,
    }
}

/// Price normalised to one month of the given billing interval.
pub fn monthly_equivalent(price: f64, interval: BillingInterval) -> f64 {
    price / f64::from(interval.months())
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
