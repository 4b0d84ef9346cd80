use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const SERVICE_NAME: &str = "AEGIS FIT Backend";

/// Process-level health information, created once at startup.
#[derive(Debug, Clone)]
pub struct HealthService {
    started: Instant,
    started_at: DateTime<Utc>,
    service_name: String,
    version: String,
    environment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub uptime_human: String,
    pub environment: String,
    pub checks: Value,
}

impl HealthService {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            service_name: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn report(&self, payments_configured: bool) -> HealthReport {
        let uptime = self.uptime();

        HealthReport {
            status: "healthy",
            service: self.service_name.clone(),
            version: self.version.clone(),
            timestamp: Utc::now(),
            started_at: self.started_at,
            uptime_seconds: uptime.as_secs(),
            uptime_human: format_uptime(uptime),
            environment: self.environment.clone(),
            checks: json!({
                "catalog": "healthy",
                "payment_provider": if payments_configured { "configured" } else { "not_configured" },
            }),
        }
    }
}

/// Renders an uptime as `H:MM:SS`, prefixed with whole days when there are any.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    match days {
        0 => format!("{}:{:02}:{:02}", hours, minutes, seconds),
        1 => format!("1 day, {}:{:02}:{:02}", hours, minutes, seconds),
        n => format!("{} days, {}:{:02}:{:02}", n, hours, minutes, seconds),
    }
}
