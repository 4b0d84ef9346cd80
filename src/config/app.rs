use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

const DEFAULT_SECRET_KEY: &str = "aegis-fit-2024-super-secret-jwt-key";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,https://aegis-fit.vercel.app";
const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => bail!(
                "ENVIRONMENT must be one of: development, staging, production (got '{}')",
                other
            ),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level as accepted in `LOG_LEVEL`, normalised to upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => bail!(
                "LOG_LEVEL must be one of: DEBUG, INFO, WARNING, ERROR, CRITICAL (got '{}')",
                other
            ),
        }
    }
}

/// Stripe API credentials. Present only when the secret key is set.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub per_minute: u32,
}

/// Application configuration, loaded once at startup and shared read-only.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_level: LogLevel,
    pub structured_logging: bool,
    pub debug: bool,
    pub secret_key: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub stripe: Option<StripeConfig>,
    pub stripe_publishable_key: Option<String>,
    /// Read on its own so webhooks are verified even without API access.
    pub stripe_webhook_secret: Option<String>,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub smtp: SmtpConfig,
    pub rate_limit: RateLimitSettings,
    pub security_headers_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 8000u16)?;
        let environment: Environment = var_or("ENVIRONMENT", "development").parse()?;
        let log_level: LogLevel = var_or("LOG_LEVEL", "INFO").parse()?;
        let structured_logging = parse_bool_var("STRUCTURED_LOGGING", true)?;
        let debug = parse_bool_var("DEBUG", false)?;
        let secret_key = var_or("SECRET_KEY", DEFAULT_SECRET_KEY);
        let cors_origins = parse_origins(&var_or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS));
        let database_url = var_or("DATABASE_URL", "sqlite:///./aegis_fit.db");

        // Stripe configuration (optional)
        let stripe = optional_var("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            api_base: var_or("STRIPE_API_BASE", "https://api.stripe.com"),
        });
        let stripe_publishable_key = optional_var("STRIPE_PUBLISHABLE_KEY");
        let stripe_webhook_secret = optional_var("STRIPE_WEBHOOK_SECRET");

        let checkout_success_url = var_or(
            "CHECKOUT_SUCCESS_URL",
            "http://localhost:3000/subscription/success",
        );
        let checkout_cancel_url = var_or(
            "CHECKOUT_CANCEL_URL",
            "http://localhost:3000/subscription/cancel",
        );

        let smtp = SmtpConfig {
            host: optional_var("SMTP_HOST"),
            port: parse_var("SMTP_PORT", 587u16)?,
            username: optional_var("SMTP_USERNAME"),
            password: optional_var("SMTP_PASSWORD"),
        };

        let rate_limit = RateLimitSettings {
            enabled: parse_bool_var("RATE_LIMITING_ENABLED", false)?,
            per_minute: parse_var("RATE_LIMIT_PER_MINUTE", 100u32)?,
        };
        let security_headers_enabled = parse_bool_var("SECURITY_HEADERS_ENABLED", true)?;

        let config = AppConfig {
            host,
            port,
            environment,
            log_level,
            structured_logging,
            debug,
            secret_key,
            cors_origins,
            database_url,
            stripe,
            stripe_publishable_key,
            stripe_webhook_secret,
            checkout_success_url,
            checkout_cancel_url,
            smtp,
            rate_limit,
            security_headers_enabled,
        };
        config.validate()?;

        Ok(config)
    }

    /// Checks the cross-field rules that a single variable parse cannot.
    pub fn validate(&self) -> Result<()> {
        if self.secret_key.len() < MIN_SECRET_KEY_LEN {
            bail!(
                "SECRET_KEY must be at least {} characters long",
                MIN_SECRET_KEY_LEN
            );
        }
        if self.cors_origins.is_empty() {
            bail!("CORS_ORIGINS must list at least one origin");
        }
        if self.rate_limit.enabled && self.rate_limit.per_minute == 0 {
            bail!("RATE_LIMIT_PER_MINUTE must be greater than zero");
        }

        if let Some(stripe) = &self.stripe {
            if !stripe.secret_key.starts_with("sk_") {
                bail!("STRIPE_SECRET_KEY must start with 'sk_'");
            }
        }
        if let Some(key) = &self.stripe_publishable_key {
            if !key.starts_with("pk_") {
                bail!("STRIPE_PUBLISHABLE_KEY must start with 'pk_'");
            }
        }
        if let Some(secret) = &self.stripe_webhook_secret {
            if !secret.starts_with("whsec_") {
                bail!("STRIPE_WEBHOOK_SECRET must start with 'whsec_'");
            }
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_staging(&self) -> bool {
        self.environment == Environment::Staging
    }

    /// All three Stripe values are present.
    pub fn is_stripe_configured(&self) -> bool {
        self.stripe.is_some()
            && self.stripe_publishable_key.is_some()
            && self.stripe_webhook_secret.is_some()
    }

    pub fn is_email_configured(&self) -> bool {
        self.smtp.host.is_some() && self.smtp.username.is_some() && self.smtp.password.is_some()
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.stripe_webhook_secret.as_deref()
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    /// Development defaults with no optional integrations configured.
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Development,
            log_level: LogLevel::Info,
            structured_logging: true,
            debug: false,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            cors_origins: parse_origins(DEFAULT_CORS_ORIGINS),
            database_url: "sqlite:///./aegis_fit.db".to_string(),
            stripe: None,
            stripe_publishable_key: None,
            stripe_webhook_secret: None,
            checkout_success_url: "http://localhost:3000/subscription/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/subscription/cancel".to_string(),
            smtp: SmtpConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                per_minute: 100,
            },
            security_headers_enabled: true,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("debug", &self.debug)
            .field("cors_origins", &self.cors_origins)
            .field("stripe", &self.stripe)
            .field("stripe_publishable_key", &self.stripe_publishable_key.is_some())
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.is_some())
            .field("smtp", &self.smtp)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings(environment={}, debug={}, cors_origins={} origins, stripe_configured={}, email_configured={})",
            self.environment,
            self.debug,
            self.cors_origins.len(),
            self.is_stripe_configured(),
            self.is_email_configured()
        )
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{} must be a boolean (got '{}')", key, raw),
        },
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
