use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});

const MAX_IDENTIFIER_LEN: usize = 255;

/// Email validation
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(anyhow!("Email cannot be empty"));
    }

    if email.len() > MAX_IDENTIFIER_LEN {
        return Err(anyhow!("Email cannot be longer than 255 characters"));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(anyhow!("Invalid email format"));
    }

    Ok(())
}

/// User identifiers are opaque but must be present and bounded.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(anyhow!("User ID is required"));
    }

    if user_id.len() > MAX_IDENTIFIER_LEN {
        return Err(anyhow!("User ID cannot be longer than 255 characters"));
    }

    Ok(())
}

/// Plan identifiers are compared trimmed and lower-cased.
pub fn normalize_plan_id(plan_id: &str) -> Result<String> {
    let normalized = plan_id.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(anyhow!("Plan ID is required"));
    }
    Ok(normalized)
}
