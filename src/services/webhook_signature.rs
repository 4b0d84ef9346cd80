use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    MalformedHeader,
    #[error("No v1 signature found in header")]
    NoSignatures,
    #[error("Timestamp outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("No signature matches the payload")]
    Mismatch,
}

/// Verifies a `stripe-signature` header of the form `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// The signed content is `"<t>.<payload>"` under HMAC-SHA256 keyed with the
/// webhook secret. Any one matching `v1` entry is enough.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                )
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }
    if tolerance_secs > 0 {
        // Untrusted timestamps may sit anywhere in the i64 range
        let within = now
            .checked_sub(timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|age| age <= tolerance_secs.unsigned_abs());
        if !within {
            return Err(SignatureError::TimestampOutOfTolerance);
        }
    }

    let mac = signed_mac(payload, secret, timestamp);
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|expected| mac.clone().verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Builds a header value the way the provider does. Used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = hex::encode(signed_mac(payload, secret, timestamp).finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}
