//! Expiry extraction from unverified JWT payloads
//!
//! The token comes straight from the IAM Credentials API, so only the `exp`
//! claim is read; the signature is not checked.

use crate::error::{ProviderError, ProviderResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<serde_json::Number>,
}

/// Expiry instant of `jwt`
pub fn expires_at(jwt: &str) -> ProviderResult<DateTime<Utc>> {
    let mut segments = jwt.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(ProviderError::Decode(
                "token is not a three-segment JWT".to_string(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ProviderError::Decode(format!("invalid JWT payload encoding: {}", e)))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::Decode(format!("invalid JWT claims: {}", e)))?;

    let exp = claims
        .exp
        .ok_or_else(|| ProviderError::Decode("JWT has no exp claim".to_string()))?;
    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or_else(|| ProviderError::Decode(format!("exp claim out of range: {}", exp)))?;

    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ProviderError::Decode(format!("exp claim out of range: {}", seconds)))
}

/// Time left before `jwt` expires, zero if it already has
pub fn time_until_expiry(jwt: &str, now: DateTime<Utc>) -> ProviderResult<Duration> {
    let remaining = expires_at(jwt)? - now;
    Ok(remaining.to_std().unwrap_or(Duration::ZERO))
}
