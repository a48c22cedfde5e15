// storefront/src/services/webhook_signature.rs

//! Gateway webhook signatures: `t=<unix>,v1=<hex hmac-sha256 of "{t}.{body}">`.

use crate::errors::{AppError, Result as AppResult};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[instrument(name = "webhook_signature::verify", skip_all, err(Display))]
pub fn verify(payload: &[u8], header: &str, secret: &str, tolerance: Duration, now: DateTime<Utc>) -> AppResult<()> {
  let mut timestamp: Option<i64> = None;
  let mut candidates: Vec<&str> = Vec::new();
  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("t", value)) => timestamp = value.parse().ok(),
      Some(("v1", value)) => candidates.push(value),
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or_else(|| AppError::Auth("Malformed signature header".to_string()))?;
  if candidates.is_empty() {
    return Err(AppError::Auth("Signature header carries no v1 signature".to_string()));
  }
  let age = now.timestamp().saturating_sub(timestamp).unsigned_abs();
  if age > tolerance.as_secs() {
    return Err(AppError::Auth("Signature timestamp outside tolerance".to_string()));
  }

  for candidate in candidates {
    let Ok(expected) = hex::decode(candidate) else {
      continue;
    };
    let mut mac = keyed_mac(secret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    if mac.verify_slice(&expected).is_ok() {
      debug!("Webhook signature verified.");
      return Ok(());
    }
  }
  Err(AppError::Auth("Webhook signature verification failed".to_string()))
}

/// Header value a gateway would send for `payload` at `timestamp`.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> AppResult<String> {
  let mut mac = keyed_mac(secret)?;
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(payload);
  Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

fn keyed_mac(secret: &str) -> AppResult<HmacSha256> {
  HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Internal(format!("Invalid webhook key: {}", e)))
}
