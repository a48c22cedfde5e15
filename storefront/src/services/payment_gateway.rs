// storefront/src/services/payment_gateway.rs

//! Payment gateway seam and the Stripe-compatible HTTP implementation.

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
  RequiresPaymentMethod,
  RequiresConfirmation,
  RequiresAction,
  Processing,
  RequiresCapture,
  Canceled,
  Succeeded,
  #[serde(other)]
  Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
  pub id: String,
  pub amount: i64,
  pub currency: String,
  pub status: IntentStatus,
  #[serde(default)]
  pub client_secret: Option<String>,
}

/// Webhook event envelope. Only the fields routing needs are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
  pub id: String,
  #[serde(rename = "type")]
  pub event_type: String,
  pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
  pub object: GatewayEventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventObject {
  pub id: String,
  #[serde(default)]
  pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Fixed label recorded on transactions, e.g. `stripe`.
  fn method_name(&self) -> &'static str;

  async fn create_intent(&self, amount_minor: i64, currency: &str) -> AppResult<PaymentIntent>;

  async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;
}

pub struct StripeGateway {
  client: reqwest::Client,
  api_base: String,
  secret_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorEnvelope {
  #[serde(default)]
  error: StripeErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorBody {
  #[serde(default)]
  message: Option<String>,
}

impl StripeGateway {
  pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build payment HTTP client: {}", e)))?;
    Ok(Self {
      client,
      api_base: api_base.into(),
      secret_key: secret_key.into(),
    })
  }

  async fn decode(response: reqwest::Response) -> AppResult<PaymentIntent> {
    let status = response.status();
    if status.is_success() {
      return response
        .json::<PaymentIntent>()
        .await
        .map_err(|e| AppError::Gateway(format!("Unreadable payment intent response: {}", e)));
    }
    let envelope = response.json::<StripeErrorEnvelope>().await.unwrap_or_default();
    let message = envelope
      .error
      .message
      .unwrap_or_else(|| format!("Payment provider responded with {}", status));
    warn!(status = status.as_u16(), error = %message, "Payment provider rejected request.");
    Err(AppError::Gateway(message))
  }
}

fn ensure_intent_id(intent_id: &str) -> AppResult<()> {
  let valid = !intent_id.is_empty() && intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(AppError::Validation(format!("Invalid payment intent id '{}'", intent_id)))
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  fn method_name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "stripe::create_intent", skip(self), err(Display))]
  async fn create_intent(&self, amount_minor: i64, currency: &str) -> AppResult<PaymentIntent> {
    let form = [
      ("amount", amount_minor.to_string()),
      ("currency", currency.to_string()),
      ("automatic_payment_methods[enabled]", "true".to_string()),
    ];
    let response = self
      .client
      .post(format!("{}/v1/payment_intents", self.api_base))
      .bearer_auth(&self.secret_key)
      .form(&form)
      .send()
      .await
      .map_err(|e| AppError::Gateway(e.to_string()))?;
    let intent = Self::decode(response).await?;
    debug!(payment_intent_id = %intent.id, "Payment intent created.");
    Ok(intent)
  }

  #[instrument(name = "stripe::retrieve_intent", skip(self), err(Display))]
  async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
    ensure_intent_id(intent_id)?;
    let response = self
      .client
      .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| AppError::Gateway(e.to_string()))?;
    Self::decode(response).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_statuses_decode_as_unknown() {
    let intent: PaymentIntent =
      serde_json::from_str(r#"{"id":"pi_1","amount":100,"currency":"aud","status":"something_new"}"#).unwrap();
    assert_eq!(intent.status, IntentStatus::Unknown);
    assert_eq!(intent.client_secret, None);
  }

  #[test]
  fn intent_ids_are_restricted_to_path_safe_characters() {
    assert!(ensure_intent_id("pi_3Nx9abc").is_ok());
    assert!(ensure_intent_id("pi_1/../../charges").is_err());
    assert!(ensure_intent_id("").is_err());
  }
}
