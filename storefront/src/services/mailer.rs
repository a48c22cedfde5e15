// storefront/src/services/mailer.rs

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
  pub from_email: String,
  pub from_name: String,
  pub to: String,
  pub subject: String,
  pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  /// Hands the message to the relay and returns its message id.
  async fn send(&self, email: &OutboundEmail) -> AppResult<String>;
}

/// Brevo transactional email API (`POST /v3/smtp/email`).
pub struct BrevoMailer {
  client: reqwest::Client,
  api_base: String,
  api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendResponse {
  message_id: String,
}

impl BrevoMailer {
  pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build mail HTTP client: {}", e)))?;
    Ok(Self {
      client,
      api_base: api_base.into(),
      api_key: api_key.into(),
    })
  }
}

#[async_trait]
impl Mailer for BrevoMailer {
  #[instrument(name = "brevo::send", skip(self, email), fields(to = %email.to, subject = %email.subject), err(Display))]
  async fn send(&self, email: &OutboundEmail) -> AppResult<String> {
    let body = json!({
      "sender": { "name": email.from_name, "email": email.from_email },
      "to": [{ "email": email.to }],
      "subject": email.subject,
      "htmlContent": email.html,
    });
    let response = self
      .client
      .post(format!("{}/v3/smtp/email", self.api_base))
      .header("api-key", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| AppError::Mail(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(AppError::Mail(format!("relay responded with {}: {}", status, detail)));
    }
    let sent = response
      .json::<BrevoSendResponse>()
      .await
      .map_err(|e| AppError::Mail(format!("Unreadable relay response: {}", e)))?;
    info!(message_id = %sent.message_id, "Email accepted by relay.");
    Ok(sent.message_id)
  }
}
