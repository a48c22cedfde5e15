// storefront/src/services/email_mock.rs
use crate::errors::{AppError, Result as AppResult};
use crate::services::mailer::{Mailer, OutboundEmail};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Logs each message instead of sending it and keeps a copy for inspection.
#[derive(Default)]
pub struct LogMailer {
  sent: Mutex<Vec<OutboundEmail>>,
  failing_recipients: Mutex<HashSet<String>>,
  fail_next: AtomicUsize,
}

impl LogMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn sent(&self) -> Vec<OutboundEmail> {
    self.sent.lock().clone()
  }

  /// Makes the next `count` sends fail, whatever the recipient.
  pub fn fail_next(&self, count: usize) {
    self.fail_next.store(count, Ordering::SeqCst);
  }

  /// Makes every send to `recipient` fail until cleared.
  pub fn fail_recipient(&self, recipient: &str) {
    self.failing_recipients.lock().insert(recipient.to_string());
  }

  pub fn clear_failures(&self) {
    self.fail_next.store(0, Ordering::SeqCst);
    self.failing_recipients.lock().clear();
  }
}

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, email: &OutboundEmail) -> AppResult<String> {
    let forced = self
      .fail_next
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if forced || self.failing_recipients.lock().contains(&email.to) {
      warn!(to = %email.to, subject = %email.subject, "Simulated email failure.");
      return Err(AppError::Mail("Simulated email send failure".to_string()));
    }

    let message_id = format!("log_email_{}", uuid::Uuid::new_v4());
    info!(
      to = %email.to,
      from = %email.from_email,
      subject = %email.subject,
      message_id = %message_id,
      "Email logged instead of sent."
    );
    self.sent.lock().push(email.clone());
    Ok(message_id)
  }
}
