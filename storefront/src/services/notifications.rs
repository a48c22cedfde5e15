// storefront/src/services/notifications.rs

//! Outbox message construction, email rendering, and the background worker
//! that delivers due messages with exponential backoff.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{NotificationKind, NotificationPayload, Order, OutboxMessage};
use crate::services::mailer::{Mailer, OutboundEmail};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: i32,
  pub base_backoff: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      base_backoff: Duration::from_secs(30),
      max_backoff: Duration::from_secs(3600),
    }
  }
}

impl RetryPolicy {
  /// `min(base * 2^(attempts - 1), max)` for a message that has failed `attempts` times.
  pub fn delay_after(&self, attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
    self
      .base_backoff
      .checked_mul(1u32 << exponent)
      .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
  }
}

#[derive(Debug, Clone)]
pub struct MailSender {
  pub email: String,
  pub name: String,
}

fn payload_for(order: &Order) -> NotificationPayload {
  NotificationPayload {
    order_code: order.order_code.clone(),
    customer_email: order.user_email.clone(),
    items: order.items.clone(),
    amount: order.amount,
    currency: order.currency.clone(),
  }
}

/// Customer confirmation plus the back-office notice for a placed order.
pub fn order_placed_messages(order: &Order, admin_email: &str, now: DateTime<Utc>) -> Vec<OutboxMessage> {
  let payload = payload_for(order);
  vec![
    OutboxMessage::new(order.id, NotificationKind::OrderConfirmation, &order.user_email, payload.clone(), now),
    OutboxMessage::new(order.id, NotificationKind::AdminOrderNotice, admin_email, payload, now),
  ]
}

pub fn order_failed_messages(order: &Order, now: DateTime<Utc>) -> Vec<OutboxMessage> {
  vec![OutboxMessage::new(
    order.id,
    NotificationKind::FailedOrderNotice,
    &order.user_email,
    payload_for(order),
    now,
  )]
}

pub fn render_email(message: &OutboxMessage, sender: &MailSender) -> OutboundEmail {
  let payload = &message.payload.0;
  let mut items = String::new();
  for item in &payload.items {
    let line_total = item
      .line_total()
      .map_or_else(|| "-".to_string(), |total| format!("${:.2}", total));
    let _ = write!(items, "<li>{} × {}: {}</li>", escape_html(&item.name), item.qty, line_total);
  }
  let total = format!("${:.2} {}", payload.amount, payload.currency.to_uppercase());

  let (subject, html) = match message.kind {
    NotificationKind::OrderConfirmation => (
      format!("Order Confirmation - {}", payload.order_code),
      format!(
        "<h1>Thank you for your order!</h1><p>Order <strong>{}</strong> has been received.</p><ul>{}</ul><p>Total: {}</p>",
        payload.order_code, items, total
      ),
    ),
    NotificationKind::AdminOrderNotice => (
      format!("New Order Received - {}", payload.order_code),
      format!(
        "<h1>New order {}</h1><p>Customer: {}</p><ul>{}</ul><p>Total: {}</p>",
        payload.order_code,
        escape_html(&payload.customer_email),
        items,
        total
      ),
    ),
    NotificationKind::FailedOrderNotice => (
      format!("Payment Failed - {}", payload.order_code),
      format!(
        "<h1>Your payment did not go through</h1><p>We could not complete payment for order <strong>{}</strong>. No charge was made.</p><ul>{}</ul><p>Total: {}</p>",
        payload.order_code, items, total
      ),
    ),
  };

  OutboundEmail {
    from_email: sender.email.clone(),
    from_name: sender.name.clone(),
    to: message.recipient.clone(),
    subject,
    html,
  }
}

fn escape_html(raw: &str) -> String {
  raw
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub claimed: usize,
  pub delivered: usize,
  pub rescheduled: usize,
  pub dead: usize,
}

pub struct NotificationDispatcher {
  store: Arc<dyn Store>,
  mailer: Arc<dyn Mailer>,
  sender: MailSender,
  policy: RetryPolicy,
  lease: Duration,
  batch_size: usize,
}

impl NotificationDispatcher {
  pub fn new(
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    sender: MailSender,
    policy: RetryPolicy,
    batch_size: usize,
  ) -> Self {
    Self {
      store,
      mailer,
      sender,
      policy,
      lease: Duration::from_secs(120),
      batch_size,
    }
  }

  /// Claims due messages and attempts each once.
  #[instrument(name = "notifications::dispatch_due", skip(self), err(Display))]
  pub async fn dispatch_due(&self, now: DateTime<Utc>) -> AppResult<DispatchReport> {
    let claimed = self.store.claim_due_messages(now, self.lease, self.batch_size).await?;
    let mut report = DispatchReport {
      claimed: claimed.len(),
      ..Default::default()
    };

    for message in claimed {
      let email = render_email(&message, &self.sender);
      match self.mailer.send(&email).await {
        Ok(message_id) => {
          self.store.mark_delivered(message.id, Utc::now()).await?;
          debug!(outbox_id = %message.id, %message_id, kind = ?message.kind, "Notification delivered.");
          report.delivered += 1;
        }
        Err(e) => {
          let attempts = message.attempts + 1;
          let reason = e.to_string();
          if attempts >= self.policy.max_attempts {
            self.store.mark_dead(message.id, attempts, &reason).await?;
            error!(outbox_id = %message.id, attempts, error = %reason, "Notification abandoned.");
            report.dead += 1;
          } else {
            let delay = self.policy.delay_after(attempts);
            let next_attempt_at = now
              + chrono::Duration::from_std(delay).map_err(|e| AppError::Internal(format!("Backoff out of range: {}", e)))?;
            self
              .store
              .reschedule_message(message.id, attempts, next_attempt_at, &reason)
              .await?;
            warn!(
              outbox_id = %message.id,
              attempts,
              retry_in_secs = delay.as_secs(),
              error = %reason,
              "Notification delivery failed; rescheduled."
            );
            report.rescheduled += 1;
          }
        }
      }
    }
    Ok(report)
  }

  /// Polls until `shutdown` flips to true or its sender is dropped.
  pub async fn run(self, wake: Arc<Notify>, mut shutdown: watch::Receiver<bool>, poll_interval: Duration) {
    info!(poll_secs = poll_interval.as_secs(), "Notification dispatcher started.");
    loop {
      match self.dispatch_due(Utc::now()).await {
        Ok(report) if report.claimed > 0 => info!(?report, "Notification batch processed."),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Notification batch failed."),
      }

      tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        _ = wake.notified() => debug!("Notification dispatcher woken early."),
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }
    info!("Notification dispatcher stopped.");
  }
}
