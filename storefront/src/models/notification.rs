// storefront/src/models/notification.rs

use crate::models::cart::LineItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  OrderConfirmation,
  AdminOrderNotice,
  FailedOrderNotice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "delivery_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
  Pending,
  Delivered,
  Dead,
}

/// Everything needed to render the email without reading the order again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
  pub order_code: String,
  pub customer_email: String,
  pub items: Vec<LineItem>,
  pub amount: Decimal,
  pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
  pub id: Uuid,
  pub order_id: Uuid,
  pub kind: NotificationKind,
  pub recipient: String,
  pub payload: Json<NotificationPayload>,
  pub state: DeliveryState,
  pub attempts: i32,
  pub next_attempt_at: DateTime<Utc>,
  pub last_error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
  pub fn new(
    order_id: Uuid,
    kind: NotificationKind,
    recipient: impl Into<String>,
    payload: NotificationPayload,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      kind,
      recipient: recipient.into(),
      payload: Json(payload),
      state: DeliveryState::Pending,
      attempts: 0,
      next_attempt_at: now,
      last_error: None,
      created_at: now,
      delivered_at: None,
    }
  }

  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    self.state == DeliveryState::Pending && self.next_attempt_at <= now
  }
}
