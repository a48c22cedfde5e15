// storefront/src/models/order.rs

use crate::models::cart::LineItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Completed,
  Failed,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_code: String,
  pub user_id: Uuid,
  pub user_email: String,
  pub items: Vec<LineItem>,
  pub amount: Decimal,
  pub shipping: Decimal,
  pub discount: Decimal,
  pub coupon_code: Option<String>,
  pub country: Option<String>,
  pub currency: String,
  pub payment_intent_id: Option<String>,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// `ORD-` followed by eight upper-case hex characters.
  pub fn generate_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", hex[..8].to_uppercase())
  }
}

/// Checkout payload for `POST /orders` and `POST /orders/failed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
  #[serde(default)]
  pub items: Vec<LineItem>,
  #[serde(alias = "totalAmount")]
  pub amount: Option<Decimal>,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default, alias = "paymentIntentId")]
  pub payment_id: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub shipping: Option<Decimal>,
  #[serde(default, alias = "couponCode")]
  pub coupon: Option<String>,
  #[serde(default, alias = "selectedCountry")]
  pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusUpdate {
  pub status: OrderStatus,
}
