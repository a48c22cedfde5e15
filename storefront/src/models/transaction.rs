// storefront/src/models/transaction.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  Pending,
  Completed,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: Uuid,
  pub order_id: Uuid,
  pub user_id: Uuid,
  pub amount: Decimal,
  pub currency: String,
  pub payment_method: String,
  pub payment_intent_id: Option<String>,
  pub status: TransactionStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
