// storefront/src/models/coupon.rs

use crate::errors::{AppError, Result};
use crate::pricing::round_money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "discount_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
  Percentage,
  Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
  pub id: Uuid,
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  pub min_purchase: Decimal,
  pub expiry_date: Option<DateTime<Utc>>,
  pub usage_limit: i32,
  pub used_by: Vec<Uuid>,
  pub created_at: DateTime<Utc>,
}

/// Why a coupon cannot be applied. Rendered verbatim as the client-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
  NotFound { code: String },
  Expired,
  BelowMinimum { min_purchase: Decimal },
  UsageLimitReached,
  AlreadyRedeemed,
  NotRedeemed { code: String },
}

impl fmt::Display for CouponRejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CouponRejection::NotFound { code } => write!(f, "Coupon not found with code: {}", code),
      CouponRejection::Expired => write!(f, "Coupon has expired"),
      CouponRejection::BelowMinimum { min_purchase } => {
        write!(f, "Minimum purchase of ${:.2} required", min_purchase)
      }
      CouponRejection::UsageLimitReached => write!(f, "Coupon usage limit reached"),
      CouponRejection::AlreadyRedeemed => write!(f, "You have already used this coupon"),
      CouponRejection::NotRedeemed { code } => {
        write!(f, "Coupon {} has not been applied to this account", code)
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountQuote {
  pub discount: Decimal,
  pub final_amount: Decimal,
}

/// Trimmed, upper-cased form used for storage and lookup.
pub fn normalize_code(code: &str) -> String {
  code.trim().to_uppercase()
}

impl Coupon {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expiry_date.is_some_and(|expiry| expiry < now)
  }

  pub fn is_exhausted(&self) -> bool {
    self.used_by.len() as i64 >= i64::from(self.usage_limit)
  }

  pub fn is_redeemed_by(&self, user_id: Uuid) -> bool {
    self.used_by.contains(&user_id)
  }

  /// Terms that do not depend on who is asking: expiry, then minimum purchase.
  pub fn check_general_terms(&self, total: Decimal, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    if self.is_expired(now) {
      return Err(CouponRejection::Expired);
    }
    if total < self.min_purchase {
      return Err(CouponRejection::BelowMinimum {
        min_purchase: self.min_purchase,
      });
    }
    Ok(())
  }

  /// Full redemption check. The first failing rule wins.
  pub fn check_terms(&self, user_id: Uuid, total: Decimal, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    self.check_general_terms(total, now)?;
    self.check_redeemable_by(user_id, now)
  }

  /// The subset of `check_terms` the atomic redemption update enforces.
  pub fn check_redeemable_by(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    if self.is_expired(now) {
      return Err(CouponRejection::Expired);
    }
    if self.is_exhausted() {
      return Err(CouponRejection::UsageLimitReached);
    }
    if self.is_redeemed_by(user_id) {
      return Err(CouponRejection::AlreadyRedeemed);
    }
    Ok(())
  }

  /// Discount rounded to cents and capped at `total`.
  pub fn discount_for(&self, total: Decimal) -> DiscountQuote {
    let total = total.max(Decimal::ZERO);
    let raw = match self.discount_type {
      DiscountType::Percentage => total
        .checked_mul(self.discount_value)
        .map(|scaled| scaled / Decimal::ONE_HUNDRED)
        .or_else(|| (total / Decimal::ONE_HUNDRED).checked_mul(self.discount_value))
        .unwrap_or(total),
      DiscountType::Fixed => self.discount_value,
    };
    let discount = round_money(raw).max(Decimal::ZERO).min(total);
    DiscountQuote {
      discount,
      final_amount: total - discount,
    }
  }

  pub fn from_draft(draft: CouponDraft, now: DateTime<Utc>) -> Result<Self> {
    draft.validate()?;
    Ok(Self {
      id: Uuid::new_v4(),
      code: normalize_code(&draft.code),
      discount_type: draft.discount_type,
      discount_value: draft.discount_value,
      min_purchase: draft.min_purchase.unwrap_or(Decimal::ZERO),
      expiry_date: draft.expiry_date,
      usage_limit: draft.usage_limit,
      used_by: Vec::new(),
      created_at: now,
    })
  }

  /// Replaces the coupon's terms. `used_by` is left untouched.
  pub fn apply_draft(&mut self, draft: CouponDraft) -> Result<()> {
    draft.validate()?;
    self.code = normalize_code(&draft.code);
    self.discount_type = draft.discount_type;
    self.discount_value = draft.discount_value;
    self.min_purchase = draft.min_purchase.unwrap_or(Decimal::ZERO);
    self.expiry_date = draft.expiry_date;
    self.usage_limit = draft.usage_limit;
    Ok(())
  }

  pub fn summary(&self) -> CouponSummary {
    CouponSummary {
      code: self.code.clone(),
      discount_type: self.discount_type,
      discount_value: self.discount_value,
      min_purchase: self.min_purchase,
      expiry_date: self.expiry_date,
    }
  }
}

/// Public view of a coupon, without its redemption list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponSummary {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  pub min_purchase: Decimal,
  pub expiry_date: Option<DateTime<Utc>>,
}

/// Admin input for creating or replacing a coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDraft {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  #[serde(default)]
  pub min_purchase: Option<Decimal>,
  #[serde(default)]
  pub expiry_date: Option<DateTime<Utc>>,
  pub usage_limit: i32,
}

impl CouponDraft {
  fn validate(&self) -> Result<()> {
    if normalize_code(&self.code).is_empty() {
      return Err(AppError::Validation("Coupon code is required".to_string()));
    }
    match self.discount_type {
      DiscountType::Percentage if self.discount_value <= Decimal::ZERO || self.discount_value > Decimal::ONE_HUNDRED => {
        return Err(AppError::Validation(
          "Percentage discounts must be greater than 0 and at most 100".to_string(),
        ));
      }
      DiscountType::Fixed if self.discount_value <= Decimal::ZERO => {
        return Err(AppError::Validation("Fixed discounts must be greater than 0".to_string()));
      }
      _ => {}
    }
    if self.usage_limit < 1 {
      return Err(AppError::Validation("Usage limit must be at least 1".to_string()));
    }
    if self.min_purchase.is_some_and(|min| min < Decimal::ZERO) {
      return Err(AppError::Validation("Minimum purchase cannot be negative".to_string()));
    }
    Ok(())
  }
}
