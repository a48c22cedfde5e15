// storefront/src/pricing.rs

//! Server-side checkout arithmetic: subtotal, coupon discount, shipping and
//! the charged total, plus the conversion to gateway minor units.

use crate::errors::{AppError, Result};
use crate::models::cart::Cart;
use crate::models::coupon::Coupon;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Largest accepted difference between a client-supplied amount and the server's.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone)]
pub struct ShippingPolicy {
  pub free_threshold: Decimal,
  pub domestic_fee: Decimal,
  pub international_fee: Decimal,
  pub domestic_countries: Vec<String>,
}

impl Default for ShippingPolicy {
  fn default() -> Self {
    Self {
      free_threshold: Decimal::new(149, 0),
      domestic_fee: Decimal::new(1195, 2),
      international_fee: Decimal::new(15, 0),
      domestic_countries: vec!["Australia".to_string(), "New Zealand".to_string()],
    }
  }
}

impl ShippingPolicy {
  pub fn is_domestic(&self, country: Option<&str>) -> bool {
    country
      .map(str::trim)
      .is_some_and(|c| self.domestic_countries.iter().any(|d| d.eq_ignore_ascii_case(c)))
  }

  /// Fee for a merchandise total that already has the discount taken off.
  pub fn fee_for(&self, country: Option<&str>, merchandise_total: Decimal) -> Decimal {
    if !self.is_domestic(country) {
      return self.international_fee;
    }
    if merchandise_total >= self.free_threshold {
      Decimal::ZERO
    } else {
      self.domestic_fee
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
  pub subtotal: Decimal,
  pub discount: Decimal,
  pub shipping: Decimal,
  pub total: Decimal,
}

/// Fails with a validation error when the cart's arithmetic leaves `Decimal` range.
pub fn price_checkout(
  cart: &Cart,
  coupon: Option<&Coupon>,
  country: Option<&str>,
  policy: &ShippingPolicy,
) -> Result<PriceBreakdown> {
  let subtotal = round_money(cart.subtotal()?);
  let discount = coupon
    .map(|c| c.discount_for(subtotal).discount)
    .unwrap_or(Decimal::ZERO);
  let merchandise_total = subtotal - discount;
  let shipping = policy.fee_for(country, merchandise_total);
  let total = merchandise_total
    .checked_add(shipping)
    .ok_or_else(|| AppError::Validation("Order total is too large".to_string()))?;
  Ok(PriceBreakdown {
    subtotal,
    discount,
    shipping,
    total,
  })
}

pub fn amounts_match(left: Decimal, right: Decimal) -> bool {
  (left - right).abs() <= AMOUNT_TOLERANCE
}

pub fn round_money(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(amount * 100)`, or `None` when the result does not fit an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
  amount
    .checked_mul(Decimal::ONE_HUNDRED)?
    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    .to_i64()
}
