// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::AppError;
use crate::models::coupon::normalize_code;
use crate::models::{Cart, CouponRejection, LineItem};
use crate::pricing::{price_checkout, round_money};
use crate::state::AppState;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequestPayload {
  #[serde(default)]
  pub items: Vec<LineItem>,
  #[serde(default, alias = "couponCode")]
  pub coupon: Option<String>,
  #[serde(default, alias = "selectedCountry")]
  pub country: Option<String>,
}

/// Prices a cart the way the order persister will, without redeeming the coupon.
#[instrument(
    name = "handler::quote_checkout",
    skip(app_state, req_payload),
    fields(items = req_payload.items.len(), country = ?req_payload.country)
)]
pub async fn quote_checkout_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<QuoteRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let req_payload = req_payload.into_inner();
  if req_payload.items.iter().any(|item| item.qty < 1) {
    return Err(AppError::Validation("Quantities must be at least 1".to_string()));
  }
  let cart = Cart::from_items(req_payload.items)?;

  let code = req_payload
    .coupon
    .as_deref()
    .map(normalize_code)
    .filter(|c| !c.is_empty());
  let coupon = match code {
    Some(code) => {
      let coupon = app_state
        .store
        .find_coupon_by_code(&code)
        .await?
        .ok_or_else(|| AppError::CouponRejected(CouponRejection::NotFound { code: code.clone() }))?;
      coupon
        .check_general_terms(round_money(cart.subtotal()?), Utc::now())
        .map_err(AppError::CouponRejected)?;
      Some(coupon)
    }
    None => None,
  };

  let breakdown = price_checkout(
    &cart,
    coupon.as_ref(),
    req_payload.country.as_deref(),
    &app_state.config.shipping,
  )?;
  debug!(total = %breakdown.total, "Checkout quoted.");
  Ok(HttpResponse::Ok().json(breakdown))
}
