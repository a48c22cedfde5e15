// storefront/src/pipelines/coupon_pipeline.rs
use crate::errors::AppError;
use crate::models::coupon::{normalize_code, CouponRejection};
use crate::pipelines::contexts::CouponApplyCtxData;
use crate::state::AppState;
use chrono::Utc;
use rust_decimal::Decimal;
use storefront_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub fn register_coupon_apply_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Pipeline::<CouponApplyCtxData, AppError>::new(&[
    ("validate_coupon_request", false, None),
    ("load_coupon", false, None),
    ("check_coupon_terms", false, None),
    ("redeem_coupon", false, None),
  ]);

  p.on_root("validate_coupon_request", validate_coupon_request);
  p.on_root("load_coupon", load_coupon);
  p.on_root("check_coupon_terms", check_coupon_terms);
  p.on_root("redeem_coupon", redeem_coupon);

  registry.register_pipeline(p);
}

async fn validate_coupon_request(ctx_data: ContextData<CouponApplyCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let code = normalize_code(&guard.code);
  let total_ok = guard.total_amount.is_some_and(|t| t >= Decimal::ZERO);
  if code.is_empty() || !total_ok {
    return Err(AppError::Validation(
      "Missing required fields (code or totalAmount)".to_string(),
    ));
  }
  guard.code = code;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "coupon_step::load_coupon", skip(ctx_data), err(Display))]
async fn load_coupon(ctx_data: ContextData<CouponApplyCtxData>) -> Result<PipelineControl, AppError> {
  let (store, code) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.code.clone())
  };

  let coupon = store
    .find_coupon_by_code(&code)
    .await?
    .ok_or_else(|| AppError::CouponRejected(CouponRejection::NotFound { code: code.clone() }))?;
  ctx_data.write().coupon = Some(coupon);
  Ok(PipelineControl::Continue)
}

async fn check_coupon_terms(ctx_data: ContextData<CouponApplyCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let total = guard.total_amount.unwrap_or(Decimal::ZERO);
  let user_id = guard.user_id;
  let coupon = guard
    .coupon
    .as_ref()
    .ok_or_else(|| AppError::Internal("Coupon not loaded before term check".to_string()))?;

  coupon
    .check_terms(user_id, total, Utc::now())
    .map_err(AppError::CouponRejected)?;
  let quote = coupon.discount_for(total);
  guard.quote = Some(quote);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "coupon_step::redeem_coupon", skip(ctx_data), err(Display))]
async fn redeem_coupon(ctx_data: ContextData<CouponApplyCtxData>) -> Result<PipelineControl, AppError> {
  let (store, coupon_id, user_id) = {
    let guard = ctx_data.read();
    let coupon_id = guard
      .coupon
      .as_ref()
      .map(|c| c.id)
      .ok_or_else(|| AppError::Internal("Coupon not loaded before redemption".to_string()))?;
    (guard.app_state.store.clone(), coupon_id, guard.user_id)
  };

  let now = Utc::now();
  if let Some(updated) = store.redeem_coupon(coupon_id, user_id, now).await? {
    info!(code = %updated.code, %user_id, redemptions = updated.used_by.len(), "Coupon redeemed.");
    ctx_data.write().coupon = Some(updated);
    return Ok(PipelineControl::Continue);
  }

  // Lost a race with another redemption, or the coupon changed since it was loaded.
  let current = store.find_coupon(coupon_id).await?;
  let reason = match current {
    None => CouponRejection::NotFound {
      code: ctx_data.read().code.clone(),
    },
    Some(coupon) => coupon
      .check_redeemable_by(user_id, now)
      .err()
      .unwrap_or(CouponRejection::UsageLimitReached),
  };
  warn!(%user_id, reason = %reason, "Coupon redemption did not apply.");
  Err(AppError::CouponRejected(reason))
}
