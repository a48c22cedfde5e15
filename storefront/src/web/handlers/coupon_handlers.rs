// storefront/src/web/handlers/coupon_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::CouponSummary;
use crate::pipelines::contexts::CouponApplyCtxData;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use storefront_flow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequestPayload {
  #[serde(default)]
  pub code: Option<String>,
  #[serde(default)]
  pub total_amount: Option<Decimal>,
}

#[instrument(
    name = "handler::apply_coupon",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, code = ?req_payload.code)
)]
pub async fn apply_coupon_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ApplyCouponRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let req_payload = req_payload.into_inner();
  let ctx_data = ContextData::new(CouponApplyCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    code: req_payload.code.unwrap_or_default(),
    total_amount: req_payload.total_amount,
    coupon: None,
    quote: None,
  });

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let quote = ctx_data.read().quote.ok_or_else(|| {
        warn!("Coupon pipeline completed without a quote.");
        AppError::Internal("Coupon discount was not computed".to_string())
      })?;
      info!(discount = %quote.discount, final_amount = %quote.final_amount, "Coupon applied.");
      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "discount": quote.discount,
        "finalAmount": quote.final_amount,
        "message": "Coupon applied successfully",
      })))
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}

/// Coupons a shopper could still use right now.
#[instrument(name = "handler::list_available_coupons", skip(app_state))]
pub async fn list_available_coupons_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let now = Utc::now();
  let coupons: Vec<CouponSummary> = app_state
    .store
    .list_coupons()
    .await?
    .iter()
    .filter(|c| !c.is_expired(now) && !c.is_exhausted())
    .map(|c| c.summary())
    .collect();
  Ok(HttpResponse::Ok().json(coupons))
}
