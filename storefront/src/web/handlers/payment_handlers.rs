// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentIntentCtxData;
use crate::state::AppState;
use storefront_flow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
pub struct PaymentIntentRequestPayload {
  #[serde(alias = "totalAmount")]
  pub amount: Option<Decimal>,
}

#[instrument(
    name = "handler::create_payment_intent",
    skip(app_state, req_payload),
    fields(amount = ?req_payload.amount)
)]
pub async fn create_payment_intent_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<PaymentIntentRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(PaymentIntentCtxData {
    app_state: app_state.get_ref().clone(),
    amount: req_payload.amount,
    amount_minor: 0,
    currency: app_state.config.payment.currency.clone(),
    intent: None,
  });

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let intent = ctx_data.read().intent.clone().ok_or_else(|| {
        warn!("Payment intent pipeline completed without an intent.");
        AppError::Internal("Payment intent was not created".to_string())
      })?;
      info!(payment_intent_id = %intent.id, "Payment intent ready for client confirmation.");
      Ok(HttpResponse::Ok().json(json!({
        "clientSecret": intent.client_secret,
        "paymentIntentId": intent.id,
      })))
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}
