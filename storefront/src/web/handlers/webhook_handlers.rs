// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use crate::services::webhook_signature::SIGNATURE_HEADER;
use crate::state::AppState;
use storefront_flow::{ContextData, PipelineResult};

/// Gateway event receiver. The body is taken raw so the signature is checked
/// against the exact bytes that were signed.
#[instrument(name = "handler::payment_webhook", skip(app_state, req, body), fields(body_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: Bytes,
) -> Result<HttpResponse, AppError> {
  let signature_header = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .map(str::to_string);

  let ctx_data = ContextData::new(PaymentWebhookCtxData {
    app_state: app_state.get_ref().clone(),
    raw_payload: body,
    signature_header,
    event: None,
    outcome_ctx: None,
    acknowledged: false,
  });

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let acknowledged = ctx_data.read().acknowledged;
      if !acknowledged {
        return Err(AppError::Internal("Webhook was processed but not acknowledged".to_string()));
      }
      info!("Payment webhook handled.");
      Ok(HttpResponse::Ok().json(json!({ "received": true })))
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}
