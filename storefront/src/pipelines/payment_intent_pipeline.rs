// storefront/src/pipelines/payment_intent_pipeline.rs
use crate::errors::AppError;
use crate::pipelines::contexts::PaymentIntentCtxData;
use crate::pricing::to_minor_units;
use crate::state::AppState;
use storefront_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument};

pub fn register_payment_intent_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Pipeline::<PaymentIntentCtxData, AppError>::new(&[
    ("validate_amount", false, None),
    ("create_gateway_intent", false, None),
  ]);

  p.on_root("validate_amount", |ctx_data: ContextData<PaymentIntentCtxData>| async move {
    let mut guard = ctx_data.write();
    let amount_minor = guard.amount.and_then(to_minor_units).unwrap_or(0);
    if amount_minor <= 0 {
      return Err(AppError::Validation("Invalid payment amount".to_string()));
    }
    guard.amount_minor = amount_minor;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("create_gateway_intent", create_gateway_intent);

  registry.register_pipeline(p);
}

#[instrument(name = "payment_step::create_gateway_intent", skip(ctx_data), err(Display))]
async fn create_gateway_intent(ctx_data: ContextData<PaymentIntentCtxData>) -> Result<PipelineControl, AppError> {
  let (gateway, amount_minor, currency) = {
    let guard = ctx_data.read();
    (guard.app_state.gateway.clone(), guard.amount_minor, guard.currency.clone())
  };

  let intent = gateway.create_intent(amount_minor, &currency).await?;
  if intent.client_secret.is_none() {
    return Err(AppError::Gateway("Payment provider returned no client secret".to_string()));
  }
  info!(payment_intent_id = %intent.id, amount_minor, %currency, "Payment intent issued.");
  ctx_data.write().intent = Some(intent);
  Ok(PipelineControl::Continue)
}
