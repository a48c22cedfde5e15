// storefront/src/pipelines/webhook_pipeline.rs

use crate::errors::AppError;
use crate::models::{OrderStatus, TransactionStatus};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{PaymentOutcomeCtxData, PaymentWebhookCtxData};
use crate::services::notifications::order_placed_messages;
use crate::services::payment_gateway::{GatewayEvent, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED};
use crate::services::webhook_signature;
use crate::state::AppState;
use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use storefront_flow::{ContextData, FlowError, Pipeline, PipelineControl, Registry, SkipCondition};
use tracing::{debug, info, instrument, warn};

fn event_is(event_type: &'static str) -> impl Fn(ContextData<PaymentWebhookCtxData>) -> bool + Send + Sync + 'static {
  move |ctx_data: ContextData<PaymentWebhookCtxData>| {
    let guard = ctx_data.read();
    guard.event.as_ref().is_some_and(|event| event.event_type == event_type)
  }
}

fn outcome_context(ctx_data: ContextData<PaymentWebhookCtxData>) -> Result<ContextData<PaymentOutcomeCtxData>, FlowError> {
  let prepared = ctx_data.read().outcome_ctx.clone();
  prepared.ok_or_else(|| FlowError::ExtractorFailure {
    step_name: "route_payment_event".to_string(),
    source: anyhow!("payment outcome context was not prepared by parse_event"),
  })
}

/// Sub-pipeline that writes one payment outcome to the matched order.
fn outcome_pipeline(
  step_name: &'static str,
  order_status: OrderStatus,
  transaction_status: TransactionStatus,
) -> Arc<Pipeline<PaymentOutcomeCtxData, AppError>> {
  let mut p = Pipeline::<PaymentOutcomeCtxData, AppError>::new(&[(step_name, false, None)]);

  p.on_root(step_name, move |sctx: ContextData<PaymentOutcomeCtxData>| async move {
    let (store, payment_intent_id, admin_email) = {
      let guard = sctx.read();
      (
        guard.app_state.store.clone(),
        guard.payment_intent_id.clone(),
        guard.app_state.config.mail.admin_email.clone(),
      )
    };

    let follow_up = move |order: &crate::models::Order| {
      if order_status == OrderStatus::Completed {
        order_placed_messages(order, &admin_email, Utc::now())
      } else {
        Vec::new()
      }
    };
    let applied = store
      .apply_payment_outcome(&payment_intent_id, order_status, transaction_status, &follow_up)
      .await?;

    match &applied {
      Some(outcome) => info!(
        %payment_intent_id,
        order_id = %outcome.order.id,
        from = ?outcome.previous_status,
        to = ?outcome.order.status,
        enqueued = outcome.enqueued,
        "Payment outcome applied."
      ),
      None => info!(%payment_intent_id, "No order matches payment intent; nothing to update."),
    }
    sctx.write().applied = applied;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  Arc::new(p)
}

pub fn register_payment_webhook_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let nothing_enqueued: SkipCondition<PaymentWebhookCtxData> = Arc::new(|ctx_data: ContextData<PaymentWebhookCtxData>| {
    let outcome = ctx_data.read().outcome_ctx.clone();
    let enqueued = outcome.is_some_and(|o| {
      let guard = o.read();
      guard.applied.as_ref().is_some_and(|a| a.enqueued > 0)
    });
    !enqueued
  });

  let mut p = Pipeline::<PaymentWebhookCtxData, AppError>::new(&[
    ("verify_signature", false, None),
    ("parse_event", false, None),
    ("route_payment_event", false, None),
    ("acknowledge", false, None),
    ("wake_dispatcher", true, Some(nothing_enqueued)),
  ]);

  p.on_root("verify_signature", verify_signature);
  p.on_root("parse_event", parse_event);

  p.branch_for_step("route_payment_event")
    .when(
      "payment_succeeded",
      event_is(EVENT_PAYMENT_SUCCEEDED),
      outcome_pipeline("mark_order_paid", OrderStatus::Completed, TransactionStatus::Completed),
      outcome_context,
    )
    .when(
      "payment_failed",
      event_is(EVENT_PAYMENT_FAILED),
      outcome_pipeline("mark_order_failed", OrderStatus::Failed, TransactionStatus::Failed),
      outcome_context,
    )
    .if_no_branch_matches(PipelineControl::Continue)
    .finalize();

  p.on_root("acknowledge", |ctx_data: ContextData<PaymentWebhookCtxData>| async move {
    let mut guard = ctx_data.write();
    guard.acknowledged = true;
    if let Some(event) = guard.event.as_ref() {
      debug!(event_id = %event.id, event_type = %event.event_type, "Webhook acknowledged.");
    }
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("wake_dispatcher", common_steps::wake_dispatcher);

  registry.register_pipeline(p);
}

#[instrument(name = "webhook_step::verify_signature", skip(ctx_data), err(Display))]
async fn verify_signature(ctx_data: ContextData<PaymentWebhookCtxData>) -> Result<PipelineControl, AppError> {
  let guard = ctx_data.read();
  let header = guard
    .signature_header
    .as_deref()
    .ok_or_else(|| AppError::Auth("Missing payment signature header".to_string()))?;
  let payment = &guard.app_state.config.payment;
  webhook_signature::verify(
    &guard.raw_payload,
    header,
    &payment.webhook_secret,
    payment.webhook_tolerance,
    Utc::now(),
  )?;
  Ok(PipelineControl::Continue)
}

async fn parse_event(ctx_data: ContextData<PaymentWebhookCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let event: GatewayEvent = serde_json::from_slice(&guard.raw_payload).map_err(|e| {
    warn!(error = %e, "Verified webhook body is not a gateway event.");
    AppError::Validation(format!("Malformed webhook payload: {}", e))
  })?;
  info!(event_id = %event.id, event_type = %event.event_type, object_id = %event.data.object.id, "Webhook event received.");

  guard.outcome_ctx = Some(ContextData::new(PaymentOutcomeCtxData {
    app_state: guard.app_state.clone(),
    event_id: event.id.clone(),
    payment_intent_id: event.data.object.id.clone(),
    applied: None,
  }));
  guard.event = Some(event);
  Ok(PipelineControl::Continue)
}
