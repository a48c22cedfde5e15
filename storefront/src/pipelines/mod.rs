// storefront/src/pipelines/mod.rs

//! Checkout, payment, reconciliation and account workflows, one pipeline per
//! request context type.

use crate::errors::AppError;
use crate::state::AppState;
use storefront_flow::Registry;

pub mod common_steps;
pub mod contexts;

pub mod coupon_pipeline;
pub mod order_pipeline;
pub mod payment_intent_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;
pub mod webhook_pipeline;

/// Registers every pipeline with `registry`. Called once at start-up, and by
/// tests building their own `AppState`.
pub fn register_all_pipelines(registry: &Registry<AppError>, app_state: &AppState) {
  tracing::info!("Registering storefront pipelines...");

  coupon_pipeline::register_coupon_apply_pipeline(registry, app_state);
  payment_intent_pipeline::register_payment_intent_pipeline(registry, app_state);
  order_pipeline::register_place_order_pipeline(registry, app_state);
  webhook_pipeline::register_payment_webhook_pipeline(registry, app_state);
  signup_pipeline::register_signup_pipeline(registry, app_state);
  signin_pipeline::register_signin_pipeline(registry, app_state);

  tracing::info!("All storefront pipelines registered.");
}
