// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::OrderSubmission;
use crate::pipelines::contexts::{CheckoutKind, PlaceOrderCtxData};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use storefront_flow::{ContextData, PipelineResult};

async fn run_place_order(
  app_state: &web::Data<AppState>,
  auth_user: AuthenticatedUser,
  submission: OrderSubmission,
  kind: CheckoutKind,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(PlaceOrderCtxData::new(
    app_state.get_ref().clone(),
    kind,
    auth_user.user_id,
    auth_user.email.clone(),
    submission,
  ));

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let (order, created) = {
        let guard = ctx_data.read();
        (guard.order.clone(), guard.created)
      };
      let order = order.ok_or_else(|| {
        warn!(user_id = %auth_user.user_id, "Order pipeline completed without an order.");
        AppError::Internal("Order was not recorded".to_string())
      })?;

      let body = json!({ "success": true, "order": order });
      if created {
        Ok(HttpResponse::Created().json(body))
      } else {
        Ok(HttpResponse::Ok().json(body))
      }
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}

#[instrument(
    name = "handler::place_order",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, payment_id = ?req_payload.payment_id)
)]
pub async fn place_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<OrderSubmission>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  run_place_order(&app_state, auth_user, req_payload.into_inner(), CheckoutKind::Placed).await
}

#[instrument(
    name = "handler::record_failed_order",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, payment_id = ?req_payload.payment_id)
)]
pub async fn record_failed_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<OrderSubmission>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  run_place_order(&app_state, auth_user, req_payload.into_inner(), CheckoutKind::Failed).await
}

#[instrument(name = "handler::list_my_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.list_orders_for_user(auth_user.user_id).await?;
  info!(count = orders.len(), "Listed caller's orders.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}
