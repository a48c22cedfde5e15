// storefront/src/pipelines/order_pipeline.rs
use crate::errors::AppError;
use crate::models::coupon::{normalize_code, CouponRejection};
use crate::models::{Cart, Order, OrderStatus, Transaction, TransactionStatus};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{CheckoutKind, PlaceOrderCtxData};
use crate::pricing::{amounts_match, price_checkout, to_minor_units};
use crate::services::notifications::{order_failed_messages, order_placed_messages};
use crate::services::payment_gateway::IntentStatus;
use crate::state::AppState;
use crate::store::{CheckoutRecord, PersistOutcome};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use storefront_flow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub fn register_place_order_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let nothing_to_resolve: SkipCondition<PlaceOrderCtxData> = Arc::new(|ctx_data: ContextData<PlaceOrderCtxData>| {
    let guard = ctx_data.read();
    guard.kind == CheckoutKind::Failed || guard.submission.payment_id.is_none()
  });
  let nothing_enqueued: SkipCondition<PlaceOrderCtxData> =
    Arc::new(|ctx_data: ContextData<PlaceOrderCtxData>| {
      let created = ctx_data.read().created;
      !created
    });

  let mut p = Pipeline::<PlaceOrderCtxData, AppError>::new(&[
    ("validate_order_request", false, None),
    ("price_order", false, None),
    ("resolve_payment_status", true, Some(nothing_to_resolve)),
    ("persist_order", false, None),
    ("wake_dispatcher", true, Some(nothing_enqueued)),
  ]);

  p.on_root("validate_order_request", validate_order_request);
  p.on_root("price_order", price_order);
  p.on_root("resolve_payment_status", resolve_payment_status);
  p.on_root("persist_order", persist_order);
  p.on_root("wake_dispatcher", common_steps::wake_dispatcher);

  registry.register_pipeline(p);
}

async fn validate_order_request(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();

  let email = guard
    .token_email
    .clone()
    .or_else(|| guard.submission.email.clone())
    .map(|e| e.trim().to_string())
    .filter(|e| !e.is_empty());
  let Some(email) = email else {
    return Err(AppError::Validation("Customer email is required".to_string()));
  };
  if !email.contains('@') {
    return Err(AppError::Validation(format!("Invalid customer email '{}'", email)));
  }

  if guard.submission.items.is_empty() {
    return Err(AppError::Validation("Order must contain at least one item".to_string()));
  }
  for item in &guard.submission.items {
    if item.name.trim().is_empty() {
      return Err(AppError::Validation("Every item needs a name".to_string()));
    }
    if item.qty < 1 {
      return Err(AppError::Validation(format!("Quantity for '{}' must be at least 1", item.name)));
    }
    if item.price < Decimal::ZERO {
      return Err(AppError::Validation(format!("Price for '{}' cannot be negative", item.name)));
    }
  }

  match guard.submission.amount {
    Some(amount) if amount >= Decimal::ZERO => {}
    _ => return Err(AppError::Validation("Order amount is required".to_string())),
  }

  let store_currency = &guard.app_state.config.payment.currency;
  if let Some(currency) = guard.submission.currency.as_deref() {
    if !currency.trim().eq_ignore_ascii_case(store_currency) {
      return Err(AppError::Validation(format!(
        "Unsupported currency '{}'; this store charges in {}",
        currency,
        store_currency.to_uppercase()
      )));
    }
  }

  let payment_id = guard
    .submission
    .payment_id
    .take()
    .map(|p| p.trim().to_string())
    .filter(|p| !p.is_empty());
  guard.submission.payment_id = payment_id;

  guard.cart = Cart::from_items(guard.submission.items.clone())?;
  guard.email = Some(email);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::price_order", skip(ctx_data), err(Display))]
async fn price_order(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl, AppError> {
  let (store, user_id, coupon_code) = {
    let guard = ctx_data.read();
    let code = guard
      .submission
      .coupon
      .as_deref()
      .map(normalize_code)
      .filter(|c| !c.is_empty());
    (guard.app_state.store.clone(), guard.user_id, code)
  };

  let coupon = match coupon_code {
    Some(code) => {
      let coupon = store
        .find_coupon_by_code(&code)
        .await?
        .ok_or_else(|| AppError::CouponRejected(CouponRejection::NotFound { code: code.clone() }))?;
      if !coupon.is_redeemed_by(user_id) {
        return Err(AppError::CouponRejected(CouponRejection::NotRedeemed { code }));
      }
      Some(coupon)
    }
    None => None,
  };

  let mut guard = ctx_data.write();
  let pricing = price_checkout(
    &guard.cart,
    coupon.as_ref(),
    guard.submission.country.as_deref(),
    &guard.app_state.config.shipping,
  )?;

  if let Some(claimed) = guard.submission.shipping {
    if !amounts_match(claimed, pricing.shipping) {
      return Err(AppError::Validation(format!(
        "Shipping fee {:.2} does not match the quoted {:.2}",
        claimed, pricing.shipping
      )));
    }
  }
  let claimed_total = guard.submission.amount.unwrap_or(Decimal::ZERO);
  if !amounts_match(claimed_total, pricing.total) {
    return Err(AppError::Validation(format!(
      "Order amount {:.2} does not match items, shipping and discount ({:.2})",
      claimed_total, pricing.total
    )));
  }

  guard.coupon = coupon;
  guard.pricing = Some(pricing);
  Ok(PipelineControl::Continue)
}

/// Reads the intent's status from the gateway. Optional: a lookup failure
/// leaves both records pending for the webhook to settle.
#[instrument(name = "order_step::resolve_payment_status", skip(ctx_data), err(Display))]
async fn resolve_payment_status(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl, AppError> {
  let (gateway, payment_id, expected_minor) = {
    let guard = ctx_data.read();
    let expected = guard.pricing.map(|p| p.total).and_then(to_minor_units);
    (guard.app_state.gateway.clone(), guard.submission.payment_id.clone(), expected)
  };
  let Some(payment_id) = payment_id else {
    return Ok(PipelineControl::Continue);
  };

  let intent = gateway.retrieve_intent(&payment_id).await.map_err(|e| {
    warn!(%payment_id, error = %e, "Payment lookup failed; recording order as pending.");
    e
  })?;

  let paid = intent.status == IntentStatus::Succeeded;
  let amount_agrees = expected_minor == Some(intent.amount);
  let (order_status, transaction_status) = if paid && amount_agrees {
    // Fulfilment moves the order past pending; the charge itself is settled.
    (OrderStatus::Pending, TransactionStatus::Completed)
  } else {
    if paid {
      warn!(
        %payment_id,
        charged_minor = intent.amount,
        expected_minor = ?expected_minor,
        "Charged amount differs from order total."
      );
    }
    (OrderStatus::Failed, TransactionStatus::Failed)
  };

  let mut guard = ctx_data.write();
  guard.gateway_status = Some(intent.status);
  guard.order_status = order_status;
  guard.transaction_status = transaction_status;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::persist_order", skip(ctx_data), err(Display))]
async fn persist_order(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl, AppError> {
  let (store, record) = {
    let guard = ctx_data.read();
    let pricing = guard
      .pricing
      .ok_or_else(|| AppError::Internal("Order priced before persistence".to_string()))?;
    let email = guard
      .email
      .clone()
      .ok_or_else(|| AppError::Internal("Order email resolved before persistence".to_string()))?;
    let config = &guard.app_state.config;
    let now = Utc::now();

    let order = Order {
      id: Uuid::new_v4(),
      order_code: Order::generate_code(),
      user_id: guard.user_id,
      user_email: email,
      items: guard.cart.clone().into_items(),
      amount: pricing.total,
      shipping: pricing.shipping,
      discount: pricing.discount,
      coupon_code: guard.coupon.as_ref().map(|c| c.code.clone()),
      country: guard.submission.country.clone(),
      currency: config.payment.currency.clone(),
      payment_intent_id: guard.submission.payment_id.clone(),
      status: guard.order_status,
      created_at: now,
      updated_at: now,
    };
    let transaction = Transaction {
      id: Uuid::new_v4(),
      order_id: order.id,
      user_id: order.user_id,
      amount: order.amount,
      currency: order.currency.clone(),
      payment_method: guard.app_state.gateway.method_name().to_string(),
      payment_intent_id: order.payment_intent_id.clone(),
      status: guard.transaction_status,
      created_at: now,
      updated_at: now,
    };
    let notifications = if order.status == OrderStatus::Failed {
      order_failed_messages(&order, now)
    } else {
      order_placed_messages(&order, &config.mail.admin_email, now)
    };

    (
      guard.app_state.store.clone(),
      CheckoutRecord {
        order,
        transaction,
        notifications,
      },
    )
  };

  match store.persist_checkout(&record).await? {
    PersistOutcome::Created => {
      info!(
        order_id = %record.order.id,
        order_code = %record.order.order_code,
        status = ?record.order.status,
        transaction_status = ?record.transaction.status,
        notifications = record.notifications.len(),
        "Order persisted."
      );
      let mut guard = ctx_data.write();
      guard.order = Some(record.order);
      guard.created = true;
    }
    PersistOutcome::Duplicate(existing) => {
      info!(
        order_id = %existing.id,
        payment_intent_id = ?existing.payment_intent_id,
        "Order already recorded for this payment; returning it."
      );
      let mut guard = ctx_data.write();
      guard.order = Some(existing);
      guard.created = false;
    }
  }
  Ok(PipelineControl::Continue)
}
