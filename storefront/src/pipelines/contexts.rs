// storefront/src/pipelines/contexts.rs

//! Data carried through each pipeline. Handlers receive these wrapped in
//! `storefront_flow::ContextData`.

use crate::models::{
  Cart, Coupon, DiscountQuote, Order, OrderStatus, OrderSubmission, TransactionStatus, User,
};
use crate::pricing::PriceBreakdown;
use crate::services::payment_gateway::{GatewayEvent, IntentStatus, PaymentIntent};
use crate::state::AppState;
use crate::store::PaymentOutcomeApplied;
use actix_web::web::Bytes;
use rust_decimal::Decimal;
use storefront_flow::ContextData;
use uuid::Uuid;

/// Anything a shared step needs from its pipeline's context.
pub trait HasAppState {
  fn app_state(&self) -> &AppState;
}

macro_rules! impl_has_app_state {
  ($($ctx:ty),+ $(,)?) => {
    $(impl HasAppState for $ctx {
      fn app_state(&self) -> &AppState {
        &self.app_state
      }
    })+
  };
}

impl_has_app_state!(
  CouponApplyCtxData,
  PaymentIntentCtxData,
  PlaceOrderCtxData,
  PaymentWebhookCtxData,
  PaymentOutcomeCtxData,
  SignupCtxData,
  SigninCtxData,
);

#[derive(Clone)]
pub struct CouponApplyCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub code: String,
  pub total_amount: Option<Decimal>,
  pub coupon: Option<Coupon>,
  pub quote: Option<DiscountQuote>,
}

#[derive(Clone)]
pub struct PaymentIntentCtxData {
  pub app_state: AppState,
  pub amount: Option<Decimal>,
  pub amount_minor: i64,
  pub currency: String,
  pub intent: Option<PaymentIntent>,
}

/// Whether the order records a successful checkout or its failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutKind {
  Placed,
  Failed,
}

#[derive(Clone)]
pub struct PlaceOrderCtxData {
  pub app_state: AppState,
  pub kind: CheckoutKind,
  pub user_id: Uuid,
  pub token_email: Option<String>,
  pub submission: OrderSubmission,

  pub email: Option<String>,
  pub cart: Cart,
  pub coupon: Option<Coupon>,
  pub pricing: Option<PriceBreakdown>,
  pub order_status: OrderStatus,
  pub transaction_status: TransactionStatus,
  pub gateway_status: Option<IntentStatus>,

  pub order: Option<Order>,
  pub created: bool,
}

impl PlaceOrderCtxData {
  pub fn new(
    app_state: AppState,
    kind: CheckoutKind,
    user_id: Uuid,
    token_email: Option<String>,
    submission: OrderSubmission,
  ) -> Self {
    let (order_status, transaction_status) = match kind {
      CheckoutKind::Placed => (OrderStatus::Pending, TransactionStatus::Pending),
      CheckoutKind::Failed => (OrderStatus::Failed, TransactionStatus::Failed),
    };
    Self {
      app_state,
      kind,
      user_id,
      token_email,
      submission,
      email: None,
      cart: Cart::new(),
      coupon: None,
      pricing: None,
      order_status,
      transaction_status,
      gateway_status: None,
      order: None,
      created: false,
    }
  }
}

#[derive(Clone)]
pub struct PaymentWebhookCtxData {
  pub app_state: AppState,
  pub raw_payload: Bytes,
  pub signature_header: Option<String>,
  pub event: Option<GatewayEvent>,
  /// Prepared by `parse_event` for whichever outcome branch matches.
  pub outcome_ctx: Option<ContextData<PaymentOutcomeCtxData>>,
  pub acknowledged: bool,
}

#[derive(Clone)]
pub struct PaymentOutcomeCtxData {
  pub app_state: AppState,
  pub event_id: String,
  pub payment_intent_id: String,
  pub applied: Option<PaymentOutcomeApplied>,
}

#[derive(Clone)]
pub struct SignupCtxData {
  pub app_state: AppState,
  pub name: Option<String>,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub session_token: Option<String>,
}

impl SignupCtxData {
  pub fn new(app_state: AppState, name: Option<String>, email: String, password: String) -> Self {
    Self {
      app_state,
      name,
      email,
      password,
      user: None,
      session_token: None,
    }
  }
}

/// Which login form the credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigninAudience {
  Customer,
  /// Only accounts with the admin role may sign in.
  BackOffice,
}

#[derive(Clone)]
pub struct SigninCtxData {
  pub app_state: AppState,
  pub audience: SigninAudience,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub session_token: Option<String>,
}

impl SigninCtxData {
  pub fn new(app_state: AppState, audience: SigninAudience, email: String, password: String) -> Self {
    Self {
      app_state,
      audience,
      email,
      password,
      user: None,
      session_token: None,
    }
  }
}
