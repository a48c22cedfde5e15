// tests/common/mod.rs
#![allow(dead_code, unused_macros)]

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use storefront::config::AppConfig;
use storefront::models::{Coupon, CouponDraft, DiscountType, LineItem, OrderSubmission};
use storefront::pipelines::register_all_pipelines;
use storefront::services::auth_service::{issue_token, ADMIN_ROLE};
use storefront::services::webhook_signature::signature_header;
use storefront::services::{IntentStatus, LogMailer, MockGateway, PaymentIntent};
use storefront::state::AppState;
use storefront::store::{CouponStore, MemoryStore};
use tracing::Level;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ADMIN_EMAIL: &str = "orders@shop.test";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn base_vars() -> HashMap<String, String> {
  [
    ("STORE_BACKEND", "memory"),
    ("PAYMENT_GATEWAY", "mock"),
    ("MAIL_PROVIDER", "log"),
    ("JWT_SECRET", JWT_SECRET),
    ("WEBHOOK_SECRET", WEBHOOK_SECRET),
    ("ADMIN_EMAIL", ADMIN_EMAIL),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect()
}

pub fn config_from(vars: &HashMap<String, String>) -> AppConfig {
  AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("test configuration should load")
}

/// Application state over the in-memory backends, with handles kept for
/// inspection.
pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
  pub mailer: Arc<LogMailer>,
}

pub fn test_app() -> TestApp {
  setup_tracing();
  let config = Arc::new(config_from(&base_vars()));
  let store = Arc::new(MemoryStore::new());
  let gateway = Arc::new(MockGateway::new());
  let mailer = Arc::new(LogMailer::new());

  let state = AppState::new(config, store.clone(), gateway.clone(), mailer.clone());
  register_all_pipelines(&state.flows, &state);

  TestApp {
    state,
    store,
    gateway,
    mailer,
  }
}

/// Builds an actix test service over `$state` with the production routes.
macro_rules! init_app {
  ($state:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($state.clone()))
        .app_data(storefront::web::json_config())
        .app_data(storefront::web::query_config())
        .app_data(storefront::web::path_config())
        .configure(storefront::web::configure_app_routes),
    )
    .await
  };
}

pub fn customer_token(user_id: Uuid, email: &str) -> String {
  issue_token(JWT_SECRET, user_id, Some(email), None, Utc::now()).expect("token should sign")
}

pub fn admin_token() -> String {
  issue_token(JWT_SECRET, Uuid::new_v4(), Some("admin@shop.test"), Some(ADMIN_ROLE), Utc::now())
    .expect("token should sign")
}

pub fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}

pub fn signed(body: &str) -> (&'static str, String) {
  let header = signature_header(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).expect("signature should compute");
  ("Stripe-Signature", header)
}

pub fn dec(value: &str) -> Decimal {
  value.parse().expect("valid decimal literal")
}

pub fn item(name: &str, price: &str, qty: i32) -> LineItem {
  LineItem {
    product_id: Some(Uuid::new_v4()),
    name: name.to_string(),
    price: dec(price),
    qty,
    image: "/placeholder.png".to_string(),
  }
}

pub fn submission(items: Vec<LineItem>, amount: &str) -> OrderSubmission {
  OrderSubmission {
    items,
    amount: Some(dec(amount)),
    currency: None,
    payment_id: None,
    email: None,
    shipping: None,
    coupon: None,
    country: Some("Australia".to_string()),
  }
}

pub async fn seed_coupon(
  store: &MemoryStore,
  code: &str,
  discount_type: DiscountType,
  value: &str,
  usage_limit: i32,
  expiry_date: Option<DateTime<Utc>>,
) -> Coupon {
  let coupon = Coupon::from_draft(
    CouponDraft {
      code: code.to_string(),
      discount_type,
      discount_value: dec(value),
      min_purchase: None,
      expiry_date,
      usage_limit,
    },
    Utc::now() - Duration::days(1),
  )
  .expect("valid coupon draft");
  store.insert_coupon(&coupon).await.expect("coupon should insert");
  coupon
}

/// Registers an intent with the mock gateway in the given state.
pub fn seed_intent(gateway: &MockGateway, amount_minor: i64, status: IntentStatus) -> String {
  let id = format!("pi_test_{}", Uuid::new_v4().simple());
  gateway.insert_intent(PaymentIntent {
    id: id.clone(),
    amount: amount_minor,
    currency: "aud".to_string(),
    status,
    client_secret: Some(format!("{}_secret", id)),
  });
  id
}

pub fn gateway_event(event_type: &str, payment_intent_id: &str) -> String {
  serde_json::json!({
    "id": format!("evt_{}", Uuid::new_v4().simple()),
    "type": event_type,
    "data": { "object": { "id": payment_intent_id, "status": "succeeded" } },
  })
  .to_string()
}
