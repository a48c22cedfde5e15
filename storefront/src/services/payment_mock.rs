// storefront/src/services/payment_mock.rs
use crate::errors::{AppError, Result as AppResult};
use crate::services::payment_gateway::{IntentStatus, PaymentGateway, PaymentIntent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// In-process gateway for local runs and tests.
#[derive(Default)]
pub struct MockGateway {
  intents: Mutex<HashMap<String, PaymentIntent>>,
  fail_creates: AtomicBool,
  fail_lookups: AtomicBool,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overrides the status of a known intent. Returns false for unknown ids.
  pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> bool {
    match self.intents.lock().get_mut(intent_id) {
      Some(intent) => {
        intent.status = status;
        true
      }
      None => false,
    }
  }

  /// Registers an intent directly, bypassing `create_intent`.
  pub fn insert_intent(&self, intent: PaymentIntent) {
    self.intents.lock().insert(intent.id.clone(), intent);
  }

  pub fn fail_creates(&self, fail: bool) {
    self.fail_creates.store(fail, Ordering::SeqCst);
  }

  pub fn fail_lookups(&self, fail: bool) {
    self.fail_lookups.store(fail, Ordering::SeqCst);
  }

  pub fn intent_count(&self) -> usize {
    self.intents.lock().len()
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn method_name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "mock_gateway::create_intent", skip(self))]
  async fn create_intent(&self, amount_minor: i64, currency: &str) -> AppResult<PaymentIntent> {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    if self.fail_creates.load(Ordering::SeqCst) {
      warn!("Simulated payment intent creation failure.");
      return Err(AppError::Gateway("Simulated gateway outage".to_string()));
    }
    let id = format!("pi_mock_{}", Uuid::new_v4().simple());
    let intent = PaymentIntent {
      client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
      id,
      amount: amount_minor,
      currency: currency.to_string(),
      status: IntentStatus::RequiresPaymentMethod,
    };
    info!(payment_intent_id = %intent.id, "Mock payment intent created.");
    self.insert_intent(intent.clone());
    Ok(intent)
  }

  #[instrument(name = "mock_gateway::retrieve_intent", skip(self))]
  async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    if self.fail_lookups.load(Ordering::SeqCst) {
      return Err(AppError::Gateway("Simulated connection reset by peer".to_string()));
    }
    self
      .intents
      .lock()
      .get(intent_id)
      .cloned()
      .ok_or_else(|| AppError::Gateway(format!("No such payment_intent: '{}'", intent_id)))
  }
}
