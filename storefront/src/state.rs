// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::{Mailer, PaymentGateway};
use crate::store::Store;
use std::sync::Arc;
use storefront_flow::Registry;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub mailer: Arc<dyn Mailer>,
  pub flows: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
  /// Wakes the notification dispatcher ahead of its next poll.
  pub dispatcher_wakeup: Arc<Notify>,
}

impl AppState {
  pub fn new(
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
  ) -> Self {
    Self {
      store,
      gateway,
      mailer,
      flows: Arc::new(Registry::new()),
      config,
      dispatcher_wakeup: Arc::new(Notify::new()),
    }
  }
}
