// storefront/src/store/memory.rs

use super::{
  CheckoutRecord, CouponStore, FollowUp, OrderStore, OutboxStore, PaymentOutcomeApplied, PersistOutcome, ProductStore,
  UserStore,
};
use crate::errors::{AppError, Result as AppResult};
use crate::models::{
  Coupon, DeliveryState, Order, OrderStatus, OutboxMessage, Product, ProductFilter, Transaction, TransactionStatus,
  User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct State {
  coupons: HashMap<Uuid, Coupon>,
  products: HashMap<Uuid, Product>,
  orders: HashMap<Uuid, Order>,
  transactions: HashMap<Uuid, Transaction>,
  outbox: Vec<OutboxMessage>,
  users: HashMap<Uuid, User>,
}

impl State {
  fn order_for_intent(&self, payment_intent_id: &str) -> Option<Uuid> {
    self
      .orders
      .values()
      .filter(|o| o.payment_intent_id.as_deref() == Some(payment_intent_id))
      .max_by_key(|o| o.created_at)
      .map(|o| o.id)
  }
}

/// Single-lock store. Every operation holds the lock for its whole
/// read-check-write, which gives the same atomicity as the SQL backend.
#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn outbox(&self) -> Vec<OutboxMessage> {
    self.state.lock().outbox.clone()
  }

  pub fn order_count(&self) -> usize {
    self.state.lock().orders.len()
  }

  pub fn transaction_count(&self) -> usize {
    self.state.lock().transactions.len()
  }
}

fn newest_first<T>(mut rows: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
  rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
  rows
}

#[async_trait]
impl CouponStore for MemoryStore {
  async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>> {
    Ok(self.state.lock().coupons.get(&id).cloned())
  }

  async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
    Ok(self.state.lock().coupons.values().find(|c| c.code == code).cloned())
  }

  async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
    let rows = self.state.lock().coupons.values().cloned().collect();
    Ok(newest_first(rows, |c: &Coupon| c.created_at))
  }

  async fn insert_coupon(&self, coupon: &Coupon) -> AppResult<()> {
    let mut state = self.state.lock();
    if state.coupons.values().any(|c| c.code == coupon.code) {
      return Err(AppError::Conflict(format!("Coupon code {} already exists", coupon.code)));
    }
    state.coupons.insert(coupon.id, coupon.clone());
    Ok(())
  }

  async fn update_coupon(&self, coupon: &Coupon) -> AppResult<bool> {
    let mut state = self.state.lock();
    if state.coupons.values().any(|c| c.code == coupon.code && c.id != coupon.id) {
      return Err(AppError::Conflict(format!("Coupon code {} already exists", coupon.code)));
    }
    match state.coupons.get_mut(&coupon.id) {
      Some(existing) => {
        let used_by = std::mem::take(&mut existing.used_by);
        *existing = Coupon {
          used_by,
          ..coupon.clone()
        };
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn delete_coupon(&self, id: Uuid) -> AppResult<bool> {
    Ok(self.state.lock().coupons.remove(&id).is_some())
  }

  async fn redeem_coupon(&self, coupon_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Coupon>> {
    let mut state = self.state.lock();
    let Some(coupon) = state.coupons.get_mut(&coupon_id) else {
      return Ok(None);
    };
    if coupon.check_redeemable_by(user_id, now).is_err() {
      return Ok(None);
    }
    coupon.used_by.push(user_id);
    Ok(Some(coupon.clone()))
  }
}

#[async_trait]
impl ProductStore for MemoryStore {
  async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
    Ok(self.state.lock().products.get(&id).cloned())
  }

  async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
    Ok(self.state.lock().products.values().find(|p| p.slug == slug).cloned())
  }

  async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
    let rows = self
      .state
      .lock()
      .products
      .values()
      .filter(|p| filter.matches(p))
      .cloned()
      .collect();
    Ok(newest_first(rows, |p: &Product| p.created_at))
  }

  async fn list_all_products(&self) -> AppResult<Vec<Product>> {
    let rows = self.state.lock().products.values().cloned().collect();
    Ok(newest_first(rows, |p: &Product| p.created_at))
  }

  async fn insert_product(&self, product: &Product) -> AppResult<()> {
    let mut state = self.state.lock();
    if state.products.values().any(|p| p.slug == product.slug) {
      return Err(AppError::Conflict(format!("A product with slug '{}' already exists", product.slug)));
    }
    state.products.insert(product.id, product.clone());
    Ok(())
  }

  async fn update_product(&self, product: &Product) -> AppResult<bool> {
    let mut state = self.state.lock();
    if state.products.values().any(|p| p.slug == product.slug && p.id != product.id) {
      return Err(AppError::Conflict(format!("A product with slug '{}' already exists", product.slug)));
    }
    match state.products.get_mut(&product.id) {
      Some(existing) => {
        *existing = product.clone();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
    let mut state = self.state.lock();
    if state.products.remove(&id).is_none() {
      return Ok(false);
    }
    for order in state.orders.values_mut() {
      for item in order.items.iter_mut().filter(|i| i.product_id == Some(id)) {
        item.product_id = None;
      }
    }
    Ok(true)
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn persist_checkout(&self, record: &CheckoutRecord) -> AppResult<PersistOutcome> {
    let mut state = self.state.lock();
    if let Some(intent) = record.order.payment_intent_id.as_deref() {
      if let Some(existing) = state.order_for_intent(intent).and_then(|id| state.orders.get(&id)) {
        return Ok(PersistOutcome::Duplicate(existing.clone()));
      }
    }
    state.orders.insert(record.order.id, record.order.clone());
    state.transactions.insert(record.transaction.id, record.transaction.clone());
    state.outbox.extend(record.notifications.iter().cloned());
    Ok(PersistOutcome::Created)
  }

  async fn apply_payment_outcome(
    &self,
    payment_intent_id: &str,
    order_status: OrderStatus,
    transaction_status: TransactionStatus,
    follow_up: FollowUp<'_>,
  ) -> AppResult<Option<PaymentOutcomeApplied>> {
    let mut state = self.state.lock();
    let Some(order_id) = state.order_for_intent(payment_intent_id) else {
      return Ok(None);
    };
    let now = Utc::now();

    let Some(order) = state.orders.get_mut(&order_id) else {
      return Ok(None);
    };
    let previous_status = order.status;
    order.status = order_status;
    order.updated_at = now;
    let order = order.clone();

    for txn in state.transactions.values_mut().filter(|t| t.order_id == order_id) {
      txn.status = transaction_status;
      txn.updated_at = now;
    }

    let mut enqueued = 0;
    if previous_status != order_status {
      let messages = follow_up(&order);
      enqueued = messages.len();
      state.outbox.extend(messages);
    }
    Ok(Some(PaymentOutcomeApplied {
      order,
      previous_status,
      enqueued,
    }))
  }

  async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
    Ok(self.state.lock().orders.get(&id).cloned())
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
    let rows = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .cloned()
      .collect();
    Ok(newest_first(rows, |o: &Order| o.created_at))
  }

  async fn list_orders(&self) -> AppResult<Vec<Order>> {
    let rows = self.state.lock().orders.values().cloned().collect();
    Ok(newest_first(rows, |o: &Order| o.created_at))
  }

  async fn list_orders_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Order>> {
    let mut rows: Vec<Order> = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.created_at >= since)
      .cloned()
      .collect();
    rows.sort_by_key(|o| o.created_at);
    Ok(rows)
  }

  async fn list_recent_orders(&self, limit: usize) -> AppResult<Vec<Order>> {
    let rows = self.state.lock().orders.values().cloned().collect();
    let mut rows = newest_first(rows, |o: &Order| o.created_at);
    rows.truncate(limit);
    Ok(rows)
  }

  async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
    let mut state = self.state.lock();
    Ok(state.orders.get_mut(&id).map(|order| {
      order.status = status;
      order.updated_at = Utc::now();
      order.clone()
    }))
  }

  async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
    let mut state = self.state.lock();
    if state.orders.remove(&id).is_none() {
      return Ok(false);
    }
    state.transactions.retain(|_, t| t.order_id != id);
    state.outbox.retain(|m| m.order_id != id);
    Ok(true)
  }

  async fn find_transaction_for_order(&self, order_id: Uuid) -> AppResult<Option<Transaction>> {
    Ok(
      self
        .state
        .lock()
        .transactions
        .values()
        .find(|t| t.order_id == order_id)
        .cloned(),
    )
  }

  async fn list_transactions(&self) -> AppResult<Vec<Transaction>> {
    let rows = self.state.lock().transactions.values().cloned().collect();
    Ok(newest_first(rows, |t: &Transaction| t.created_at))
  }
}

#[async_trait]
impl OutboxStore for MemoryStore {
  async fn claim_due_messages(&self, now: DateTime<Utc>, lease: Duration, limit: usize) -> AppResult<Vec<OutboxMessage>> {
    let lease = chrono::Duration::from_std(lease).map_err(|e| AppError::Internal(format!("Lease out of range: {}", e)))?;
    let mut state = self.state.lock();
    let mut due: Vec<&mut OutboxMessage> = state.outbox.iter_mut().filter(|m| m.is_due(now)).collect();
    due.sort_by_key(|m| m.next_attempt_at);
    Ok(
      due
        .into_iter()
        .take(limit)
        .map(|message| {
          let claimed = message.clone();
          message.next_attempt_at = now + lease;
          claimed
        })
        .collect(),
    )
  }

  async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
    if let Some(message) = self.state.lock().outbox.iter_mut().find(|m| m.id == id) {
      message.state = DeliveryState::Delivered;
      message.delivered_at = Some(at);
      message.last_error = None;
    }
    Ok(())
  }

  async fn reschedule_message(&self, id: Uuid, attempts: i32, next_attempt_at: DateTime<Utc>, error: &str) -> AppResult<()> {
    if let Some(message) = self.state.lock().outbox.iter_mut().find(|m| m.id == id) {
      message.attempts = attempts;
      message.next_attempt_at = next_attempt_at;
      message.last_error = Some(error.to_string());
    }
    Ok(())
  }

  async fn mark_dead(&self, id: Uuid, attempts: i32, error: &str) -> AppResult<()> {
    if let Some(message) = self.state.lock().outbox.iter_mut().find(|m| m.id == id) {
      message.state = DeliveryState::Dead;
      message.attempts = attempts;
      message.last_error = Some(error.to_string());
    }
    Ok(())
  }

  async fn messages_for_order(&self, order_id: Uuid) -> AppResult<Vec<OutboxMessage>> {
    let state = self.state.lock();
    Ok(state.outbox.iter().filter(|m| m.order_id == order_id).cloned().collect())
  }
}

#[async_trait]
impl UserStore for MemoryStore {
  async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
    Ok(self.state.lock().users.get(&id).cloned())
  }

  async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
    Ok(self.state.lock().users.values().find(|u| u.email == email).cloned())
  }

  async fn insert_user(&self, user: &User) -> AppResult<()> {
    let mut state = self.state.lock();
    if state.users.values().any(|u| u.email == user.email) {
      return Err(AppError::Conflict("An account with this email already exists".to_string()));
    }
    state.users.insert(user.id, user.clone());
    Ok(())
  }
}
