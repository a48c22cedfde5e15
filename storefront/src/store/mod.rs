// storefront/src/store/mod.rs

//! Persistence seams. `PgStore` is the production backend; `MemoryStore`
//! backs tests and local runs.

use crate::errors::Result as AppResult;
use crate::models::{
  Coupon, Order, OrderStatus, OutboxMessage, Product, ProductFilter, Transaction, TransactionStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Builds the notifications to enqueue once an order's status has changed.
pub type FollowUp<'a> = &'a (dyn Fn(&Order) -> Vec<OutboxMessage> + Send + Sync);

/// Everything written by a checkout, committed together.
#[derive(Debug, Clone)]
pub struct CheckoutRecord {
  pub order: Order,
  pub transaction: Transaction,
  pub notifications: Vec<OutboxMessage>,
}

#[derive(Debug, Clone)]
pub enum PersistOutcome {
  Created,
  /// An order already exists for the payment intent; nothing was written.
  Duplicate(Order),
}

#[derive(Debug, Clone)]
pub struct PaymentOutcomeApplied {
  pub order: Order,
  pub previous_status: OrderStatus,
  pub enqueued: usize,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
  async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>>;
  async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<Coupon>>;
  async fn list_coupons(&self) -> AppResult<Vec<Coupon>>;
  /// Fails with `Conflict` when the code is taken.
  async fn insert_coupon(&self, coupon: &Coupon) -> AppResult<()>;
  /// Replaces the coupon's terms. The redemption list is not written.
  async fn update_coupon(&self, coupon: &Coupon) -> AppResult<bool>;
  async fn delete_coupon(&self, id: Uuid) -> AppResult<bool>;
  /// Appends `user_id` to the redemption list if, at the moment of writing,
  /// the user is absent, the coupon is unexpired and below its limit.
  /// Returns `None` when any of those conditions does not hold.
  async fn redeem_coupon(&self, coupon_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Coupon>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
  async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;
  async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>>;
  /// Active products matching `filter`, newest first.
  async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>>;
  /// Every product, newest first, for the back office.
  async fn list_all_products(&self) -> AppResult<Vec<Product>>;
  /// Fails with `Conflict` when the slug is taken.
  async fn insert_product(&self, product: &Product) -> AppResult<()>;
  async fn update_product(&self, product: &Product) -> AppResult<bool>;
  /// Deletes the product and clears references from order snapshots.
  async fn delete_product(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Writes order, line items, transaction and notifications atomically,
  /// serialized per payment intent with webhook updates.
  async fn persist_checkout(&self, record: &CheckoutRecord) -> AppResult<PersistOutcome>;
  /// Sets the order and transaction status for `payment_intent_id`. Calls
  /// `follow_up` and enqueues its messages only if the order status changed.
  /// `None` when no order carries the payment intent.
  async fn apply_payment_outcome(
    &self,
    payment_intent_id: &str,
    order_status: OrderStatus,
    transaction_status: TransactionStatus,
    follow_up: FollowUp<'_>,
  ) -> AppResult<Option<PaymentOutcomeApplied>>;
  async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;
  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;
  async fn list_orders(&self) -> AppResult<Vec<Order>>;
  /// Orders created at or after `since`, oldest first.
  async fn list_orders_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Order>>;
  /// The `limit` newest orders.
  async fn list_recent_orders(&self, limit: usize) -> AppResult<Vec<Order>>;
  async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;
  async fn delete_order(&self, id: Uuid) -> AppResult<bool>;
  async fn find_transaction_for_order(&self, order_id: Uuid) -> AppResult<Option<Transaction>>;
  async fn list_transactions(&self) -> AppResult<Vec<Transaction>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
  /// Returns up to `limit` due messages and pushes their next attempt out by
  /// `lease` so concurrent workers skip them.
  async fn claim_due_messages(&self, now: DateTime<Utc>, lease: Duration, limit: usize) -> AppResult<Vec<OutboxMessage>>;
  async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
  async fn reschedule_message(&self, id: Uuid, attempts: i32, next_attempt_at: DateTime<Utc>, error: &str) -> AppResult<()>;
  async fn mark_dead(&self, id: Uuid, attempts: i32, error: &str) -> AppResult<()>;
  async fn messages_for_order(&self, order_id: Uuid) -> AppResult<Vec<OutboxMessage>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
  /// `email` must already be normalized.
  async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
  /// Fails with `Conflict` when the email is registered.
  async fn insert_user(&self, user: &User) -> AppResult<()>;
}

pub trait Store: CouponStore + ProductStore + OrderStore + OutboxStore + UserStore {}

impl<T> Store for T where T: CouponStore + ProductStore + OrderStore + OutboxStore + UserStore {}
