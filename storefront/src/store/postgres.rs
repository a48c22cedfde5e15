// storefront/src/store/postgres.rs

use super::{
  CheckoutRecord, CouponStore, FollowUp, OrderStore, OutboxStore, PaymentOutcomeApplied, PersistOutcome, ProductStore,
  UserStore,
};
use crate::errors::{AppError, Result as AppResult};
use crate::models::{
  Coupon, LineItem, Order, OrderStatus, OutboxMessage, Product, ProductFilter, Transaction, TransactionStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::FromRow;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

const COUPON_COLUMNS: &str =
  "id, code, discount_type, discount_value, min_purchase, expiry_date, usage_limit, used_by, created_at";
const PRODUCT_COLUMNS: &str = "id, name, slug, price, sale_price, short_description, description, brand, category, \
   category_slug, images, stock, is_out_of_stock, is_active, is_todays_deal, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_code, user_id, user_email, amount, shipping, discount, coupon_code, country, \
   currency, payment_intent_id, status, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
  "id, order_id, user_id, amount, currency, payment_method, payment_intent_id, status, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const OUTBOX_COLUMNS: &str =
  "id, order_id, kind, recipient, payload, state, attempts, next_attempt_at, last_error, created_at, delivered_at";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn attach_items(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    let mut conn = self.pool.acquire().await?;
    load_orders(&mut conn, rows).await
  }
}

#[derive(FromRow)]
struct OrderRow {
  id: Uuid,
  order_code: String,
  user_id: Uuid,
  user_email: String,
  amount: Decimal,
  shipping: Decimal,
  discount: Decimal,
  coupon_code: Option<String>,
  country: Option<String>,
  currency: String,
  payment_intent_id: Option<String>,
  status: OrderStatus,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl OrderRow {
  fn into_order(self, items: Vec<LineItem>) -> Order {
    Order {
      id: self.id,
      order_code: self.order_code,
      user_id: self.user_id,
      user_email: self.user_email,
      items,
      amount: self.amount,
      shipping: self.shipping,
      discount: self.discount,
      coupon_code: self.coupon_code,
      country: self.country,
      currency: self.currency,
      payment_intent_id: self.payment_intent_id,
      status: self.status,
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

#[derive(FromRow)]
struct LineItemRow {
  order_id: Uuid,
  product_id: Option<Uuid>,
  name: String,
  price: Decimal,
  qty: i32,
  image: String,
}

async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
  if rows.is_empty() {
    return Ok(Vec::new());
  }
  let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
  let item_rows = sqlx::query_as::<_, LineItemRow>(
    "SELECT order_id, product_id, name, price, qty, image FROM order_items \
     WHERE order_id = ANY($1) ORDER BY order_id, position",
  )
  .bind(&ids)
  .fetch_all(&mut *conn)
  .await?;

  let mut items_by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
  for row in item_rows {
    items_by_order.entry(row.order_id).or_default().push(LineItem {
      product_id: row.product_id,
      name: row.name,
      price: row.price,
      qty: row.qty,
      image: row.image,
    });
  }
  Ok(
    rows
      .into_iter()
      .map(|row| {
        let items = items_by_order.remove(&row.id).unwrap_or_default();
        row.into_order(items)
      })
      .collect(),
  )
}

/// Serializes writers touching the same payment intent until the transaction ends.
async fn lock_payment_intent(conn: &mut PgConnection, payment_intent_id: &str) -> AppResult<()> {
  sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
    .bind(payment_intent_id)
    .execute(&mut *conn)
    .await?;
  Ok(())
}

async fn insert_outbox(conn: &mut PgConnection, message: &OutboxMessage) -> AppResult<()> {
  sqlx::query(
    "INSERT INTO notification_outbox \
     (id, order_id, kind, recipient, payload, state, attempts, next_attempt_at, last_error, created_at, delivered_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
  )
  .bind(message.id)
  .bind(message.order_id)
  .bind(message.kind)
  .bind(&message.recipient)
  .bind(&message.payload)
  .bind(message.state)
  .bind(message.attempts)
  .bind(message.next_attempt_at)
  .bind(&message.last_error)
  .bind(message.created_at)
  .bind(message.delivered_at)
  .execute(&mut *conn)
  .await?;
  Ok(())
}

fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
  let is_unique = err
    .as_database_error()
    .and_then(|db| db.code())
    .is_some_and(|code| code == UNIQUE_VIOLATION);
  if is_unique {
    AppError::Conflict(message())
  } else {
    AppError::Sqlx(err)
  }
}

#[async_trait]
impl CouponStore for PgStore {
  async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>> {
    let sql = format!("SELECT {} FROM coupons WHERE id = $1", COUPON_COLUMNS);
    Ok(sqlx::query_as::<_, Coupon>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_coupon_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
    let sql = format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS);
    Ok(sqlx::query_as::<_, Coupon>(&sql).bind(code).fetch_optional(&self.pool).await?)
  }

  async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
    let sql = format!("SELECT {} FROM coupons ORDER BY created_at DESC", COUPON_COLUMNS);
    Ok(sqlx::query_as::<_, Coupon>(&sql).fetch_all(&self.pool).await?)
  }

  async fn insert_coupon(&self, coupon: &Coupon) -> AppResult<()> {
    sqlx::query(
      "INSERT INTO coupons (id, code, discount_type, discount_value, min_purchase, expiry_date, usage_limit, used_by, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(coupon.id)
    .bind(&coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.min_purchase)
    .bind(coupon.expiry_date)
    .bind(coupon.usage_limit)
    .bind(&coupon.used_by)
    .bind(coupon.created_at)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("Coupon code {} already exists", coupon.code)))?;
    Ok(())
  }

  async fn update_coupon(&self, coupon: &Coupon) -> AppResult<bool> {
    let result = sqlx::query(
      "UPDATE coupons SET code = $2, discount_type = $3, discount_value = $4, min_purchase = $5, \
       expiry_date = $6, usage_limit = $7 WHERE id = $1",
    )
    .bind(coupon.id)
    .bind(&coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.min_purchase)
    .bind(coupon.expiry_date)
    .bind(coupon.usage_limit)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("Coupon code {} already exists", coupon.code)))?;
    Ok(result.rows_affected() > 0)
  }

  async fn delete_coupon(&self, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&self.pool).await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(name = "pg::redeem_coupon", skip(self))]
  async fn redeem_coupon(&self, coupon_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Coupon>> {
    let sql = format!(
      "UPDATE coupons SET used_by = array_append(used_by, $2) \
       WHERE id = $1 \
         AND NOT ($2 = ANY(used_by)) \
         AND cardinality(used_by) < usage_limit \
         AND (expiry_date IS NULL OR expiry_date >= $3) \
       RETURNING {}",
      COUPON_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Coupon>(&sql)
        .bind(coupon_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}

#[async_trait]
impl ProductStore for PgStore {
  async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
    Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE slug = $1", PRODUCT_COLUMNS);
    Ok(sqlx::query_as::<_, Product>(&sql).bind(slug).fetch_optional(&self.pool).await?)
  }

  async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
    let sql = format!(
      "SELECT {} FROM products \
       WHERE is_active \
         AND ($1::text IS NULL OR lower(brand) = lower($1)) \
         AND ($2::text IS NULL OR category_slug = $2) \
         AND (NOT $3 OR is_todays_deal) \
       ORDER BY created_at DESC",
      PRODUCT_COLUMNS
    );
    let brand = filter.brand.as_deref().map(str::trim).filter(|b| !b.is_empty());
    Ok(
      sqlx::query_as::<_, Product>(&sql)
        .bind(brand)
        .bind(filter.category_slug())
        .bind(filter.todays_deal.unwrap_or(false))
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn list_all_products(&self) -> AppResult<Vec<Product>> {
    let sql = format!("SELECT {} FROM products ORDER BY created_at DESC", PRODUCT_COLUMNS);
    Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?)
  }

  async fn insert_product(&self, product: &Product) -> AppResult<()> {
    sqlx::query(
      "INSERT INTO products (id, name, slug, price, sale_price, short_description, description, brand, category, \
       category_slug, images, stock, is_out_of_stock, is_active, is_todays_deal, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(product.price)
    .bind(product.sale_price)
    .bind(&product.short_description)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(&product.category)
    .bind(&product.category_slug)
    .bind(&product.images)
    .bind(product.stock)
    .bind(product.is_out_of_stock)
    .bind(product.is_active)
    .bind(product.is_todays_deal)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("A product with slug '{}' already exists", product.slug)))?;
    Ok(())
  }

  async fn update_product(&self, product: &Product) -> AppResult<bool> {
    let result = sqlx::query(
      "UPDATE products SET name = $2, slug = $3, price = $4, sale_price = $5, short_description = $6, \
       description = $7, brand = $8, category = $9, category_slug = $10, images = $11, stock = $12, \
       is_out_of_stock = $13, is_active = $14, is_todays_deal = $15, updated_at = $16 WHERE id = $1",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(product.price)
    .bind(product.sale_price)
    .bind(&product.short_description)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(&product.category)
    .bind(&product.category_slug)
    .bind(&product.images)
    .bind(product.stock)
    .bind(product.is_out_of_stock)
    .bind(product.is_active)
    .bind(product.is_todays_deal)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("A product with slug '{}' already exists", product.slug)))?;
    Ok(result.rows_affected() > 0)
  }

  async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("UPDATE order_items SET product_id = NULL WHERE product_id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "pg::persist_checkout", skip_all, fields(order_id = %record.order.id), err(Display))]
  async fn persist_checkout(&self, record: &CheckoutRecord) -> AppResult<PersistOutcome> {
    let order = &record.order;
    let mut tx = self.pool.begin().await?;

    if let Some(intent) = order.payment_intent_id.as_deref() {
      lock_payment_intent(&mut tx, intent).await?;
      let sql = format!(
        "SELECT {} FROM orders WHERE payment_intent_id = $1 ORDER BY created_at DESC LIMIT 1",
        ORDER_COLUMNS
      );
      let existing = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(intent)
        .fetch_optional(&mut *tx)
        .await?;
      if let Some(row) = existing {
        let mut orders = load_orders(&mut tx, vec![row]).await?;
        tx.rollback().await?;
        if let Some(existing) = orders.pop() {
          return Ok(PersistOutcome::Duplicate(existing));
        }
        return Err(AppError::Internal("Existing order vanished during lookup".to_string()));
      }
    }

    sqlx::query(
      "INSERT INTO orders (id, order_code, user_id, user_email, amount, shipping, discount, coupon_code, country, \
       currency, payment_intent_id, status, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(order.id)
    .bind(&order.order_code)
    .bind(order.user_id)
    .bind(&order.user_email)
    .bind(order.amount)
    .bind(order.shipping)
    .bind(order.discount)
    .bind(&order.coupon_code)
    .bind(&order.country)
    .bind(&order.currency)
    .bind(&order.payment_intent_id)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
      sqlx::query(
        "INSERT INTO order_items (order_id, position, product_id, name, price, qty, image) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
      )
      .bind(order.id)
      .bind(position as i32)
      .bind(item.product_id)
      .bind(&item.name)
      .bind(item.price)
      .bind(item.qty)
      .bind(&item.image)
      .execute(&mut *tx)
      .await?;
    }

    let txn = &record.transaction;
    sqlx::query(
      "INSERT INTO transactions (id, order_id, user_id, amount, currency, payment_method, payment_intent_id, \
       status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(txn.id)
    .bind(txn.order_id)
    .bind(txn.user_id)
    .bind(txn.amount)
    .bind(&txn.currency)
    .bind(&txn.payment_method)
    .bind(&txn.payment_intent_id)
    .bind(txn.status)
    .bind(txn.created_at)
    .bind(txn.updated_at)
    .execute(&mut *tx)
    .await?;

    for message in &record.notifications {
      insert_outbox(&mut tx, message).await?;
    }

    tx.commit().await?;
    Ok(PersistOutcome::Created)
  }

  #[instrument(name = "pg::apply_payment_outcome", skip(self, follow_up), err(Display))]
  async fn apply_payment_outcome(
    &self,
    payment_intent_id: &str,
    order_status: OrderStatus,
    transaction_status: TransactionStatus,
    follow_up: FollowUp<'_>,
  ) -> AppResult<Option<PaymentOutcomeApplied>> {
    let mut tx = self.pool.begin().await?;
    lock_payment_intent(&mut tx, payment_intent_id).await?;

    let sql = format!(
      "SELECT {} FROM orders WHERE payment_intent_id = $1 ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
      ORDER_COLUMNS
    );
    let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(payment_intent_id)
      .fetch_optional(&mut *tx)
      .await?
    else {
      tx.rollback().await?;
      return Ok(None);
    };
    let previous_status = row.status;
    let order_id = row.id;
    let now = Utc::now();

    let update_sql = format!(
      "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    let updated = sqlx::query_as::<_, OrderRow>(&update_sql)
      .bind(order_id)
      .bind(order_status)
      .bind(now)
      .fetch_one(&mut *tx)
      .await?;
    sqlx::query("UPDATE transactions SET status = $2, updated_at = $3 WHERE order_id = $1")
      .bind(order_id)
      .bind(transaction_status)
      .bind(now)
      .execute(&mut *tx)
      .await?;

    let order = load_orders(&mut tx, vec![updated])
      .await?
      .pop()
      .ok_or_else(|| AppError::Internal("Updated order vanished during reload".to_string()))?;

    let mut enqueued = 0;
    if previous_status != order_status {
      for message in follow_up(&order) {
        insert_outbox(&mut tx, &message).await?;
        enqueued += 1;
      }
    }
    tx.commit().await?;

    Ok(Some(PaymentOutcomeApplied {
      order,
      previous_status,
      enqueued,
    }))
  }

  async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
    match row {
      Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
      None => Ok(None),
    }
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(user_id).fetch_all(&self.pool).await?;
    self.attach_items(rows).await
  }

  async fn list_orders(&self) -> AppResult<Vec<Order>> {
    let sql = format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS);
    let rows = sqlx::query_as::<_, OrderRow>(&sql).fetch_all(&self.pool).await?;
    self.attach_items(rows).await
  }

  async fn list_orders_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE created_at >= $1 ORDER BY created_at",
      ORDER_COLUMNS
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(since).fetch_all(&self.pool).await?;
    self.attach_items(rows).await
  }

  async fn list_recent_orders(&self, limit: usize) -> AppResult<Vec<Order>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!("SELECT {} FROM orders ORDER BY created_at DESC LIMIT $1", ORDER_COLUMNS);
    let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(limit).fetch_all(&self.pool).await?;
    self.attach_items(rows).await
  }

  async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .bind(status)
      .bind(Utc::now())
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
      None => Ok(None),
    }
  }

  async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
    Ok(result.rows_affected() > 0)
  }

  async fn find_transaction_for_order(&self, order_id: Uuid) -> AppResult<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE order_id = $1", TRANSACTION_COLUMNS);
    Ok(
      sqlx::query_as::<_, Transaction>(&sql)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_transactions(&self) -> AppResult<Vec<Transaction>> {
    let sql = format!("SELECT {} FROM transactions ORDER BY created_at DESC", TRANSACTION_COLUMNS);
    Ok(sqlx::query_as::<_, Transaction>(&sql).fetch_all(&self.pool).await?)
  }
}

#[async_trait]
impl OutboxStore for PgStore {
  async fn claim_due_messages(&self, now: DateTime<Utc>, lease: Duration, limit: usize) -> AppResult<Vec<OutboxMessage>> {
    let lease = chrono::Duration::from_std(lease).map_err(|e| AppError::Internal(format!("Lease out of range: {}", e)))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    // Rows come back as they were before the lease was applied.
    let sql = format!(
      "WITH due AS ( \
         SELECT id FROM notification_outbox \
         WHERE state = 'pending' AND next_attempt_at <= $1 \
         ORDER BY next_attempt_at \
         LIMIT $2 \
         FOR UPDATE SKIP LOCKED \
       ), claimed AS ( \
         SELECT {cols} FROM notification_outbox WHERE id IN (SELECT id FROM due) \
       ), leased AS ( \
         UPDATE notification_outbox SET next_attempt_at = $3 WHERE id IN (SELECT id FROM due) \
       ) \
       SELECT {cols} FROM claimed ORDER BY next_attempt_at",
      cols = OUTBOX_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, OutboxMessage>(&sql)
        .bind(now)
        .bind(limit)
        .bind(now + lease)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
    sqlx::query(
      "UPDATE notification_outbox SET state = 'delivered', delivered_at = $2, last_error = NULL WHERE id = $1",
    )
    .bind(id)
    .bind(at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn reschedule_message(&self, id: Uuid, attempts: i32, next_attempt_at: DateTime<Utc>, error: &str) -> AppResult<()> {
    sqlx::query("UPDATE notification_outbox SET attempts = $2, next_attempt_at = $3, last_error = $4 WHERE id = $1")
      .bind(id)
      .bind(attempts)
      .bind(next_attempt_at)
      .bind(error)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn mark_dead(&self, id: Uuid, attempts: i32, error: &str) -> AppResult<()> {
    sqlx::query("UPDATE notification_outbox SET state = 'dead', attempts = $2, last_error = $3 WHERE id = $1")
      .bind(id)
      .bind(attempts)
      .bind(error)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn messages_for_order(&self, order_id: Uuid) -> AppResult<Vec<OutboxMessage>> {
    let sql = format!(
      "SELECT {} FROM notification_outbox WHERE order_id = $1 ORDER BY created_at",
      OUTBOX_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, OutboxMessage>(&sql)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }
}

#[async_trait]
impl UserStore for PgStore {
  async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
  }

  async fn insert_user(&self, user: &User) -> AppResult<()> {
    sqlx::query(
      "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| conflict_on_unique(e, || "An account with this email already exists".to_string()))?;
    Ok(())
  }
}
