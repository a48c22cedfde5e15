// storefront/src/web/handlers/admin_handlers.rs

//! Back-office JSON endpoints. Every handler takes an `AdminUser`, so a
//! missing token is a 401 and a non-admin token a 403.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Coupon, CouponDraft, OrderStatusUpdate, Product, ProductDraft, ProductPatch};
use crate::reports::{self, RevenueQuery, RECENT_ORDERS_LIMIT, TOP_PRODUCTS_LIMIT};
use crate::state::AppState;
use crate::web::extractors::AdminUser;

// --- Orders ---

#[instrument(name = "handler::admin::list_orders", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn list_orders_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.list_orders().await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}

/// One order with its transaction and the delivery state of its notifications.
#[instrument(name = "handler::admin::get_order", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .find_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  let transaction = app_state.store.find_transaction_for_order(order_id).await?;
  let notifications = app_state.store.messages_for_order(order_id).await?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "order": order,
    "transaction": transaction,
    "notifications": notifications,
  })))
}

#[instrument(name = "handler::admin::update_order_status", skip(app_state, admin, req_payload), fields(admin_id = %admin.0.user_id, status = ?req_payload.status))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  req_payload: web::Json<OrderStatusUpdate>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .update_order_status(order_id, req_payload.status)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  info!(%order_id, status = ?order.status, "Order status updated by admin.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "order": order })))
}

#[instrument(name = "handler::admin::delete_order", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn delete_order_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  if !app_state.store.delete_order(order_id).await? {
    return Err(AppError::NotFound(format!("Order {} not found", order_id)));
  }
  info!(%order_id, "Order deleted by admin.");
  Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[instrument(name = "handler::admin::list_transactions", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn list_transactions_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let transactions = app_state.store.list_transactions().await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "transactions": transactions })))
}

// --- Coupons ---

#[instrument(name = "handler::admin::list_coupons", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn list_coupons_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  let coupons = app_state.store.list_coupons().await?;
  Ok(HttpResponse::Ok().json(coupons))
}

#[instrument(name = "handler::admin::create_coupon", skip(app_state, admin, req_payload), fields(admin_id = %admin.0.user_id, code = %req_payload.code))]
pub async fn create_coupon_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  req_payload: web::Json<CouponDraft>,
) -> Result<HttpResponse, AppError> {
  let coupon = Coupon::from_draft(req_payload.into_inner(), Utc::now())?;
  app_state.store.insert_coupon(&coupon).await?;
  info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created.");
  Ok(HttpResponse::Created().json(json!({ "success": true, "coupon": coupon })))
}

#[instrument(name = "handler::admin::update_coupon", skip(app_state, admin, req_payload), fields(admin_id = %admin.0.user_id))]
pub async fn update_coupon_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  req_payload: web::Json<CouponDraft>,
) -> Result<HttpResponse, AppError> {
  let coupon_id = path.into_inner();
  let not_found = || AppError::NotFound(format!("Coupon {} not found", coupon_id));

  let mut coupon = app_state.store.find_coupon(coupon_id).await?.ok_or_else(not_found)?;
  coupon.apply_draft(req_payload.into_inner())?;
  if !app_state.store.update_coupon(&coupon).await? {
    return Err(not_found());
  }
  Ok(HttpResponse::Ok().json(json!({ "success": true, "coupon": coupon })))
}

#[instrument(name = "handler::admin::delete_coupon", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn delete_coupon_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let coupon_id = path.into_inner();
  if !app_state.store.delete_coupon(coupon_id).await? {
    return Err(AppError::NotFound(format!("Coupon {} not found", coupon_id)));
  }
  Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// --- Products ---

#[instrument(name = "handler::admin::list_products", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn list_products_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  let products = app_state.store.list_all_products().await?;
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(name = "handler::admin::create_product", skip(app_state, admin, req_payload), fields(admin_id = %admin.0.user_id, name = %req_payload.name))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  req_payload: web::Json<ProductDraft>,
) -> Result<HttpResponse, AppError> {
  let product = Product::from_draft(req_payload.into_inner(), Utc::now())?;
  app_state.store.insert_product(&product).await?;
  info!(product_id = %product.id, slug = %product.slug, "Product created.");
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::admin::get_product", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let product = app_state
    .store
    .find_product(product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::admin::update_product", skip(app_state, admin, req_payload), fields(admin_id = %admin.0.user_id))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  req_payload: web::Json<ProductPatch>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let not_found = || AppError::NotFound(format!("Product {} not found", product_id));

  let mut product = app_state.store.find_product(product_id).await?.ok_or_else(not_found)?;
  product.apply_patch(req_payload.into_inner(), Utc::now())?;
  if !app_state.store.update_product(&product).await? {
    return Err(not_found());
  }
  info!(%product_id, slug = %product.slug, is_out_of_stock = product.is_out_of_stock, "Product updated.");
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::admin::delete_product", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  if !app_state.store.delete_product(product_id).await? {
    return Err(AppError::NotFound(format!("Product {} not found", product_id)));
  }
  info!(%product_id, "Product deleted.");
  Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// --- Dashboard ---

#[instrument(name = "handler::admin::revenue", skip(app_state, admin), fields(admin_id = %admin.0.user_id, filter = ?query.filter))]
pub async fn revenue_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  query: web::Query<RevenueQuery>,
) -> Result<HttpResponse, AppError> {
  let earnings_rate = query.earnings_rate()?;
  let now = Utc::now();
  let orders = app_state.store.list_orders_since(query.filter.start(now)).await?;
  let series = reports::revenue_series(&orders, query.filter, now, earnings_rate)?;
  Ok(HttpResponse::Ok().json(series))
}

#[instrument(name = "handler::admin::top_products", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn top_products_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.list_orders().await?;
  let top = reports::top_products(&orders, TOP_PRODUCTS_LIMIT)?;
  Ok(HttpResponse::Ok().json(top))
}

#[instrument(name = "handler::admin::recent_orders", skip(app_state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn recent_orders_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.list_recent_orders(RECENT_ORDERS_LIMIT).await?;
  Ok(HttpResponse::Ok().json(orders))
}
