// storefront/src/web/routes.rs

use actix_web::{web, HttpResponse};
use tracing::debug;

use crate::errors::AppError;
use crate::web::handlers::{
  admin_handlers, auth_handlers, checkout_handlers, coupon_handlers, order_handlers, payment_handlers,
  product_handlers, webhook_handlers,
};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed or mistyped JSON bodies become a 400 in the usual error shape.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().error_handler(|err, _req| {
    debug!(error = %err, "Rejected JSON body.");
    AppError::Validation(format!("Invalid request body: {}", err)).into()
  })
}

pub fn query_config() -> web::QueryConfig {
  web::QueryConfig::default().error_handler(|err, _req| {
    AppError::Validation(format!("Invalid query string: {}", err)).into()
  })
}

pub fn path_config() -> web::PathConfig {
  web::PathConfig::default().error_handler(|err, _req| {
    AppError::Validation(format!("Invalid path parameter: {}", err)).into()
  })
}

fn admin_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/login", web::post().to(auth_handlers::admin_login_handler))
    .route("/revenue", web::get().to(admin_handlers::revenue_handler))
    .route("/top-products", web::get().to(admin_handlers::top_products_handler))
    .service(
      web::scope("/orders")
        .route("", web::get().to(admin_handlers::list_orders_handler))
        .route("/recent", web::get().to(admin_handlers::recent_orders_handler))
        .route("/{order_id}", web::get().to(admin_handlers::get_order_handler))
        .route("/{order_id}", web::patch().to(admin_handlers::update_order_status_handler))
        .route("/{order_id}", web::delete().to(admin_handlers::delete_order_handler)),
    )
    .route("/transactions", web::get().to(admin_handlers::list_transactions_handler))
    .service(
      web::scope("/coupons")
        .route("", web::get().to(admin_handlers::list_coupons_handler))
        .route("", web::post().to(admin_handlers::create_coupon_handler))
        .route("/{coupon_id}", web::put().to(admin_handlers::update_coupon_handler))
        .route("/{coupon_id}", web::delete().to(admin_handlers::delete_coupon_handler)),
    )
    .service(
      web::scope("/products")
        .route("", web::get().to(admin_handlers::list_products_handler))
        .route("", web::post().to(admin_handlers::create_product_handler))
        .route("/{product_id}", web::get().to(admin_handlers::get_product_handler))
        .route("/{product_id}", web::patch().to(admin_handlers::update_product_handler))
        .route("/{product_id}", web::delete().to(admin_handlers::delete_product_handler)),
    );
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .route("/signup", web::post().to(auth_handlers::signup_handler))
          .route("/login", web::post().to(auth_handlers::login_handler))
          .route("/me", web::get().to(auth_handlers::me_handler)),
      )
      .route(
        "/payment-intents",
        web::post().to(payment_handlers::create_payment_intent_handler),
      )
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::place_order_handler))
          .route("", web::get().to(order_handlers::list_my_orders_handler))
          .route("/failed", web::post().to(order_handlers::record_failed_order_handler)),
      )
      .service(
        web::scope("/coupons")
          .route("", web::get().to(coupon_handlers::list_available_coupons_handler))
          .route("/apply", web::post().to(coupon_handlers::apply_coupon_handler)),
      )
      .route("/checkout/quote", web::post().to(checkout_handlers::quote_checkout_handler))
      .route("/webhooks/payment", web::post().to(webhook_handlers::payment_webhook_handler))
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/{slug}", web::get().to(product_handlers::get_product_handler)),
      )
      .service(web::scope("/admin").configure(admin_routes)),
  );
}
