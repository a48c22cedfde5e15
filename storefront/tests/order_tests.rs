// tests/order_tests.rs
#[macro_use]
mod common;

use actix_web::test;
use chrono::Utc;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use storefront::models::{DiscountType, NotificationKind, OrderStatus, TransactionStatus};
use storefront::services::auth_service::issue_token;
use storefront::services::IntentStatus;
use storefront::store::{CouponStore, OrderStore};
use uuid::Uuid;

const SHOPPER: &str = "shopper@example.com";

/// Two teas at 40.00 shipped within Australia: 80.00 + 11.95.
fn tea_order() -> Value {
  json!({
    "items": [{ "productId": Uuid::new_v4(), "name": "Tea", "price": 40.0, "qty": 2 }],
    "amount": 91.95,
    "selectedCountry": "Australia",
  })
}

fn with(mut body: Value, key: &str, value: Value) -> Value {
  body[key] = value;
  body
}

fn order_id_of(body: &Value) -> Uuid {
  body["order"]["id"].as_str().and_then(|id| id.parse().ok()).expect("order id in response")
}

#[actix_web::test]
#[serial]
async fn test_succeeded_payment_completes_transaction_and_leaves_order_pending() {
  let app = test_app();
  let service = init_app!(app.state);
  let user_id = Uuid::new_v4();
  let intent = seed_intent(&app.gateway, 9195, IntentStatus::Succeeded);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&customer_token(user_id, SHOPPER)))
    .set_json(with(tea_order(), "paymentId", json!(intent)))
    .to_request();
  let resp = test::call_service(&service, req).await;
  assert_eq!(resp.status().as_u16(), 201);
  let body: Value = test::read_body_json(resp).await;

  assert_eq!(body["success"], true);
  assert_eq!(body["order"]["status"], "pending");
  assert_eq!(body["order"]["userEmail"], SHOPPER);
  assert!(body["order"]["orderCode"].as_str().unwrap().starts_with("ORD-"));

  let order_id = order_id_of(&body);
  let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
  assert_eq!(txn.status, TransactionStatus::Completed);
  assert_eq!(txn.payment_method, "stripe");
  assert_eq!(txn.payment_intent_id.as_deref(), Some(intent.as_str()));
  assert_eq!(txn.amount, dec("91.95"));

  let kinds: Vec<NotificationKind> = app.store.outbox().iter().map(|m| m.kind).collect();
  assert_eq!(kinds, vec![NotificationKind::OrderConfirmation, NotificationKind::AdminOrderNotice]);
  let recipients: Vec<String> = app.store.outbox().into_iter().map(|m| m.recipient).collect();
  assert_eq!(recipients, vec![SHOPPER.to_string(), ADMIN_EMAIL.to_string()]);
}

#[actix_web::test]
#[serial]
async fn test_gateway_lookup_error_records_pending_and_succeeds() {
  let app = test_app();
  let service = init_app!(app.state);
  let intent = seed_intent(&app.gateway, 9195, IntentStatus::Succeeded);
  app.gateway.fail_lookups(true);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
    .set_json(with(tea_order(), "paymentId", json!(intent)))
    .to_request();
  let resp = test::call_service(&service, req).await;
  assert_eq!(resp.status().as_u16(), 201);
  let body: Value = test::read_body_json(resp).await;

  let order_id = order_id_of(&body);
  let order = app.store.find_order(order_id).await.unwrap().unwrap();
  let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(txn.status, TransactionStatus::Pending);
}

#[actix_web::test]
#[serial]
async fn test_unfinished_or_mismatched_payment_marks_both_failed() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = customer_token(Uuid::new_v4(), SHOPPER);
  let unpaid = seed_intent(&app.gateway, 9195, IntentStatus::RequiresPaymentMethod);
  let short_charge = seed_intent(&app.gateway, 100, IntentStatus::Succeeded);

  for intent in [unpaid, short_charge] {
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&token))
      .set_json(with(tea_order(), "paymentId", json!(intent)))
      .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    let order_id = order_id_of(&body);

    assert_eq!(body["order"]["status"], "failed");
    let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
    assert_eq!(txn.status, TransactionStatus::Failed);
  }
  assert!(app
    .store
    .outbox()
    .iter()
    .all(|m| m.kind == NotificationKind::FailedOrderNotice));
}

#[actix_web::test]
#[serial]
async fn test_without_payment_id_both_records_pending() {
  let app = test_app();
  let service = init_app!(app.state);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
    .set_json(tea_order())
    .to_request();
  let body: Value = test::call_and_read_body_json(&service, req).await;

  let txn = app.store.find_transaction_for_order(order_id_of(&body)).await.unwrap().unwrap();
  assert_eq!(body["order"]["status"], "pending");
  assert_eq!(txn.status, TransactionStatus::Pending);
  assert_eq!(app.gateway.intent_count(), 0);
}

#[actix_web::test]
#[serial]
async fn test_amount_mismatch_is_rejected_before_writing() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = customer_token(Uuid::new_v4(), SHOPPER);

  let bad_bodies = [
    with(tea_order(), "amount", json!(80.0)),
    with(tea_order(), "shipping", json!(0)),
    with(tea_order(), "items", json!([])),
    with(tea_order(), "currency", json!("usd")),
    with(
      tea_order(),
      "items",
      json!([{ "name": "Tea", "price": 40.0, "qty": 0 }]),
    ),
  ];
  for body in bad_bodies {
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&token))
      .set_json(&body)
      .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status().as_u16(), 400, "body {}", body);
  }

  assert_eq!(app.store.order_count(), 0);
  assert_eq!(app.store.transaction_count(), 0);
  assert!(app.store.outbox().is_empty());
}

#[actix_web::test]
#[serial]
async fn test_overflowing_quantities_and_prices_are_bad_requests() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = customer_token(Uuid::new_v4(), SHOPPER);
  let product_id = Uuid::new_v4();

  let bodies = [
    with(
      tea_order(),
      "items",
      json!([
        { "productId": product_id, "name": "Tea", "price": 1.0, "qty": 2_000_000_000 },
        { "productId": product_id, "name": "Tea", "price": 1.0, "qty": 2_000_000_000 },
      ]),
    ),
    with(tea_order(), "items", json!([{ "name": "Gold", "price": 5.0e28, "qty": 2 }])),
    with(
      tea_order(),
      "items",
      json!([
        { "name": "Gold", "price": 5.0e28, "qty": 1 },
        { "name": "Gold", "price": 5.0e28, "qty": 1 },
      ]),
    ),
  ];
  for body in bodies {
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&token))
      .set_json(&body)
      .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status().as_u16(), 400, "body {}", body);
  }
  assert_eq!(app.store.order_count(), 0);
}

#[actix_web::test]
#[serial]
async fn test_missing_email_and_missing_token_are_rejected() {
  let app = test_app();
  let service = init_app!(app.state);

  let anonymous = test::TestRequest::post().uri("/api/v1/orders").set_json(tea_order()).to_request();
  assert_eq!(test::call_service(&service, anonymous).await.status().as_u16(), 401);

  let no_email_token = issue_token(JWT_SECRET, Uuid::new_v4(), None, None, Utc::now()).unwrap();
  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&no_email_token))
    .set_json(tea_order())
    .to_request();
  assert_eq!(test::call_service(&service, req).await.status().as_u16(), 400);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&no_email_token))
    .set_json(with(tea_order(), "email", json!("guest@example.com")))
    .to_request();
  let body: Value = test::call_and_read_body_json(&service, req).await;
  assert_eq!(body["order"]["userEmail"], "guest@example.com");
}

#[actix_web::test]
#[serial]
async fn test_repeat_submission_for_same_payment_returns_existing_order() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = customer_token(Uuid::new_v4(), SHOPPER);
  let intent = seed_intent(&app.gateway, 9195, IntentStatus::Succeeded);
  let body = with(tea_order(), "paymentId", json!(intent));

  let first = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(&body)
    .to_request();
  let first_resp = test::call_service(&service, first).await;
  assert_eq!(first_resp.status().as_u16(), 201);
  let first_body: Value = test::read_body_json(first_resp).await;

  let second = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(&body)
    .to_request();
  let second_resp = test::call_service(&service, second).await;
  assert_eq!(second_resp.status().as_u16(), 200);
  let second_body: Value = test::read_body_json(second_resp).await;

  assert_eq!(order_id_of(&first_body), order_id_of(&second_body));
  assert_eq!(app.store.order_count(), 1);
  assert_eq!(app.store.outbox().len(), 2);
}

#[actix_web::test]
#[serial]
async fn test_coupon_order_uses_server_side_discount() {
  let app = test_app();
  let service = init_app!(app.state);
  let user_id = Uuid::new_v4();
  let token = customer_token(user_id, SHOPPER);
  let coupon = seed_coupon(&app.store, "SAVE10", DiscountType::Percentage, "10", 50, None).await;

  // 200.00 less 20.00 clears the free-shipping threshold.
  let body = json!({
    "items": [{ "name": "Kettle", "price": 100.0, "qty": 2 }],
    "amount": 180.0,
    "shipping": 0,
    "couponCode": "save10",
    "selectedCountry": "australia",
  });

  let unredeemed = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(&body)
    .to_request();
  assert_eq!(test::call_service(&service, unredeemed).await.status().as_u16(), 400);

  app.store.redeem_coupon(coupon.id, user_id, Utc::now()).await.unwrap();
  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(&body)
    .to_request();
  let resp = test::call_service(&service, req).await;
  assert_eq!(resp.status().as_u16(), 201);
  let created: Value = test::read_body_json(resp).await;

  let order = app.store.find_order(order_id_of(&created)).await.unwrap().unwrap();
  assert_eq!(order.discount, dec("20.00"));
  assert_eq!(order.shipping, dec("0"));
  assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
}

#[actix_web::test]
#[serial]
async fn test_failed_checkout_records_failed_order_and_notice() {
  let app = test_app();
  let service = init_app!(app.state);
  let intent = seed_intent(&app.gateway, 9195, IntentStatus::Succeeded);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders/failed")
    .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
    .set_json(with(tea_order(), "paymentId", json!(intent)))
    .to_request();
  let resp = test::call_service(&service, req).await;
  assert_eq!(resp.status().as_u16(), 201);
  let body: Value = test::read_body_json(resp).await;

  let order_id = order_id_of(&body);
  let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
  assert_eq!(body["order"]["status"], "failed");
  assert_eq!(txn.status, TransactionStatus::Failed);

  let outbox = app.store.outbox();
  assert_eq!(outbox.len(), 1);
  assert_eq!(outbox[0].kind, NotificationKind::FailedOrderNotice);
  assert_eq!(outbox[0].recipient, SHOPPER);
}

#[actix_web::test]
#[serial]
async fn test_order_history_lists_only_callers_orders() {
  let app = test_app();
  let service = init_app!(app.state);
  let alice = customer_token(Uuid::new_v4(), "alice@example.com");
  let bob = customer_token(Uuid::new_v4(), "bob@example.com");

  for token in [&alice, &alice, &bob] {
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(token))
      .set_json(tea_order())
      .to_request();
    assert_eq!(test::call_service(&service, req).await.status().as_u16(), 201);
  }

  let req = test::TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&alice)).to_request();
  let body: Value = test::call_and_read_body_json(&service, req).await;
  let orders = body["orders"].as_array().unwrap();
  assert_eq!(orders.len(), 2);
  assert!(orders.iter().all(|o| o["userEmail"] == "alice@example.com"));
}

#[actix_web::test]
#[serial]
async fn test_malformed_json_is_a_bad_request() {
  let app = test_app();
  let service = init_app!(app.state);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
    .insert_header(("Content-Type", "application/json"))
    .set_payload("{ not json")
    .to_request();
  let resp = test::call_service(&service, req).await;
  assert_eq!(resp.status().as_u16(), 400);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}
