// tests/webhook_tests.rs
#[macro_use]
mod common;

use actix_web::test;
use chrono::Utc;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use storefront::models::{NotificationKind, OrderStatus, TransactionStatus};
use storefront::pipelines::contexts::{CheckoutKind, PlaceOrderCtxData};
use storefront::services::payment_gateway::{EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED};
use storefront::services::webhook_signature::signature_header;
use storefront::services::IntentStatus;
use storefront::store::OrderStore;
use storefront_flow::ContextData;
use uuid::Uuid;

/// Runs the order pipeline against an intent the gateway reports as `status`.
async fn place_order_for(app: &TestApp, status: IntentStatus) -> (Uuid, String) {
  let intent = seed_intent(&app.gateway, 9195, status);
  let mut order = submission(vec![item("Tea", "40.00", 2)], "91.95");
  order.payment_id = Some(intent.clone());
  order.email = Some("shopper@example.com".to_string());

  let ctx = ContextData::new(PlaceOrderCtxData::new(
    app.state.clone(),
    CheckoutKind::Placed,
    Uuid::new_v4(),
    None,
    order,
  ));
  app.state.flows.run(ctx.clone()).await.expect("order should be placed");
  let order_id = ctx.read().order.as_ref().map(|o| o.id).expect("order recorded");
  (order_id, intent)
}

fn webhook_request(body: &str) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/api/v1/webhooks/payment")
    .insert_header(("Content-Type", "application/json"))
    .insert_header(signed(body))
    .set_payload(body.to_string())
}

#[actix_web::test]
#[serial]
async fn test_succeeded_event_completes_order_and_enqueues_once() {
  let app = test_app();
  let service = init_app!(app.state);
  let (order_id, intent) = place_order_for(&app, IntentStatus::Processing).await;
  // Still processing at checkout time, so both records start out failed.
  let placed = app.store.find_order(order_id).await.unwrap().unwrap();
  assert_eq!(placed.status, OrderStatus::Failed);
  let outbox_before = app.store.outbox().len();

  let event = gateway_event(EVENT_PAYMENT_SUCCEEDED, &intent);
  let body: Value = test::call_and_read_body_json(&service, webhook_request(&event).to_request()).await;
  assert_eq!(body, json!({ "received": true }));

  let order = app.store.find_order(order_id).await.unwrap().unwrap();
  let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Completed);
  assert_eq!(txn.status, TransactionStatus::Completed);

  let enqueued: Vec<NotificationKind> = app.store.outbox()[outbox_before..].iter().map(|m| m.kind).collect();
  assert_eq!(enqueued, vec![NotificationKind::OrderConfirmation, NotificationKind::AdminOrderNotice]);

  // Replays change nothing and enqueue nothing.
  let replay: Value = test::call_and_read_body_json(&service, webhook_request(&event).to_request()).await;
  assert_eq!(replay["received"], true);
  assert_eq!(app.store.outbox().len(), outbox_before + 2);
  assert_eq!(app.store.find_order(order_id).await.unwrap().unwrap().status, OrderStatus::Completed);
}

#[actix_web::test]
#[serial]
async fn test_failed_event_marks_order_and_transaction_failed() {
  let app = test_app();
  let service = init_app!(app.state);
  let (order_id, intent) = place_order_for(&app, IntentStatus::Succeeded).await;
  assert_eq!(app.store.find_order(order_id).await.unwrap().unwrap().status, OrderStatus::Pending);
  let outbox_before = app.store.outbox().len();

  let event = gateway_event(EVENT_PAYMENT_FAILED, &intent);
  let resp = test::call_service(&service, webhook_request(&event).to_request()).await;
  assert_eq!(resp.status().as_u16(), 200);

  let order = app.store.find_order(order_id).await.unwrap().unwrap();
  let txn = app.store.find_transaction_for_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Failed);
  assert_eq!(txn.status, TransactionStatus::Failed);
  assert_eq!(app.store.outbox().len(), outbox_before);
}

#[actix_web::test]
#[serial]
async fn test_unknown_intent_and_unrouted_events_are_acknowledged_without_writes() {
  let app = test_app();
  let service = init_app!(app.state);

  for event in [
    gateway_event(EVENT_PAYMENT_FAILED, "pi_nobody_knows"),
    gateway_event(EVENT_PAYMENT_SUCCEEDED, "pi_nobody_knows"),
    gateway_event("charge.refunded", "ch_123"),
  ] {
    let body: Value = test::call_and_read_body_json(&service, webhook_request(&event).to_request()).await;
    assert_eq!(body, json!({ "received": true }));
  }
  assert_eq!(app.store.order_count(), 0);
  assert!(app.store.outbox().is_empty());
}

#[actix_web::test]
#[serial]
async fn test_bad_or_missing_signature_is_unauthorized() {
  let app = test_app();
  let service = init_app!(app.state);
  let (order_id, intent) = place_order_for(&app, IntentStatus::Processing).await;
  let event = gateway_event(EVENT_PAYMENT_SUCCEEDED, &intent);

  let unsigned = test::TestRequest::post()
    .uri("/api/v1/webhooks/payment")
    .set_payload(event.clone())
    .to_request();
  assert_eq!(test::call_service(&service, unsigned).await.status().as_u16(), 401);

  let wrong_key = signature_header(event.as_bytes(), "whsec_other", Utc::now().timestamp()).unwrap();
  let forged = test::TestRequest::post()
    .uri("/api/v1/webhooks/payment")
    .insert_header(("Stripe-Signature", wrong_key))
    .set_payload(event.clone())
    .to_request();
  assert_eq!(test::call_service(&service, forged).await.status().as_u16(), 401);

  let stale = signature_header(event.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp() - 3600).unwrap();
  let replayed = test::TestRequest::post()
    .uri("/api/v1/webhooks/payment")
    .insert_header(("Stripe-Signature", stale))
    .set_payload(event.clone())
    .to_request();
  assert_eq!(test::call_service(&service, replayed).await.status().as_u16(), 401);

  // Signed for one body, delivered with another.
  let tampered = test::TestRequest::post()
    .uri("/api/v1/webhooks/payment")
    .insert_header(signed(&event))
    .set_payload(event.replace("succeeded", "payment_failed"))
    .to_request();
  assert_eq!(test::call_service(&service, tampered).await.status().as_u16(), 401);

  assert_eq!(app.store.find_order(order_id).await.unwrap().unwrap().status, OrderStatus::Failed);
}

#[actix_web::test]
#[serial]
async fn test_verified_but_malformed_body_is_bad_request() {
  let app = test_app();
  let service = init_app!(app.state);

  let body = r#"{"id": "evt_1", "type": "payment_intent.succeeded"}"#;
  let resp = test::call_service(&service, webhook_request(body).to_request()).await;
  assert_eq!(resp.status().as_u16(), 400);
}
