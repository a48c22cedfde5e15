// tests/outbox_tests.rs
mod common;

use chrono::{Duration, Utc};
use common::*;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use storefront::models::{DeliveryState, NotificationKind, OutboxMessage};
use storefront::pipelines::contexts::{CheckoutKind, PlaceOrderCtxData};
use storefront::services::notifications::{DispatchReport, MailSender};
use storefront::services::{NotificationDispatcher, RetryPolicy};
use storefront_flow::ContextData;
use tokio::sync::watch;
use uuid::Uuid;

const SHOPPER: &str = "shopper@example.com";

fn dispatcher(app: &TestApp, max_attempts: i32) -> NotificationDispatcher {
  NotificationDispatcher::new(
    app.store.clone(),
    app.mailer.clone(),
    MailSender {
      email: "noreply@shop.test".to_string(),
      name: "Shop".to_string(),
    },
    RetryPolicy {
      max_attempts,
      base_backoff: StdDuration::from_secs(30),
      max_backoff: StdDuration::from_secs(600),
    },
    10,
  )
}

async fn place_order(app: &TestApp, kind: CheckoutKind) {
  let mut order = submission(vec![item("Green <Tea>", "40.00", 2)], "91.95");
  order.email = Some(SHOPPER.to_string());
  let ctx = ContextData::new(PlaceOrderCtxData::new(app.state.clone(), kind, Uuid::new_v4(), None, order));
  app.state.flows.run(ctx).await.expect("order should be placed");
}

fn message_to(app: &TestApp, recipient: &str) -> OutboxMessage {
  app
    .store
    .outbox()
    .into_iter()
    .find(|m| m.recipient == recipient)
    .expect("message for recipient")
}

#[tokio::test]
#[serial]
async fn test_placed_order_notifications_are_delivered() {
  let app = test_app();
  place_order(&app, CheckoutKind::Placed).await;

  let report = dispatcher(&app, 5).dispatch_due(Utc::now()).await.unwrap();
  assert_eq!(
    report,
    DispatchReport {
      claimed: 2,
      delivered: 2,
      rescheduled: 0,
      dead: 0
    }
  );

  let sent = app.mailer.sent();
  let confirmation = sent.iter().find(|e| e.to == SHOPPER).expect("customer email sent");
  assert!(confirmation.subject.starts_with("Order Confirmation - ORD-"));
  assert!(confirmation.html.contains("<li>Green &lt;Tea&gt; × 2: $80.00</li>"));
  assert_eq!(confirmation.from_email, "noreply@shop.test");
  let notice = sent.iter().find(|e| e.to == ADMIN_EMAIL).expect("admin notice sent");
  assert!(notice.subject.starts_with("New Order Received - ORD-"));

  assert!(app.store.outbox().iter().all(|m| m.state == DeliveryState::Delivered && m.delivered_at.is_some()));

  // Nothing left to claim.
  let again = dispatcher(&app, 5).dispatch_due(Utc::now()).await.unwrap();
  assert_eq!(again.claimed, 0);
}

#[tokio::test]
#[serial]
async fn test_failed_order_notice_uses_failure_subject() {
  let app = test_app();
  place_order(&app, CheckoutKind::Failed).await;

  dispatcher(&app, 5).dispatch_due(Utc::now()).await.unwrap();

  let sent = app.mailer.sent();
  assert_eq!(sent.len(), 1);
  assert!(sent[0].subject.starts_with("Payment Failed - ORD-"));
  assert_eq!(app.store.outbox()[0].kind, NotificationKind::FailedOrderNotice);
}

#[tokio::test]
#[serial]
async fn test_failed_delivery_is_rescheduled_with_backoff_then_dead() {
  let app = test_app();
  place_order(&app, CheckoutKind::Placed).await;
  app.mailer.fail_recipient(SHOPPER);
  let worker = dispatcher(&app, 3);
  let t0 = Utc::now();

  let first = worker.dispatch_due(t0).await.unwrap();
  assert_eq!((first.delivered, first.rescheduled, first.dead), (1, 1, 0));
  let failing = message_to(&app, SHOPPER);
  assert_eq!(failing.state, DeliveryState::Pending);
  assert_eq!(failing.attempts, 1);
  assert_eq!(failing.next_attempt_at, t0 + Duration::seconds(30));
  assert!(failing.last_error.as_deref().unwrap().contains("Simulated email send failure"));

  // Not due yet.
  assert_eq!(worker.dispatch_due(t0 + Duration::seconds(10)).await.unwrap().claimed, 0);

  let t1 = t0 + Duration::seconds(31);
  let second = worker.dispatch_due(t1).await.unwrap();
  assert_eq!((second.claimed, second.rescheduled), (1, 1));
  let failing = message_to(&app, SHOPPER);
  assert_eq!(failing.attempts, 2);
  assert_eq!(failing.next_attempt_at, t1 + Duration::seconds(60));

  let t2 = t1 + Duration::seconds(61);
  let third = worker.dispatch_due(t2).await.unwrap();
  assert_eq!((third.claimed, third.dead), (1, 1));
  let dead = message_to(&app, SHOPPER);
  assert_eq!(dead.state, DeliveryState::Dead);
  assert_eq!(dead.attempts, 3);

  let later = worker.dispatch_due(t2 + Duration::days(1)).await.unwrap();
  assert_eq!(later.claimed, 0);
}

#[tokio::test]
#[serial]
async fn test_transient_failure_recovers_on_retry() {
  let app = test_app();
  place_order(&app, CheckoutKind::Failed).await;
  app.mailer.fail_next(1);
  let worker = dispatcher(&app, 5);
  let t0 = Utc::now();

  assert_eq!(worker.dispatch_due(t0).await.unwrap().rescheduled, 1);
  let retry = worker.dispatch_due(t0 + Duration::minutes(1)).await.unwrap();
  assert_eq!(retry.delivered, 1);

  let outbox = app.store.outbox();
  let message = &outbox[0];
  assert_eq!(message.state, DeliveryState::Delivered);
  assert_eq!(message.attempts, 1);
}

#[tokio::test]
#[serial]
async fn test_worker_delivers_on_wake_and_stops_on_shutdown() {
  let app = test_app();
  let wake = app.state.dispatcher_wakeup.clone();
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let worker = tokio::spawn(dispatcher(&app, 5).run(wake, shutdown_rx, StdDuration::from_secs(3600)));

  place_order(&app, CheckoutKind::Placed).await;

  let store = Arc::clone(&app.store);
  let delivered = async {
    loop {
      if store.outbox().iter().all(|m| m.state == DeliveryState::Delivered) && !store.outbox().is_empty() {
        break;
      }
      tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
  };
  tokio::time::timeout(StdDuration::from_secs(5), delivered)
    .await
    .expect("wake-up should trigger delivery well before the poll interval");

  shutdown_tx.send(true).unwrap();
  tokio::time::timeout(StdDuration::from_secs(5), worker)
    .await
    .expect("worker should stop")
    .unwrap();
}
