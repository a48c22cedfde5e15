// tests/dashboard_tests.rs
#[macro_use]
mod common;

use actix_web::test;
use chrono::{DateTime, Utc};
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

const SHOPPER: &str = "shopper@example.com";

fn line(product_id: Uuid, name: &str, price: f64, qty: i32) -> Value {
  json!({ "productId": product_id, "name": name, "price": price, "qty": qty, "image": format!("/img/{}.png", name) })
}

fn as_money(value: &Value) -> f64 {
  value.as_f64().expect("numeric amount")
}

macro_rules! place_order {
  ($service:expr, $items:expr, $amount:expr) => {{
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
      .set_json(json!({ "items": $items, "amount": $amount, "selectedCountry": "Australia" }))
      .to_request();
    let resp = test::call_service(&$service, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = test::read_body_json(resp).await;
    body["order"]["id"].as_str().expect("order id").to_string()
  }};
}

macro_rules! complete_order {
  ($service:expr, $order_id:expr) => {{
    let req = test::TestRequest::patch()
      .uri(&format!("/api/v1/admin/orders/{}", $order_id))
      .insert_header(bearer(&admin_token()))
      .set_json(json!({ "status": "completed" }))
      .to_request();
    assert_eq!(test::call_service(&$service, req).await.status().as_u16(), 200);
  }};
}

#[actix_web::test]
#[serial]
async fn test_revenue_counts_completed_orders_only() {
  let app = test_app();
  let service = init_app!(app.state);
  let (tea, mug) = (Uuid::new_v4(), Uuid::new_v4());

  let first = place_order!(service, json!([line(tea, "Tea", 40.0, 2)]), 91.95);
  let second = place_order!(service, json!([line(tea, "Tea", 40.0, 1), line(mug, "Mug", 10.0, 3)]), 81.95);
  place_order!(service, json!([line(mug, "Mug", 10.0, 5)]), 61.95);
  complete_order!(service, first);
  complete_order!(service, second);

  let get = |uri: &str| {
    test::TestRequest::get()
      .uri(uri)
      .insert_header(bearer(&admin_token()))
      .to_request()
  };

  let week: Value = test::call_and_read_body_json(&service, get("/api/v1/admin/revenue?filter=week&earningsRate=0.5")).await;
  let points = week.as_array().expect("revenue series");
  assert_eq!(points.len(), 1);
  assert_eq!(points[0]["time"], Utc::now().format("%d/%m").to_string());
  assert!((as_money(&points[0]["revenue"]) - 173.90).abs() < 1e-9);
  assert!((as_money(&points[0]["earnings"]) - 86.95).abs() < 1e-9);

  let year: Value = test::call_and_read_body_json(&service, get("/api/v1/admin/revenue?filter=year")).await;
  assert_eq!(year[0]["time"], Utc::now().format("Month %m").to_string());
  assert!((as_money(&year[0]["earnings"]) - 52.17).abs() < 1e-9);

  let default_period: Value = test::call_and_read_body_json(&service, get("/api/v1/admin/revenue")).await;
  assert_eq!(default_period.as_array().map(Vec::len), Some(1));

  for uri in ["/api/v1/admin/revenue?earningsRate=2", "/api/v1/admin/revenue?filter=decade"] {
    let resp = test::call_service(&service, get(uri)).await;
    assert_eq!(resp.status().as_u16(), 400, "{}", uri);
  }
}

#[actix_web::test]
#[serial]
async fn test_top_products_and_recent_orders() {
  let app = test_app();
  let service = init_app!(app.state);
  let (tea, mug) = (Uuid::new_v4(), Uuid::new_v4());

  place_order!(service, json!([line(tea, "Tea", 40.0, 2)]), 91.95);
  place_order!(service, json!([line(tea, "Tea", 40.0, 1), line(mug, "Mug", 10.0, 3)]), 81.95);
  for _ in 0..4 {
    place_order!(service, json!([line(mug, "Mug", 10.0, 2)]), 31.95);
  }

  let req = test::TestRequest::get()
    .uri("/api/v1/admin/top-products")
    .insert_header(bearer(&admin_token()))
    .to_request();
  let top: Value = test::call_and_read_body_json(&service, req).await;
  let ranking: Vec<(&str, i64)> = top
    .as_array()
    .expect("top products")
    .iter()
    .map(|p| (p["name"].as_str().unwrap(), p["sales"].as_i64().unwrap()))
    .collect();
  assert_eq!(ranking, vec![("Mug", 11), ("Tea", 3)]);
  assert!((as_money(&top[0]["revenue"]) - 110.0).abs() < 1e-9);
  assert_eq!(top[0]["image"], "/img/Mug.png");

  let req = test::TestRequest::get()
    .uri("/api/v1/admin/orders/recent")
    .insert_header(bearer(&admin_token()))
    .to_request();
  let recent: Value = test::call_and_read_body_json(&service, req).await;
  let created: Vec<DateTime<Utc>> = recent
    .as_array()
    .expect("recent orders")
    .iter()
    .map(|o| o["createdAt"].as_str().unwrap().parse().unwrap())
    .collect();
  assert_eq!(created.len(), 5);
  assert!(created.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[actix_web::test]
#[serial]
async fn test_dashboard_requires_an_admin_token() {
  let app = test_app();
  let service = init_app!(app.state);

  for uri in ["/api/v1/admin/revenue", "/api/v1/admin/top-products", "/api/v1/admin/orders/recent"] {
    let anonymous = test::TestRequest::get().uri(uri).to_request();
    assert_eq!(test::call_service(&service, anonymous).await.status().as_u16(), 401, "{}", uri);

    let customer = test::TestRequest::get()
      .uri(uri)
      .insert_header(bearer(&customer_token(Uuid::new_v4(), SHOPPER)))
      .to_request();
    assert_eq!(test::call_service(&service, customer).await.status().as_u16(), 403, "{}", uri);
  }
}
