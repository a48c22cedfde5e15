// tests/admin_catalog_tests.rs
#[macro_use]
mod common;

use actix_web::test;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use storefront::models::{DiscountType, OrderStatus};
use storefront::pipelines::contexts::{CheckoutKind, PlaceOrderCtxData};
use storefront::store::OrderStore;
use storefront_flow::ContextData;
use uuid::Uuid;

fn product_body(name: &str, brand: &str, category: &str, stock: i32) -> Value {
  json!({
    "name": name,
    "price": 24.5,
    "brand": brand,
    "category": category,
    "stock": stock,
  })
}

#[actix_web::test]
#[serial]
async fn test_admin_routes_require_admin_role() {
  let app = test_app();
  let service = init_app!(app.state);

  for uri in ["/api/v1/admin/orders", "/api/v1/admin/coupons", "/api/v1/admin/transactions"] {
    let anonymous = test::TestRequest::get().uri(uri).to_request();
    assert_eq!(test::call_service(&service, anonymous).await.status().as_u16(), 401, "{}", uri);

    let customer = test::TestRequest::get()
      .uri(uri)
      .insert_header(bearer(&customer_token(Uuid::new_v4(), "shopper@example.com")))
      .to_request();
    assert_eq!(test::call_service(&service, customer).await.status().as_u16(), 403, "{}", uri);

    let admin = test::TestRequest::get().uri(uri).insert_header(bearer(&admin_token())).to_request();
    assert_eq!(test::call_service(&service, admin).await.status().as_u16(), 200, "{}", uri);
  }

  let garbage = test::TestRequest::get()
    .uri("/api/v1/admin/orders")
    .insert_header(bearer("not-a-jwt"))
    .to_request();
  assert_eq!(test::call_service(&service, garbage).await.status().as_u16(), 401);
}

#[actix_web::test]
#[serial]
async fn test_product_lifecycle_derives_slug_and_stock_flag() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = admin_token();

  let create = test::TestRequest::post()
    .uri("/api/v1/admin/products")
    .insert_header(bearer(&token))
    .set_json(product_body("Rose Face Mist 100ml", "Petal", "Skin & Body", 0))
    .to_request();
  let resp = test::call_service(&service, create).await;
  assert_eq!(resp.status().as_u16(), 201);
  let created: Value = test::read_body_json(resp).await;
  assert_eq!(created["slug"], "rose-face-mist-100ml");
  assert_eq!(created["categorySlug"], "skin-and-body");
  assert_eq!(created["isOutOfStock"], true);
  let product_id = created["id"].as_str().unwrap().to_string();

  let restock = test::TestRequest::patch()
    .uri(&format!("/api/v1/admin/products/{}", product_id))
    .insert_header(bearer(&token))
    .set_json(json!({ "stock": 12 }))
    .to_request();
  let patched: Value = test::call_and_read_body_json(&service, restock).await;
  assert_eq!(patched["isOutOfStock"], false);
  assert_eq!(patched["stock"], 12);
  assert_eq!(patched["slug"], "rose-face-mist-100ml");

  let duplicate = test::TestRequest::post()
    .uri("/api/v1/admin/products")
    .insert_header(bearer(&token))
    .set_json(product_body("Rose Face Mist (100ml)", "Petal", "Skin", 3))
    .to_request();
  assert_eq!(test::call_service(&service, duplicate).await.status().as_u16(), 409);

  let fetch = test::TestRequest::get()
    .uri("/api/v1/products/rose-face-mist-100ml")
    .to_request();
  let public: Value = test::call_and_read_body_json(&service, fetch).await;
  assert_eq!(public["id"], product_id.as_str());

  let delete = test::TestRequest::delete()
    .uri(&format!("/api/v1/admin/products/{}", product_id))
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&service, delete).await.status().as_u16(), 200);
  let gone = test::TestRequest::get()
    .uri(&format!("/api/v1/admin/products/{}", product_id))
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&service, gone).await.status().as_u16(), 404);
}

#[actix_web::test]
#[serial]
async fn test_public_catalog_filters_and_hides_inactive() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = admin_token();

  let mut bodies = vec![
    product_body("Vitamin C Serum", "Glow", "Skin & Body", 5),
    product_body("Argan Hair Oil", "Glow", "Hair Care", 5),
    product_body("Clay Mask", "Earth", "Skin & Body", 5),
  ];
  bodies[1]["isTodaysDeal"] = json!(true);
  let mut hidden = product_body("Retired Toner", "Glow", "Skin & Body", 5);
  hidden["isActive"] = json!(false);
  bodies.push(hidden);
  for body in bodies {
    let req = test::TestRequest::post()
      .uri("/api/v1/admin/products")
      .insert_header(bearer(&token))
      .set_json(body)
      .to_request();
    assert_eq!(test::call_service(&service, req).await.status().as_u16(), 201);
  }

  let names = |body: Value| -> Vec<String> {
    let mut names: Vec<String> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|p| p["name"].as_str().unwrap().to_string())
      .collect();
    names.sort();
    names
  };

  let cases = [
    ("/api/v1/products", vec!["Argan Hair Oil", "Clay Mask", "Vitamin C Serum"]),
    ("/api/v1/products?brand=glow", vec!["Argan Hair Oil", "Vitamin C Serum"]),
    ("/api/v1/products?category=skin-and-body", vec!["Clay Mask", "Vitamin C Serum"]),
    ("/api/v1/products?isTodayDeal=true", vec!["Argan Hair Oil"]),
  ];
  for (uri, expected) in cases {
    let body: Value = test::call_and_read_body_json(&service, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(names(body), expected, "{}", uri);
  }

  let serum: Value = test::call_and_read_body_json(
    &service,
    test::TestRequest::get().uri("/api/v1/products/vitamin-c-serum").to_request(),
  )
  .await;
  assert_eq!(serum["category"], "Skin & Body");
  assert_eq!(serum["categorySlug"], "skin-and-body");
  assert_eq!(serum["categoryName"], "Skin & Body");
  let listed: Value = test::call_and_read_body_json(
    &service,
    test::TestRequest::get().uri("/api/v1/products?category=hair-care").to_request(),
  )
  .await;
  assert_eq!(listed[0]["categoryName"], "Hair Care");

  let inactive = test::TestRequest::get().uri("/api/v1/products/retired-toner").to_request();
  assert_eq!(test::call_service(&service, inactive).await.status().as_u16(), 404);

  let all = test::TestRequest::get()
    .uri("/api/v1/admin/products")
    .insert_header(bearer(&token))
    .to_request();
  let body: Value = test::call_and_read_body_json(&service, all).await;
  assert_eq!(body.as_array().unwrap().len(), 4);

  let bad_query = test::TestRequest::get().uri("/api/v1/products?isTodayDeal=maybe").to_request();
  assert_eq!(test::call_service(&service, bad_query).await.status().as_u16(), 400);
}

#[actix_web::test]
#[serial]
async fn test_admin_order_view_and_status_update() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = admin_token();

  let mut order = submission(vec![item("Tea", "40.00", 2)], "91.95");
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

  let view = test::TestRequest::get()
    .uri(&format!("/api/v1/admin/orders/{}", order_id))
    .insert_header(bearer(&token))
    .to_request();
  let body: Value = test::call_and_read_body_json(&service, view).await;
  assert_eq!(body["order"]["status"], "pending");
  assert_eq!(body["transaction"]["status"], "pending");
  let kinds: Vec<&str> = body["notifications"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|n| n["kind"].as_str())
    .collect();
  assert_eq!(kinds, vec!["order_confirmation", "admin_order_notice"]);

  let update = test::TestRequest::patch()
    .uri(&format!("/api/v1/admin/orders/{}", order_id))
    .insert_header(bearer(&token))
    .set_json(json!({ "status": "completed" }))
    .to_request();
  let updated: Value = test::call_and_read_body_json(&service, update).await;
  assert_eq!(updated["order"]["status"], "completed");
  assert_eq!(
    app.store.find_order(order_id).await.unwrap().unwrap().status,
    OrderStatus::Completed
  );

  let missing = test::TestRequest::get()
    .uri(&format!("/api/v1/admin/orders/{}", Uuid::new_v4()))
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&service, missing).await.status().as_u16(), 404);
}

#[actix_web::test]
#[serial]
async fn test_malformed_ids_in_admin_paths_are_bad_requests() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = admin_token();

  for (method, uri) in [
    ("GET", "/api/v1/admin/orders/not-a-uuid"),
    ("DELETE", "/api/v1/admin/orders/12345"),
    ("GET", "/api/v1/admin/products/rose-face-mist"),
    ("DELETE", "/api/v1/admin/coupons/SPRING15"),
  ] {
    let req = match method {
      "GET" => test::TestRequest::get(),
      _ => test::TestRequest::delete(),
    }
    .uri(uri)
    .insert_header(bearer(&token))
    .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status().as_u16(), 400, "{} {}", method, uri);
    let body: Value = test::read_body_json(resp).await;
    assert!(
      body["error"].as_str().unwrap().starts_with("Invalid path parameter"),
      "{} {}: {}",
      method,
      uri,
      body
    );
  }
}

#[actix_web::test]
#[serial]
async fn test_admin_coupon_crud_and_duplicate_code() {
  let app = test_app();
  let service = init_app!(app.state);
  let token = admin_token();
  let draft = json!({
    "code": "spring15",
    "discountType": "percentage",
    "discountValue": 15,
    "usageLimit": 50,
  });

  let create = test::TestRequest::post()
    .uri("/api/v1/admin/coupons")
    .insert_header(bearer(&token))
    .set_json(&draft)
    .to_request();
  let resp = test::call_service(&service, create).await;
  assert_eq!(resp.status().as_u16(), 201);
  let created: Value = test::read_body_json(resp).await;
  assert_eq!(created["coupon"]["code"], "SPRING15");
  let coupon_id = created["coupon"]["id"].as_str().unwrap().to_string();

  let again = test::TestRequest::post()
    .uri("/api/v1/admin/coupons")
    .insert_header(bearer(&token))
    .set_json(&draft)
    .to_request();
  assert_eq!(test::call_service(&service, again).await.status().as_u16(), 409);

  let update = test::TestRequest::put()
    .uri(&format!("/api/v1/admin/coupons/{}", coupon_id))
    .insert_header(bearer(&token))
    .set_json(json!({
      "code": "SPRING20",
      "discountType": "fixed",
      "discountValue": 20,
      "usageLimit": 10,
    }))
    .to_request();
  let updated: Value = test::call_and_read_body_json(&service, update).await;
  assert_eq!(updated["coupon"]["code"], "SPRING20");
  assert_eq!(updated["coupon"]["discountType"], "fixed");

  let delete = test::TestRequest::delete()
    .uri(&format!("/api/v1/admin/coupons/{}", coupon_id))
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&service, delete).await.status().as_u16(), 200);
  let list = test::TestRequest::get()
    .uri("/api/v1/admin/coupons")
    .insert_header(bearer(&token))
    .to_request();
  let body: Value = test::call_and_read_body_json(&service, list).await;
  assert!(body.as_array().unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn test_checkout_quote_applies_shipping_and_coupon() {
  let app = test_app();
  seed_coupon(&app.store, "SAVE10", DiscountType::Percentage, "10", 100, None).await;
  let service = init_app!(app.state);

  let quote = |items: Vec<storefront::models::LineItem>, country: &str, coupon: Option<&str>| {
    test::TestRequest::post()
      .uri("/api/v1/checkout/quote")
      .set_json(json!({ "items": items, "country": country, "coupon": coupon }))
      .to_request()
  };

  let free: Value =
    test::call_and_read_body_json(&service, quote(vec![item("Serum", "100.00", 2)], "Australia", None)).await;
  assert_eq!(free["subtotal"].as_f64(), Some(200.0));
  assert_eq!(free["shipping"].as_f64(), Some(0.0));
  assert_eq!(free["total"].as_f64(), Some(200.0));

  let domestic: Value =
    test::call_and_read_body_json(&service, quote(vec![item("Serum", "40.00", 2)], "Australia", None)).await;
  assert_eq!(domestic["shipping"].as_f64(), Some(11.95));
  assert_eq!(domestic["total"].as_f64(), Some(91.95));

  let abroad: Value =
    test::call_and_read_body_json(&service, quote(vec![item("Serum", "40.00", 2)], "Canada", None)).await;
  assert_eq!(abroad["shipping"].as_f64(), Some(15.0));

  let discounted: Value = test::call_and_read_body_json(
    &service,
    quote(vec![item("Serum", "100.00", 2)], "Australia", Some("save10")),
  )
  .await;
  assert_eq!(discounted["discount"].as_f64(), Some(20.0));
  assert_eq!(discounted["shipping"].as_f64(), Some(0.0));
  assert_eq!(discounted["total"].as_f64(), Some(180.0));

  let unknown = quote(vec![item("Serum", "10.00", 1)], "Australia", Some("NOPE"));
  assert_eq!(test::call_service(&service, unknown).await.status().as_u16(), 404);

  let zero_qty = quote(vec![item("Serum", "10.00", 0)], "Australia", None);
  assert_eq!(test::call_service(&service, zero_qty).await.status().as_u16(), 400);
}

#[actix_web::test]
#[serial]
async fn test_checkout_quote_rejects_totals_out_of_range() {
  let app = test_app();
  let service = init_app!(app.state);
  let product_id = Uuid::new_v4();

  let bodies = [
    json!({ "items": [{ "name": "X", "price": 5.0e28, "qty": 2 }] }),
    json!({ "items": [{ "name": "X", "price": 5.0e28, "qty": 1 }, { "name": "Y", "price": 5.0e28, "qty": 1 }] }),
    json!({ "items": [
      { "productId": product_id, "name": "X", "price": 1.0, "qty": 2_000_000_000 },
      { "productId": product_id, "name": "X", "price": 1.0, "qty": 2_000_000_000 },
    ] }),
  ];
  for body in bodies {
    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/quote")
      .set_json(&body)
      .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status().as_u16(), 400, "body {}", body);
    let error: Value = test::read_body_json(resp).await;
    assert!(error["error"].as_str().unwrap().contains("too large"), "body {}", body);
  }
}
