//! HTTP surface: routing, header handling, status codes and JSON bodies.

mod support;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use uuid::Uuid;

use commerce_orders::domain::order::OrderStatus;
use commerce_orders::handlers::CUSTOMER_HEADER;

use support::{dec, FakeCommerce, FakeGateway, Harness};

struct Parts {
    data: web::Data<commerce_orders::handlers::SharedOrderService>,
    gateway: Arc<FakeGateway>,
    commerce: Arc<FakeCommerce>,
}

fn parts() -> Parts {
    let Harness {
        service,
        repo: _,
        gateway,
        commerce,
    } = Harness::new();
    Parts {
        data: web::Data::new(service),
        gateway,
        commerce,
    }
}

fn create_body(commerce: &FakeCommerce) -> Value {
    json!({
        "address_id": commerce.address_id,
        "payment_token": "pm_card_visa"
    })
}

fn amount(v: &Value) -> BigDecimal {
    v.as_str()
        .expect("amounts are strings")
        .parse()
        .expect("valid decimal")
}

#[actix_web::test]
async fn create_then_get_order() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .set_json(create_body(&p.commerce))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "PENDING");
    assert_eq!(amount(&created["total"]), dec("29.00"));
    assert_eq!(created["items"].as_array().map(Vec::len), Some(2));

    let order_id = created["order_id"].as_str().expect("order id");
    let req = test::TestRequest::get()
        .uri(&format!("/orders/{}", order_id))
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = test::read_body_json(resp).await;
    assert_eq!(order["order_reference"], created["order_reference"]);
    assert_eq!(amount(&order["subtotal"]), dec("25.00"));
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn missing_customer_header_is_bad_request() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(create_body(&p.commerce))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "CUSTOMER_ID_REQUIRED");
    assert_eq!(p.gateway.charge_count(), 0);
}

#[actix_web::test]
async fn malformed_customer_header_is_bad_request() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, "not-a-uuid"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn malformed_json_is_bad_request() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .set_json(json!({ "payment_token": 42 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/orders/{}", Uuid::new_v4()))
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
}

#[actix_web::test]
async fn payment_webhook_replay_is_acknowledged() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .set_json(create_body(&p.commerce))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let event = json!({ "type": "payment_succeeded", "id": p.gateway.last_payment_id() });
    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .set_json(&event)
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["status"], "processed");

    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .set_json(&event)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let replay: Value = test::read_body_json(resp).await;
    assert_eq!(replay["status"], "ignored");
    assert_eq!(replay["code"], "ORDER_IS_NOT_PENDING");
}

#[actix_web::test]
async fn webhook_for_unknown_payment_is_not_found() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .set_json(json!({ "type": "payment_failed", "id": "pay_missing" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancel_twice_is_conflict() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .set_json(create_body(&p.commerce))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let order_id = created["order_id"].as_str().expect("order id").to_string();

    let cancel = || {
        test::TestRequest::post()
            .uri(&format!("/orders/{}/cancel", order_id))
            .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
            .to_request()
    };
    let resp = test::call_service(&app, cancel()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = test::read_body_json(resp).await;
    assert_eq!(order["status"], OrderStatus::Cancelled.as_str());

    let resp = test::call_service(&app, cancel()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ORDER_IS_ALREADY_CANCELLED");
}

#[actix_web::test]
async fn fulfillment_update_and_refund_by_reference() {
    let p = parts();
    p.gateway.set_payment_status("succeeded");
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .set_json(create_body(&p.commerce))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let reference = created["order_reference"].as_str().expect("reference").to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/orders/reference/{}", reference))
        .set_json(json!({ "status": "SHIPPED" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ORDER_INVALID_STATUS_TRANSITION");

    let req = test::TestRequest::patch()
        .uri(&format!("/orders/reference/{}", reference))
        .set_json(json!({ "tracking_number": "1Z999" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["tracking_number"], "1Z999");
    assert_eq!(updated["status"], "PAYMENT_SUCCESS");

    let req = test::TestRequest::post()
        .uri(&format!("/orders/reference/{}/refund", reference))
        .set_json(json!({ "items": [{ "sku": "A", "quantity": 2 }] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let refund: Value = test::read_body_json(resp).await;
    assert_eq!(refund["refund_id"], "re_1");
    assert_eq!(amount(&refund["total_refundable_amount"]), dec("20.00"));
    assert_eq!(refund["order_status"], "PAYMENT_SUCCESS");

    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .set_json(json!({ "type": "refund_succeeded", "id": "re_1", "amount": "20.00" }))
        .to_request();
    let ack: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack["status"], "processed");

    let req = test::TestRequest::post()
        .uri(&format!("/orders/reference/{}/refund", reference))
        .set_json(json!({ "items": [{ "sku": "A", "quantity": 2 }] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ORDER_REFUNDING_ERROR");
}

#[actix_web::test]
async fn list_orders_pages_through_history() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
            .set_json(create_body(&p.commerce))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        p.commerce.new_cart();
    }

    let req = test::TestRequest::get()
        .uri("/orders?limit=1")
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
    let cursor = page["next_cursor"].as_str().expect("more pages").to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/orders?limit=1&cursor={}", cursor))
        .insert_header((CUSTOMER_HEADER, p.commerce.customer_id.to_string()))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
    assert!(page["next_cursor"].is_null());
}

#[actix_web::test]
async fn openapi_document_is_served() {
    let p = parts();
    let app = test::init_service(
        App::new()
            .app_data(p.data.clone())
            .configure(commerce_orders::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api-docs/openapi.json")
        .to_request();
    let doc: Value = test::call_and_read_body_json(&app, req).await;
    assert!(doc["paths"]["/orders/reference/{reference}/refund"].is_object());
    assert!(doc["paths"]["/webhooks/payments"].is_object());
}
