mod support;

use axum::http::StatusCode;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use tower::ServiceExt;

use common_orders::{OrderStatus, OrderStore};
use support::*;

#[tokio::test]
async fn paid_order_is_registered_and_recorded() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/orders")
                .header("authorization", format!("Bearer {TOKEN}"))
                .json_body_partial(
                    json!({
                        "type": 1,
                        "number": order_id.to_string(),
                        "tariff_code": 136,
                        "shipment_point": "MSK5",
                        "delivery_point": "MSK71",
                        "recipient": {"name": "Иван Петров", "phones": [{"number": "+79991234567"}]}
                    })
                    .to_string(),
                );
            then.status(202).json_body(json!({
                "entity": {"uuid": SHIPMENT_ID},
                "requests": [{"request_uuid": "r1", "type": "CREATE", "state": "ACCEPTED", "errors": []}]
            }));
        })
        .await;
    let app = app_with(store.clone(), carrier_config(&server), "");

    let uri = format!("/carrier/orders/{order_id}/shipment");
    let resp = app.oneshot(admin_request("POST", &uri, Some(&json!({"delivery_point": "MSK71"})))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["shipment_id"], SHIPMENT_ID);
    create.assert_hits_async(1).await;
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.carrier_shipment_id.as_deref(), Some(SHIPMENT_ID));
}

#[tokio::test]
async fn carrier_rejection_surfaces_its_messages() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/orders");
            then.status(200).json_body(json!({
                "entity": {"uuid": SHIPMENT_ID},
                "requests": [{"state": "INVALID", "errors": [
                    {"code": "v2_field_is_empty", "message": "delivery_point is empty"},
                    {"code": "v2_phone_invalid"}
                ]}]
            }));
        })
        .await;
    let app = app_with(store.clone(), carrier_config(&server), "");

    let uri = format!("/carrier/orders/{order_id}/shipment");
    let resp = app.oneshot(admin_request("POST", &uri, Some(&json!({"delivery_point": "MSK71"})))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(resp.headers()["x-error-code"], "carrier_error");
    let body = body_json(resp).await;
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("delivery_point is empty; v2_phone_invalid"), "{message}");
    assert!(store.get_order(order_id).await.unwrap().unwrap().carrier_shipment_id.is_none());
    store.claim_carrier_registration(order_id).await.unwrap();
}

#[tokio::test]
async fn concurrent_registrations_reach_the_carrier_once() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/orders");
            then.status(202)
                .delay(std::time::Duration::from_millis(300))
                .json_body(json!({"entity": {"uuid": SHIPMENT_ID}, "requests": [{"state": "ACCEPTED"}]}));
        })
        .await;
    let app = app_with(store.clone(), carrier_config(&server), "");
    let uri = format!("/carrier/orders/{order_id}/shipment");
    let body = json!({"delivery_point": "MSK71"});

    let (first, second) = tokio::join!(
        app.clone().oneshot(admin_request("POST", &uri, Some(&body))),
        app.clone().oneshot(admin_request("POST", &uri, Some(&body))),
    );
    let mut statuses = [first.unwrap().status(), second.unwrap().status()];
    statuses.sort();

    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
    create.assert_hits_async(1).await;
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.carrier_shipment_id.as_deref(), Some(SHIPMENT_ID));
}

#[tokio::test]
async fn registration_in_flight_is_reported_as_conflict() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    store.claim_carrier_registration(order_id).await.unwrap();
    let app = app_with(store, carrier_config(&server), "");

    let resp = app
        .oneshot(admin_request("POST", &format!("/carrier/orders/{order_id}/shipment"), Some(&json!({"delivery_point": "MSK71"}))))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers()["x-error-code"], "shipment_registration_in_progress");
    token.assert_hits_async(0).await;
}

#[tokio::test]
async fn registration_preconditions() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let config = carrier_config(&server);

    let (unpaid, unpaid_id) = store_with_order(OrderStatus::NotPaid).await;
    let resp = app_with(unpaid, config.clone(), "")
        .oneshot(admin_request("POST", &format!("/carrier/orders/{unpaid_id}/shipment"), Some(&json!({"delivery_point": "MSK71"}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers()["x-error-code"], "order_not_paid");

    let (paid, paid_id) = store_with_order(OrderStatus::Paid).await;
    paid.record_carrier_shipment(paid_id, SHIPMENT_ID).await.unwrap();
    let resp = app_with(paid, config.clone(), "")
        .oneshot(admin_request("POST", &format!("/carrier/orders/{paid_id}/shipment"), Some(&json!({"delivery_point": "MSK71"}))))
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-error-code"], "shipment_already_registered");

    let (store, _) = store_with_order(OrderStatus::Paid).await;
    let resp = app_with(store.clone(), config.clone(), "")
        .oneshot(admin_request("POST", "/carrier/orders/999/shipment", Some(&json!({"delivery_point": "MSK71"}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app_with(store, config, "")
        .oneshot(admin_request("POST", "/carrier/orders/1/shipment", Some(&json!({"delivery_point": "  "}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    token.assert_hits_async(0).await;
}

#[tokio::test]
async fn shipment_routes_are_admin_only() {
    let server = MockServer::start_async().await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    let app = app_with(store, carrier_config(&server), "");

    let req = axum::http::Request::builder()
        .uri(format!("/carrier/orders/{order_id}/shipment"))
        .header("X-User-ID", "7")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn info_records_tracking_number_and_latest_status() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    store.record_carrier_shipment(order_id, SHIPMENT_ID).await.unwrap();
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/orders/{SHIPMENT_ID}"));
            then.status(200).json_body(json!({"entity": {
                "uuid": SHIPMENT_ID,
                "cdek_number": 1106207236,
                "statuses": [
                    {"code": "CREATED", "name": "Создан", "date_time": "2024-03-01T10:00:00+0000"},
                    {"code": "RECEIVED_AT_SHIPMENT_WAREHOUSE", "name": "Принят", "date_time": "2024-03-02T09:30:00+0000"}
                ]
            }}));
        })
        .await;
    let app = app_with(store.clone(), carrier_config(&server), "");

    let resp = app
        .oneshot(admin_request("GET", &format!("/carrier/orders/{order_id}/shipment"), None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["tracking_number"], "1106207236");
    assert_eq!(body["status"], "RECEIVED_AT_SHIPMENT_WAREHOUSE");
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.carrier_tracking_number.as_deref(), Some("1106207236"));
    assert_eq!(order.carrier_status.as_deref(), Some("RECEIVED_AT_SHIPMENT_WAREHOUSE"));
}

#[tokio::test]
async fn update_sends_patch_for_registered_shipment() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    let app = app_with(store.clone(), carrier_config(&server), "");
    let uri = format!("/carrier/orders/{order_id}/shipment");

    let resp = app
        .clone()
        .oneshot(admin_request("PATCH", &uri, Some(&json!({"delivery_point": "MSK99"}))))
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-error-code"], "shipment_not_registered");

    store.record_carrier_shipment(order_id, SHIPMENT_ID).await.unwrap();
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/orders")
                .json_body_partial(json!({"uuid": SHIPMENT_ID, "delivery_point": "MSK99"}).to_string());
            then.status(202).json_body(json!({"entity": {"uuid": SHIPMENT_ID}, "requests": [{"state": "ACCEPTED"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/orders/{SHIPMENT_ID}"));
            then.status(200).json_body(json!({"entity": {"uuid": SHIPMENT_ID, "statuses": []}}));
        })
        .await;

    let resp = app.oneshot(admin_request("PATCH", &uri, Some(&json!({"delivery_point": "MSK99"})))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    patch.assert_hits_async(1).await;
}

#[tokio::test]
async fn documents_are_requested_polled_and_proxied() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let (store, order_id) = store_with_order(OrderStatus::Paid).await;
    store.record_carrier_shipment(order_id, SHIPMENT_ID).await.unwrap();
    let print = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/print/orders")
                .json_body_partial(json!({"orders": [{"order_uuid": SHIPMENT_ID}], "copy_count": 2}).to_string());
            then.status(202).json_body(json!({"entity": {"uuid": PRINT_ID}, "requests": [{"state": "ACCEPTED"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/print/orders/{PRINT_ID}"));
            then.status(200).json_body(json!({"entity": {
                "uuid": PRINT_ID,
                "url": format!("https://api.edu.cdek.ru/v2/print/orders/{PRINT_ID}.pdf"),
                "statuses": [
                    {"code": "ACCEPTED", "date_time": "2024-03-01T10:00:00+0000"},
                    {"code": "READY", "date_time": "2024-03-01T10:00:05+0000"}
                ]
            }}));
        })
        .await;
    let pdf = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/print/orders/{PRINT_ID}.pdf"))
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).header("content-type", "application/pdf").body(b"%PDF-1.4 waybill".to_vec());
        })
        .await;
    let app = app_with(store, carrier_config(&server), "");

    let resp = app
        .clone()
        .oneshot(admin_request("POST", &format!("/carrier/orders/{order_id}/documents/waybill"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(resp).await["print_id"], PRINT_ID);

    let resp = app
        .clone()
        .oneshot(admin_request("GET", &format!("/carrier/documents/waybill/{PRINT_ID}"), None))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["status"], "READY");

    let resp = app
        .clone()
        .oneshot(admin_request("GET", &format!("/carrier/documents/waybill/{PRINT_ID}/pdf"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(body_bytes(resp).await, b"%PDF-1.4 waybill".to_vec());

    let resp = app
        .oneshot(admin_request("GET", "/carrier/documents/waybill/not-a-uuid/pdf", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    print.assert_hits_async(1).await;
    pdf.assert_hits_async(1).await;
    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn lookups_are_public() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/location/suggest/cities");
            then.status(200).json_body(json!([{"city_uuid": "c1", "code": 270, "full_name": "Новосибирск", "country_code": "RU"}]));
        })
        .await;
    let (store, _) = store_with_order(OrderStatus::Paid).await;
    let app = app_with(store, carrier_config(&server), "");

    let req = axum::http::Request::builder()
        .uri("/carrier/cities?name=%D0%9D%D0%BE%D0%B2%D0%BE")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await[0]["code"], 270);

    let req = axum::http::Request::builder().uri("/carrier/cities?name=").body(axum::body::Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_lookup_and_tariff_input_is_invalid_request() {
    let server = MockServer::start_async().await;
    let (store, _) = store_with_order(OrderStatus::Paid).await;
    let app = app_with(store, carrier_config(&server), "");

    let req = axum::http::Request::builder()
        .uri("/carrier/delivery-points?city_code=novosibirsk")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_request");

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/carrier/tariffs")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("[not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "invalid_request");
}
