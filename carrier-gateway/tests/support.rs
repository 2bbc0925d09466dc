#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use carrier_gateway::{build_router, AllowList, AppState, CarrierClient, CarrierConfig};
use common_observability::FulfillmentMetrics;
use common_orders::fixtures::{buyer, variant};
use common_orders::{InMemoryOrderStore, OrderStatus, OrderStore};

pub const TOKEN: &str = "carrier-token-1";
pub const SHIPMENT_ID: &str = "72753031-1a6b-4b3c-9d2e-0c4f8e1f5a10";
pub const PRINT_ID: &str = "1d3b0c4e-7f2a-4e51-8b9d-5a6c7e8f9012";

pub fn carrier_config(server: &MockServer) -> CarrierConfig {
    let mut config = CarrierConfig::for_api(server.base_url());
    config.account = Some("test-account".into());
    config.secure_password = Some("test-password".into());
    config
}

pub fn client(config: CarrierConfig) -> Arc<CarrierClient> {
    let metrics = Arc::new(FulfillmentMetrics::new().unwrap());
    Arc::new(CarrierClient::new(config, metrics).unwrap())
}

pub fn app_with(store: Arc<InMemoryOrderStore>, config: CarrierConfig, allow: &str) -> Router {
    let metrics = Arc::new(FulfillmentMetrics::new().unwrap());
    let client = Arc::new(CarrierClient::new(config, metrics.clone()).unwrap());
    let state = AppState::new(store, client, AllowList::parse(allow).unwrap(), metrics);
    build_router(state, &[])
}

pub async fn mock_token(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token").body_contains("grant_type=client_credentials");
            then.status(200).json_body(json!({"access_token": TOKEN, "token_type": "bearer", "expires_in": 3600}));
        })
        .await
}

/// Store holding one order of two units at 1000.00 in `status`.
pub async fn store_with_order(status: OrderStatus) -> (Arc<InMemoryOrderStore>, i64) {
    let store = Arc::new(InMemoryOrderStore::with_variants([variant(1, "1000.00", 5)]));
    let detail = store.create_order(&buyer(), Some(7), &BTreeMap::from([(1, 2)])).await.unwrap();
    store.force_status(detail.order.id, status);
    (store, detail.order.id)
}

pub fn admin_request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let req = Request::builder()
        .uri(uri)
        .method(method)
        .header("X-User-ID", "1")
        .header("X-Roles", "admin")
        .header("content-type", "application/json");
    match body {
        Some(b) => req.body(Body::from(b.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    }
}

pub fn webhook_request(from: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri("/webhooks/carrier/order-status")
        .method("POST")
        .header("content-type", "application/json")
        .header("X-Forwarded-For", from)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}
