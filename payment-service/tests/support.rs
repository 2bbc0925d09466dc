#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common_crypto::{sign_params, GatewaySecret};
use common_observability::FulfillmentMetrics;
use common_orders::fixtures::{buyer, variant};
use common_orders::{InMemoryOrderStore, OrderStore};
use payment_service::{build_router, AppState, GatewayConfig, TBankGateway};

pub const SECRET: &str = "usaf8fw8fsw21g";
pub const OWNER: i64 = 7;

pub fn gateway_config(api_url: &str) -> GatewayConfig {
    GatewayConfig {
        terminal_key: Some("TinkoffBankTest".into()),
        secret: Some(GatewaySecret::new(SECRET)),
        api_url: api_url.to_string(),
        success_url: "https://shop.example/payment/success".into(),
        fail_url: "https://shop.example/payment/fail".into(),
        timeout: Duration::from_secs(5),
    }
}

pub fn app_with(store: Arc<InMemoryOrderStore>, config: GatewayConfig) -> Router {
    let gateway = TBankGateway::new(config.api_url.clone(), config.timeout).unwrap();
    let metrics = Arc::new(FulfillmentMetrics::new().unwrap());
    build_router(AppState::new(store, Arc::new(gateway), config, metrics), &[])
}

/// Store holding one unpaid order of two units at 10.00, owned by `OWNER`.
pub async fn store_with_order() -> (Arc<InMemoryOrderStore>, i64) {
    let store = Arc::new(InMemoryOrderStore::with_variants([variant(1, "10.00", 5)]));
    let detail = store.create_order(&buyer(), Some(OWNER), &BTreeMap::from([(1, 2)])).await.unwrap();
    (store, detail.order.id)
}

pub fn post_json(uri: &str, body: &Value, user: Option<i64>) -> Request<Body> {
    let mut req = Request::builder().uri(uri).method("POST").header("content-type", "application/json");
    if let Some(u) = user {
        req = req.header("X-User-ID", u.to_string());
    }
    req.body(Body::from(body.to_string())).unwrap()
}

pub fn signed_notification(fields: Value) -> Value {
    let Value::Object(mut map) = fields else { panic!("notification must be an object") };
    let token = sign_params(&map, &GatewaySecret::new(SECRET));
    map.insert("Token".into(), Value::String(token));
    Value::Object(map)
}

pub fn as_map(v: &Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

pub async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
