use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method, StatusCode};
use axum::{middleware, routing::{get, post}, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use common_http_errors::http_error_metrics_layer;
use common_observability::FulfillmentMetrics;
use common_orders::OrderStore;

use crate::allowlist::{require_carrier_source, AllowList};
use crate::carrier_handlers::{
    calculate_tariffs, delivery_points, document_status, download_document, register_shipment, request_document,
    shipment_info, suggest_cities, update_shipment,
};
use crate::client::CarrierClient;
use crate::shipments::ShipmentService;
use crate::webhook_handlers::carrier_order_status;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub client: Arc<CarrierClient>,
    pub shipments: ShipmentService,
    pub webhook_allow_list: Arc<AllowList>,
    pub metrics: Arc<FulfillmentMetrics>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        client: Arc<CarrierClient>,
        webhook_allow_list: AllowList,
        metrics: Arc<FulfillmentMetrics>,
    ) -> Self {
        let shipments = ShipmentService::new(store.clone(), client.clone());
        Self { store, client, shipments, webhook_allow_list: Arc::new(webhook_allow_list), metrics }
    }
}

pub async fn health() -> &'static str { "ok" }

async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}")),
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()).collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-roles"),
            HeaderName::from_static("x-trace-id"),
        ])
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let webhooks = Router::new()
        .route("/webhooks/carrier/order-status", post(carrier_order_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_carrier_source));

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/carrier/cities", get(suggest_cities))
        .route("/carrier/delivery-points", get(delivery_points))
        .route("/carrier/tariffs", post(calculate_tariffs))
        .route(
            "/carrier/orders/:order_id/shipment",
            post(register_shipment).patch(update_shipment).get(shipment_info),
        )
        .route("/carrier/orders/:order_id/documents/:kind", post(request_document))
        .route("/carrier/documents/:kind/:print_id", get(document_status))
        .route("/carrier/documents/:kind/:print_id/pdf", get(download_document))
        .merge(webhooks)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(http_error_metrics_layer("carrier-gateway")))
}
