use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method, StatusCode};
use axum::{middleware, routing::{get, post}, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use common_http_errors::http_error_metrics_layer;
use common_observability::FulfillmentMetrics;
use common_orders::OrderStore;

use crate::config::GatewayConfig;
use crate::gateway::PaymentGateway;
use crate::init::PaymentInitService;
use crate::payment_handlers::{init_payment, payment_status};
use crate::webhook::payment_webhook;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub config: Arc<GatewayConfig>,
    pub init: PaymentInitService,
    pub metrics: Arc<FulfillmentMetrics>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: GatewayConfig,
        metrics: Arc<FulfillmentMetrics>,
    ) -> Self {
        let config = Arc::new(config);
        let init = PaymentInitService::new(store.clone(), gateway, config.clone(), metrics.clone());
        Self { store, config, init, metrics }
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
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-roles"),
            HeaderName::from_static("x-trace-id"),
        ])
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/payments/init", post(init_payment))
        .route("/payments/status/:order_id", get(payment_status))
        .route("/payments/webhook", post(payment_webhook))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(http_error_metrics_layer("payment-service")))
}
