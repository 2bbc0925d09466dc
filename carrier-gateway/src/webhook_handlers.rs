use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::AppState;

pub const ACK_BODY: &str = "OK";
pub const ORDER_STATUS_EVENT: &str = "ORDER_STATUS";

/// Carrier status callback. Only reached from allow-listed sources.
pub async fn carrier_order_status(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let outcome = apply_status_event(&state, &body).await;
    state.metrics.carrier_webhooks_total.with_label_values(&[outcome]).inc();
    (StatusCode::OK, ACK_BODY)
}

async fn apply_status_event(state: &AppState, body: &[u8]) -> &'static str {
    let Ok(event) = serde_json::from_slice::<Value>(body) else {
        warn!(len = body.len(), "carrier webhook: invalid JSON body");
        return "malformed";
    };
    if event.get("type").and_then(Value::as_str) != Some(ORDER_STATUS_EVENT) {
        return "ignored_type";
    }
    let shipment_id = event.get("uuid").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty());
    let code = event
        .get("attributes")
        .and_then(|a| a.get("code"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let (Some(shipment_id), Some(code)) = (shipment_id, code) else {
        warn!("carrier webhook: missing uuid or attributes.code");
        return "missing_fields";
    };

    match state.store.update_carrier_status(shipment_id, code).await {
        Ok(Some(order_id)) => {
            info!(order_id, shipment_id, status = code, "carrier status updated");
            "updated"
        }
        Ok(None) => {
            warn!(shipment_id, status = code, "carrier status for unknown shipment");
            "unknown_shipment"
        }
        Err(e) => {
            error!(shipment_id, error = %e, "carrier webhook: failed to store status");
            "store_error"
        }
    }
}
