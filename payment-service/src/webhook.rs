//! Inbound payment notifications. The gateway only needs to see `OK`;
//! everything else is logged and counted.
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use common_crypto::{verify_params, CryptoError};
use common_orders::{PaymentSignal, Reconciliation};

use crate::gateway::lenient_string;
use crate::AppState;

pub const ACK_BODY: &str = "OK";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentNotification {
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn payment_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let outcome = handle_notification(&state, &body).await;
    state.metrics.payment_webhooks_total.with_label_values(&[outcome]).inc();
    (StatusCode::OK, ACK_BODY)
}

/// Returns the metric label for what happened.
async fn handle_notification(state: &AppState, body: &[u8]) -> &'static str {
    let params: Map<String, Value> = match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(len = body.len(), "payment notification is not a JSON object");
            return "malformed";
        }
    };

    let Some(secret) = state.config.secret.as_ref() else {
        error!("payment notification received but the gateway secret is not configured");
        return "not_configured";
    };
    if let Err(e) = verify_params(&params, secret) {
        match e {
            CryptoError::MissingSecret => error!("payment notification received but the gateway secret is empty"),
            _ => warn!(error = %e, order_id = ?params.get("OrderId"), "payment notification signature rejected"),
        }
        return "bad_signature";
    }

    let notification: PaymentNotification = match serde_json::from_value(Value::Object(params)) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "verified payment notification has unexpected shape");
            return "malformed";
        }
    };
    let Some(order_id) = notification.order_id.as_deref().and_then(|s| s.trim().parse::<i64>().ok()) else {
        warn!(order_id = ?notification.order_id, status = %notification.status, "payment notification for unknown order");
        return "order_missing";
    };

    let signal = PaymentSignal::from_gateway_status(&notification.status);
    info!(
        order_id,
        status = %notification.status,
        success = notification.success,
        amount = ?notification.amount,
        error_code = ?notification.error_code,
        "payment notification verified"
    );
    match state.store.reconcile_payment(order_id, signal, notification.payment_id.as_deref()).await {
        Ok(outcome) => {
            match &outcome {
                Reconciliation::Applied { from, to } => info!(order_id, %from, %to, "order status updated"),
                Reconciliation::AlreadyApplied { status } => info!(order_id, %status, "payment notification replay"),
                Reconciliation::Ignored { status, signal } => warn!(
                    order_id,
                    %status,
                    signal = signal.as_str(),
                    message = ?notification.message,
                    "payment notification has no transition from current status"
                ),
                Reconciliation::NoChange { status } => {
                    info!(order_id, %status, gateway_status = %notification.status, "informational payment status")
                }
                Reconciliation::OrderMissing => {
                    warn!(order_id, status = %notification.status, "payment notification for unknown order")
                }
            }
            outcome.label()
        }
        Err(e) => {
            error!(order_id, error = %e, "failed to reconcile payment notification");
            "store_error"
        }
    }
}
