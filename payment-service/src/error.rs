use thiserror::Error;
use uuid::Uuid;

use common_http_errors::ApiError;
use common_money::MoneyError;
use common_orders::OrderError;
use common_security::SecurityError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway credentials are not configured")]
    NotConfigured,
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order {order_id} is already {status}")]
    AlreadyProcessed { order_id: i64, status: String },
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),
    #[error("payment gateway rejected the request: {message} ({details}) [code {error_code}]")]
    Gateway { message: String, details: String, error_code: String },
    #[error("payment gateway did not answer in time")]
    Timeout,
    #[error("payment gateway transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Forbidden(#[from] SecurityError),
    #[error(transparent)]
    Store(#[from] OrderError),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::Timeout
        } else {
            PaymentError::Transport(err.without_url().to_string())
        }
    }
}

impl PaymentError {
    pub fn into_api(self, trace_id: Uuid) -> ApiError {
        let trace_id = Some(trace_id);
        match self {
            PaymentError::NotConfigured => ApiError::ServiceUnavailable {
                code: "payment_not_configured",
                trace_id,
                message: Some("payment gateway is not configured".into()),
            },
            PaymentError::OrderNotFound(_) => ApiError::NotFound {
                code: "order_not_found",
                trace_id,
                message: Some("Order not found".into()),
            },
            e @ PaymentError::AlreadyProcessed { .. } => ApiError::Conflict {
                code: "order_already_processed",
                trace_id,
                message: Some(e.to_string()),
            },
            e @ PaymentError::InvalidAmount(_) => ApiError::BadRequest {
                code: "invalid_amount",
                trace_id,
                message: Some(e.to_string()),
            },
            e @ (PaymentError::Gateway { .. } | PaymentError::Transport(_)) => ApiError::BadGateway {
                code: "payment_gateway_error",
                trace_id,
                message: Some(e.to_string()),
            },
            PaymentError::Timeout => ApiError::GatewayTimeout { code: "payment_gateway_timeout", trace_id },
            PaymentError::Forbidden(e) => ApiError::from(e).with_trace_id(trace_id),
            PaymentError::Store(e) => ApiError::from(e).with_trace_id(trace_id),
        }
    }
}
