use thiserror::Error;
use uuid::Uuid;

use common_http_errors::ApiError;
use common_orders::OrderError;

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier credentials are not configured")]
    NotConfigured,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order {0} already has a carrier shipment")]
    AlreadyRegistered(i64),
    #[error("order {0} is already being registered with the carrier")]
    RegistrationInProgress(i64),
    #[error("order {0} has no carrier shipment")]
    NotRegistered(i64),
    #[error("order {order_id} is {status}; only paid orders can be shipped")]
    NotPayable { order_id: i64, status: String },
    #[error("order {0} has no products")]
    NoItems(i64),
    #[error("carrier API error: {0}")]
    Upstream(String),
    #[error("carrier API did not answer in time")]
    Timeout,
    #[error("carrier API transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(OrderError),
}

impl From<reqwest::Error> for CarrierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CarrierError::Timeout
        } else {
            CarrierError::Transport(err.without_url().to_string())
        }
    }
}

impl From<OrderError> for CarrierError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::OrderNotFound(id) => CarrierError::OrderNotFound(id),
            OrderError::ShipmentAlreadyRegistered(id) => CarrierError::AlreadyRegistered(id),
            OrderError::ShipmentRegistrationPending(id) => CarrierError::RegistrationInProgress(id),
            other => CarrierError::Store(other),
        }
    }
}

impl CarrierError {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            CarrierError::NotConfigured => "not_configured",
            CarrierError::Upstream(_) => "upstream_error",
            CarrierError::Timeout => "timeout",
            CarrierError::Transport(_) => "transport_error",
            _ => "rejected",
        }
    }

    pub fn into_api(self, trace_id: Uuid) -> ApiError {
        let trace_id = Some(trace_id);
        let message = Some(self.to_string());
        match self {
            CarrierError::NotConfigured => {
                ApiError::ServiceUnavailable { code: "carrier_not_configured", trace_id, message }
            }
            CarrierError::InvalidRequest(_) => ApiError::BadRequest { code: "invalid_request", trace_id, message },
            CarrierError::OrderNotFound(_) => ApiError::NotFound { code: "order_not_found", trace_id, message },
            CarrierError::AlreadyRegistered(_) => {
                ApiError::Conflict { code: "shipment_already_registered", trace_id, message }
            }
            CarrierError::RegistrationInProgress(_) => {
                ApiError::Conflict { code: "shipment_registration_in_progress", trace_id, message }
            }
            CarrierError::NotRegistered(_) => ApiError::Conflict { code: "shipment_not_registered", trace_id, message },
            CarrierError::NotPayable { .. } => ApiError::Conflict { code: "order_not_paid", trace_id, message },
            CarrierError::NoItems(_) => ApiError::BadRequest { code: "order_has_no_items", trace_id, message },
            CarrierError::Upstream(_) | CarrierError::Transport(_) => {
                ApiError::BadGateway { code: "carrier_error", trace_id, message }
            }
            CarrierError::Timeout => ApiError::GatewayTimeout { code: "carrier_timeout", trace_id },
            CarrierError::Store(e) => ApiError::from(e).with_trace_id(trace_id),
        }
    }
}
