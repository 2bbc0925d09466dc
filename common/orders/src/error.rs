use common_http_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("product sizes not found: {0:?}")]
    VariantsNotFound(Vec<i64>),
    #[error("insufficient stock for product size {variant_id}. Available: {available}, Requested: {requested}")]
    InsufficientStock { variant_id: i64, requested: i32, available: i32 },
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order {0} already has a carrier shipment")]
    ShipmentAlreadyRegistered(i64),
    #[error("order {0} is already being registered with the carrier")]
    ShipmentRegistrationPending(i64),
    #[error("database error: {0}")]
    Database(String),
}

impl OrderError {
    /// Stable label used for metrics and the `X-Error-Code` header.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::InvalidRequest(_) => "invalid_request",
            OrderError::VariantsNotFound(_) => "variant_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::ShipmentAlreadyRegistered(_) => "shipment_already_registered",
            OrderError::ShipmentRegistrationPending(_) => "shipment_registration_in_progress",
            OrderError::Database(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::Database(e.to_string())
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        let code = e.code();
        match e {
            OrderError::InvalidRequest(_) => ApiError::BadRequest { code, trace_id: None, message: Some(e.to_string()) },
            OrderError::VariantsNotFound(_) | OrderError::OrderNotFound(_) => {
                ApiError::NotFound { code, trace_id: None, message: Some(e.to_string()) }
            }
            OrderError::InsufficientStock { .. }
            | OrderError::ShipmentAlreadyRegistered(_)
            | OrderError::ShipmentRegistrationPending(_) => {
                ApiError::Conflict { code, trace_id: None, message: Some(e.to_string()) }
            }
            OrderError::Database(_) => ApiError::internal(e, None),
        }
    }
}
