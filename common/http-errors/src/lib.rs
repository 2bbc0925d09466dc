use axum::{
    body::Body,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

/// Header carrying the machine readable error code on every error response.
pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

/// Distinct error codes tracked as metric labels before folding into `other`.
pub const MAX_ERROR_CODES: usize = 40;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    ForbiddenMissingRole { role: &'static str, trace_id: Option<Uuid> },
    Forbidden { trace_id: Option<Uuid> },
    /// 403 with a caller-chosen code, for rejections that are not role checks.
    Denied { code: &'static str, trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    BadGateway { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    GatewayTimeout { code: &'static str, trace_id: Option<Uuid> },
    ServiceUnavailable { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    /// Logs the underlying failure and returns a generic 500; the cause never reaches the client.
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        tracing::error!(error = %e, trace_id = ?trace_id, "internal error");
        Self::Internal { trace_id, message: None }
    }
    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self { Self::BadRequest { code, trace_id, message: None } }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ForbiddenMissingRole { .. } => "missing_role",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::Denied { code, .. }
            | ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::BadGateway { code, .. }
            | ApiError::GatewayTimeout { code, .. }
            | ApiError::ServiceUnavailable { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }

    /// Attach a trace id to an error built without request context (e.g. via `From`).
    pub fn with_trace_id(mut self, id: Option<Uuid>) -> Self {
        match &mut self {
            ApiError::ForbiddenMissingRole { trace_id, .. }
            | ApiError::Forbidden { trace_id }
            | ApiError::Denied { trace_id, .. }
            | ApiError::BadRequest { trace_id, .. }
            | ApiError::NotFound { trace_id, .. }
            | ApiError::Conflict { trace_id, .. }
            | ApiError::BadGateway { trace_id, .. }
            | ApiError::GatewayTimeout { trace_id, .. }
            | ApiError::ServiceUnavailable { trace_id, .. }
            | ApiError::Internal { trace_id, .. } => {
                if trace_id.is_none() {
                    *trace_id = id;
                }
            }
        }
        self
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest { code: "invalid_request", trace_id: None, message: Some(rejection.body_text()) }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest { code: "invalid_request", trace_id: None, message: Some(rejection.body_text()) }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_code = self.code();
        let (status, body) = match self {
            ApiError::ForbiddenMissingRole { role, trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: error_code.into(), missing_role: Some(role.into()), trace_id, message: None },
            ),
            ApiError::Forbidden { trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message: None },
            ),
            ApiError::Denied { trace_id, .. } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message: None },
            ),
            ApiError::BadRequest { trace_id, message, .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
            ApiError::NotFound { trace_id, message, .. } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
            ApiError::Conflict { trace_id, message, .. } => (
                StatusCode::CONFLICT,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
            ApiError::BadGateway { trace_id, message, .. } => (
                StatusCode::BAD_GATEWAY,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
            ApiError::GatewayTimeout { trace_id, .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message: None },
            ),
            ApiError::ServiceUnavailable { trace_id, message, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: error_code.into(), missing_role: None, trace_id, message },
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "http_errors_total",
            "Count of HTTP error responses emitted (status >= 400)",
        ),
        &["service", "code", "status"],
    )
    .expect("http_errors_total");
    let _ = prometheus::default_registry().register(Box::new(c.clone()));
    c
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Maps an error code onto a bounded label set. Codes beyond `MAX_ERROR_CODES` become `other`.
pub fn error_code_label(code: &str) -> String {
    let mut seen = SEEN_CODES.lock().unwrap_or_else(|p| p.into_inner());
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() >= MAX_ERROR_CODES {
        return "other".to_string();
    }
    seen.insert(code.to_string());
    code.to_string()
}

pub type MetricsFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware counting every response with status >= 400 by service, error code and status.
///
/// Use with `axum::middleware::from_fn(http_error_metrics_layer("order-service"))`.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request<Body>, Next) -> MetricsFuture + Clone + Send + Sync + 'static {
    move |req: Request<Body>, next: Next| {
        Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.as_u16() >= 400 {
                let code = resp
                    .headers()
                    .get(ERROR_CODE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                let label = error_code_label(code);
                HTTP_ERRORS_TOTAL
                    .with_label_values(&[service, label.as_str(), status.as_str()])
                    .inc();
            }
            resp
        }) as MetricsFuture
    }
}
