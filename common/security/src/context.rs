use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

use crate::roles::Role;
use crate::SecurityError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const ROLES_HEADER: &str = "X-Roles";
pub const TRACE_ID_HEADER: &str = "X-Trace-ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub user_id: Option<i64>,
    pub roles: Vec<Role>,
    pub trace_id: Uuid,
}

impl SecurityContext {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| *r == Role::Admin)
    }

    /// Anonymous caller, used by background paths and tests.
    pub fn anonymous() -> Self {
        Self { user_id: None, roles: Vec::new(), trace_id: Uuid::new_v4() }
    }
}

pub struct SecurityCtxExtractor(pub SecurityContext);

fn user_from_headers(headers: &HeaderMap) -> Result<Option<i64>, SecurityError> {
    match headers.get(USER_ID_HEADER) {
        None => Ok(None),
        Some(v) => v
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Some)
            .ok_or(SecurityError::InvalidUserId),
    }
}

fn roles_from_headers(headers: &HeaderMap) -> Vec<Role> {
    headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|csv| {
            csv.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(Role::parse)
                .collect()
        })
        .unwrap_or_default()
}

fn trace_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers.get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for SecurityCtxExtractor where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let trace_id = trace_id_from_headers(headers).unwrap_or_else(Uuid::new_v4);
        let user_id = user_from_headers(headers).map_err(|e| ApiError::from(e).with_trace_id(Some(trace_id)))?;
        let roles = roles_from_headers(headers);

        Span::current().record("trace_id", tracing::field::display(trace_id));

        Ok(SecurityCtxExtractor(SecurityContext { user_id, roles, trace_id }))
    }
}
