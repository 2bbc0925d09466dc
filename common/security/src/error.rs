use common_http_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("invalid user identifier")]    InvalidUserId,
    #[error("caller may not access this resource")]    Forbidden,
    #[error("missing required role {0}")]    MissingRole(&'static str),
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::InvalidUserId => ApiError::BadRequest {
                code: "invalid_user_id",
                trace_id: None,
                message: Some(e.to_string()),
            },
            SecurityError::Forbidden => ApiError::Forbidden { trace_id: None },
            SecurityError::MissingRole(role) => ApiError::ForbiddenMissingRole { role, trace_id: None },
        }
    }
}
