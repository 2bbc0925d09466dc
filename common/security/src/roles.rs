use crate::context::SecurityContext;
use crate::SecurityError;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Customer,
    Unknown(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "customer" | "user" => Role::Customer,
            other => Role::Unknown(other.to_string()),
        }
    }
}

pub fn ensure_admin(ctx: &SecurityContext) -> Result<(), SecurityError> {
    if ctx.is_admin() { return Ok(()); }
    warn!(user_id = ?ctx.user_id, roles = ?ctx.roles, trace_id = %ctx.trace_id, "admin_check_failed");
    Err(SecurityError::MissingRole("admin"))
}

/// Orders are visible to the user who placed them and to admins.
pub fn ensure_owner_or_admin(ctx: &SecurityContext, owner: Option<i64>) -> Result<(), SecurityError> {
    if ctx.is_admin() { return Ok(()); }
    match (ctx.user_id, owner) {
        (Some(caller), Some(owner)) if caller == owner => Ok(()),
        _ => {
            warn!(user_id = ?ctx.user_id, owner = ?owner, trace_id = %ctx.trace_id, "owner_check_failed");
            Err(SecurityError::Forbidden)
        }
    }
}
