//! Caller identity forwarded by the upstream auth layer.
pub mod context;
pub mod error;
pub mod roles;

pub use context::{SecurityContext, SecurityCtxExtractor, ROLES_HEADER, TRACE_ID_HEADER, USER_ID_HEADER};
pub use error::SecurityError;
pub use roles::{ensure_admin, ensure_owner_or_admin, Role};
